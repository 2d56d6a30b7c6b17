//! # defmap
//!
//! Defaulted, self-parsing nested mappings for loading configuration-like data
//! into typed containers.
//!
//! A [`DefaultedMap`] starts from a default template declared by its
//! [`Schema`], overlays caller data on top, and then runs the schema's parse
//! hook, which replaces selected raw sub-mappings with typed children. The
//! container can later report which keys differ from the defaults and which
//! were never declared at all.
//!
//! ## Quick Start
//!
//! ```rust
//! use defmap::{
//!     ChildMap, DefaultedMap, Mapping, ParseContext, Result, Schema, construct_child_at_key,
//!     into_mapping,
//! };
//! use serde_json::json;
//!
//! struct Audio;
//!
//! impl Schema for Audio {
//!     type Args = ();
//!
//!     fn defaults() -> Mapping {
//!         into_mapping(json!({"volume": 50, "panning": 0})).unwrap()
//!     }
//! }
//!
//! struct Settings;
//!
//! impl Schema for Settings {
//!     type Args = ();
//!
//!     fn defaults() -> Mapping {
//!         into_mapping(json!({"audio": {}})).unwrap()
//!     }
//!
//!     fn parse(map: &mut DefaultedMap<Self>, _: &ParseContext<'_, ()>) -> Result<()> {
//!         construct_child_at_key::<_, ChildMap<Audio>>(map, "audio", &())
//!     }
//! }
//!
//! let data = into_mapping(json!({"audio": {"volume": 21}})).unwrap();
//! let settings = DefaultedMap::<Settings>::with_data(data, &()).unwrap();
//!
//! let audio = settings.get_as::<ChildMap<Audio>>("audio").unwrap();
//! assert_eq!(audio.to_value(), json!({"volume": 21, "panning": 0}));
//! assert_eq!(audio.parent(), settings.id());
//! assert_eq!(audio.modified_values().collect::<Vec<_>>(), ["volume"]);
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Container types
//! - [`construct`] - Keyed-construction helpers
//! - [`error`] - Error types and result definitions

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

/// Container types: entries, defaulted mappings and child mappings.
pub mod data;

/// Helpers that replace raw values under a key with typed objects.
pub mod construct;

/// Error types and result definitions.
pub mod error;

pub use construct::{
    ChildDirective, Construct, ConstructChild, Directive, apply_construction_directives,
    apply_construction_directives_child, construct_at_key, construct_child_at_key,
};
pub use data::{
    ChildMap, DefaultedMap, Entry, MapId, Mapping, Node, ParentView, ParseContext, ParseMode,
    Schema, Storage, into_mapping,
};
pub use error::{Error, Result};
pub use serde_json::Value;
