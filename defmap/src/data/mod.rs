//! Container types.
//!
//! - [`entry`] - Stored values: raw JSON or typed nodes
//! - [`defaulted`] - The defaulted, self-parsing mapping and its [`Schema`]
//! - [`child`] - Mappings that know the container they were built for

/// Stored values and the [`Node`] trait for typed objects.
pub mod entry;

/// Default template, overlay, parse hook and modification queries.
pub mod defaulted;

/// Parent-aware child mappings.
pub mod child;

pub use child::{ChildMap, ParentView};
pub use defaulted::{DefaultedMap, MapId, ParseContext, ParseMode, Schema, Storage};
pub use entry::{Entry, Mapping, Node, NodeClone, into_mapping};
