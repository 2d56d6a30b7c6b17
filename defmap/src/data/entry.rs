use std::{any::Any, fmt};

use serde_json::Value;

use crate::{
    data::defaulted::MapId,
    error::{Error, Result},
};

/// A raw mapping, as produced by `serde_json` (or converted from TOML).
pub type Mapping = serde_json::Map<String, Value>;

/// A typed object that can be stored under a key in place of a raw value.
///
/// `to_value` gives the raw snapshot the object stands for. Containers compare
/// that snapshot against their defaults, so a typed child holding exactly the
/// default content still counts as unmodified.
pub trait Node: NodeClone + Any + fmt::Debug {
    /// Raw snapshot of this object.
    fn to_value(&self) -> Value;

    /// Called on each stored node when its container is cloned, so nodes
    /// that point at `from` can point at the copy `to` instead.
    fn reparent(&mut self, from: MapId, to: MapId) {
        let _ = (from, to);
    }
}

/// Boxed cloning for [`Node`]; implemented for every `Node + Clone`.
pub trait NodeClone {
    fn clone_node(&self) -> Box<dyn Node>;
}

impl<T: Node + Clone> NodeClone for T {
    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Node> {
    fn clone(&self) -> Self {
        (**self).clone_node()
    }
}

/// A value stored in a container.
#[derive(Debug, Clone)]
pub enum Entry {
    /// Raw data, untouched since it was merged in.
    Value(Value),
    /// A typed object built from raw data by a parse hook.
    Node(Box<dyn Node>),
}

impl Entry {
    /// Wrap a typed object.
    pub fn node(node: impl Node) -> Self {
        Entry::Node(Box::new(node))
    }

    /// Raw snapshot of the entry.
    pub fn to_value(&self) -> Value {
        match self {
            Entry::Value(v) => v.clone(),
            Entry::Node(n) => n.to_value(),
        }
    }

    /// Consume the entry into its raw snapshot.
    pub fn into_value(self) -> Value {
        match self {
            Entry::Value(v) => v,
            Entry::Node(n) => n.to_value(),
        }
    }

    /// The raw value, if this entry has not been replaced by a typed object.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Entry::Node(_))
    }

    /// Borrow the typed object as `T`.
    pub fn downcast_ref<T: Node>(&self) -> Option<&T> {
        match self {
            Entry::Node(n) => (&**n as &dyn Any).downcast_ref(),
            Entry::Value(_) => None,
        }
    }

    /// Mutably borrow the typed object as `T`.
    pub fn downcast_mut<T: Node>(&mut self) -> Option<&mut T> {
        match self {
            Entry::Node(n) => (&mut **n as &mut dyn Any).downcast_mut(),
            Entry::Value(_) => None,
        }
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Entry::Value(value)
    }
}

impl From<Mapping> for Entry {
    fn from(value: Mapping) -> Self {
        Entry::Value(Value::Object(value))
    }
}

impl PartialEq<Value> for Entry {
    fn eq(&self, other: &Value) -> bool {
        match self {
            Entry::Value(v) => v == other,
            Entry::Node(n) => &n.to_value() == other,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        match other {
            Entry::Value(v) => self == v,
            Entry::Node(n) => self == &n.to_value(),
        }
    }
}

/// Interpret a raw value as the data mapping of a container.
///
/// `null` means "no data" and yields an empty mapping.
pub fn into_mapping(value: Value) -> Result<Mapping> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(Error::NotAMapping {
            found: format!("{}", other),
        }),
    }
}
