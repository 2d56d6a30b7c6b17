use std::{
    any::type_name,
    fmt,
    ops::{Deref, DerefMut},
};

use serde_json::Value;

use crate::{
    data::{
        defaulted::{DefaultedMap, MapId, ParseContext, ParseMode, Schema},
        entry::{Entry, Mapping, Node},
    },
    error::Result,
};

/// Read-only view of a container, handed to a child's parse hook so it can
/// look upward while the tree is being built.
pub trait ParentView {
    fn id(&self) -> MapId;

    fn lookup(&self, key: &str) -> Option<&Entry>;

    /// The view one level further up, while that level is still being built.
    fn parent_view(&self) -> Option<&dyn ParentView> {
        None
    }
}

impl<S: Schema> ParentView for DefaultedMap<S> {
    fn id(&self) -> MapId {
        DefaultedMap::id(self)
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.get(key)
    }
}

/// A [`DefaultedMap`] that remembers which container it was built for.
///
/// The parent is recorded by identity only. The parent owns the child, never
/// the other way around.
pub struct ChildMap<S: Schema> {
    parent: MapId,
    map: DefaultedMap<S>,
}

impl<S: Schema> ChildMap<S> {
    /// Build a child of `parent`.
    ///
    /// The parent is known before defaults and data are merged, and the parse
    /// hook reaches it through [`ParseContext::parent`].
    pub fn new(
        parent: &dyn ParentView,
        data: Option<Mapping>,
        mode: ParseMode,
        args: &S::Args,
    ) -> Result<Self> {
        let parent_id = parent.id();
        let map = DefaultedMap::build(data, mode, ParseContext::with_parent(args, parent))?;
        Ok(Self {
            parent: parent_id,
            map,
        })
    }

    pub fn parent(&self) -> MapId {
        self.parent
    }

    pub fn is_child_of(&self, parent: &dyn ParentView) -> bool {
        self.parent == parent.id()
    }

    pub fn into_inner(self) -> DefaultedMap<S> {
        self.map
    }
}

impl<S: Schema> Deref for ChildMap<S> {
    type Target = DefaultedMap<S>;

    fn deref(&self) -> &Self::Target {
        &self.map
    }
}

impl<S: Schema> DerefMut for ChildMap<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.map
    }
}

impl<S: Schema> Clone for ChildMap<S> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent,
            map: self.map.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for ChildMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildMap")
            .field("schema", &type_name::<S>())
            .field("parent", &self.parent)
            .field("id", &self.map.id())
            .field("storage", &*self.map)
            .finish()
    }
}

impl<S: Schema> ParentView for ChildMap<S> {
    fn id(&self) -> MapId {
        self.map.id()
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.map.get(key)
    }
}

impl<S: Schema> Node for ChildMap<S> {
    fn to_value(&self) -> Value {
        self.map.to_value()
    }

    fn reparent(&mut self, from: MapId, to: MapId) {
        if self.parent == from {
            self.parent = to;
        }
    }
}
