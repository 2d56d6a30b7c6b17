//! Keyed construction: replacing raw values with typed objects.
//!
//! A parse hook calls these helpers to turn the raw sub-mapping stored under a
//! key into a typed value, usually another [`DefaultedMap`] or [`ChildMap`],
//! which in turn parses its own children. The replacement is assigned only
//! after the target was built successfully.

use crate::{
    data::{
        child::{ChildMap, ParentView},
        defaulted::{DefaultedMap, MapId, ParseContext, ParseMode, Schema},
        entry::{Entry, Node, into_mapping},
    },
    error::{Error, Result},
};

/// A type that can be built from the raw value under a key.
pub trait Construct: Node + Sized {
    type Args;

    /// Build from the enclosing container and the raw value.
    fn construct(container: &dyn ParentView, raw: Entry, args: &Self::Args) -> Result<Self>;
}

/// A type that is built as a child of the container holding it.
pub trait ConstructChild: Node + Sized {
    type Args;

    fn construct_child(parent: &dyn ParentView, data: Entry, args: &Self::Args) -> Result<Self>;
}

impl<S: Schema> Construct for DefaultedMap<S> {
    type Args = S::Args;

    fn construct(_container: &dyn ParentView, raw: Entry, args: &S::Args) -> Result<Self> {
        let data = into_mapping(raw.into_value())?;
        DefaultedMap::new(Some(data), ParseMode::Always, args)
    }
}

impl<S: Schema> ConstructChild for ChildMap<S> {
    type Args = S::Args;

    fn construct_child(parent: &dyn ParentView, data: Entry, args: &S::Args) -> Result<Self> {
        let data = into_mapping(data.into_value())?;
        ChildMap::new(parent, Some(data), ParseMode::Always, args)
    }
}

/// A container that is still being built, seen together with its own parent.
struct Nested<'a, S: Schema> {
    map: &'a DefaultedMap<S>,
    parent: Option<&'a dyn ParentView>,
}

impl<S: Schema> ParentView for Nested<'_, S> {
    fn id(&self) -> MapId {
        self.map.id()
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.map.get(key)
    }

    fn parent_view(&self) -> Option<&dyn ParentView> {
        self.parent
    }
}

fn replace_at_key<S, F>(
    container: &mut DefaultedMap<S>,
    parent: Option<&dyn ParentView>,
    key: &str,
    build: F,
) -> Result<()>
where
    S: Schema,
    F: FnOnce(&dyn ParentView, Entry) -> Result<Entry>,
{
    let raw = container.get(key).cloned().ok_or_else(|| Error::KeyNotFound {
        key: key.to_string(),
    })?;

    let view: &dyn ParentView = &Nested {
        map: &*container,
        parent,
    };
    let built = build(view, raw)?;

    debug!("{}: {key:?} replaced by a typed value", container.id());
    container.insert(key.to_string(), built);
    Ok(())
}

/// Replace the value under `key` with `T` built from it.
///
/// # Errors
///
/// [`Error::KeyNotFound`] when `key` is absent, otherwise whatever `T` fails
/// with. The container is untouched on failure.
pub fn construct_at_key<S, T>(
    container: &mut DefaultedMap<S>,
    key: &str,
    args: &T::Args,
) -> Result<()>
where
    S: Schema,
    T: Construct,
{
    replace_at_key(container, None, key, |view, raw| {
        T::construct(view, raw, args).map(Entry::node)
    })
}

/// Like [`construct_at_key`], with `container` passed on as the parent of `T`.
pub fn construct_child_at_key<S, T>(
    container: &mut DefaultedMap<S>,
    key: &str,
    args: &T::Args,
) -> Result<()>
where
    S: Schema,
    T: ConstructChild,
{
    replace_at_key(container, None, key, |view, raw| {
        T::construct_child(view, raw, args).map(Entry::node)
    })
}

type Builder<'a> = Box<dyn FnOnce(&dyn ParentView, Entry) -> Result<Entry> + 'a>;

/// A `(key, target type, args)` triple for [`apply_construction_directives`].
pub struct Directive<'a> {
    key: String,
    build: Builder<'a>,
}

impl<'a> Directive<'a> {
    pub fn new<T>(key: impl Into<String>, args: T::Args) -> Self
    where
        T: Construct,
        T::Args: 'a,
    {
        Self {
            key: key.into(),
            build: Box::new(move |view: &dyn ParentView, raw: Entry| {
                T::construct(view, raw, &args).map(Entry::node)
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A `(key, target type, args)` triple for
/// [`apply_construction_directives_child`].
pub struct ChildDirective<'a> {
    key: String,
    build: Builder<'a>,
}

impl<'a> ChildDirective<'a> {
    pub fn new<T>(key: impl Into<String>, args: T::Args) -> Self
    where
        T: ConstructChild,
        T::Args: 'a,
    {
        Self {
            key: key.into(),
            build: Box::new(move |view: &dyn ParentView, raw: Entry| {
                T::construct_child(view, raw, &args).map(Entry::node)
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Apply directives in order.
///
/// Each directive sees the container as left by the previous ones. The first
/// failure stops the batch; replacements already made stay in place.
pub fn apply_construction_directives<'a, S: Schema>(
    container: &mut DefaultedMap<S>,
    directives: impl IntoIterator<Item = Directive<'a>>,
) -> Result<()> {
    for Directive { key, build } in directives {
        replace_at_key(container, None, &key, build)?;
    }
    Ok(())
}

/// Apply child directives in order, threading `container` as the parent.
pub fn apply_construction_directives_child<'a, S: Schema>(
    container: &mut DefaultedMap<S>,
    directives: impl IntoIterator<Item = ChildDirective<'a>>,
) -> Result<()> {
    for ChildDirective { key, build } in directives {
        replace_at_key(container, None, &key, build)?;
    }
    Ok(())
}

/// The keyed-construction helpers, called from inside a parse hook.
///
/// Unlike the free functions, these keep the whole chain of containers under
/// construction reachable: a child built here sees `container` as its parent,
/// and [`ParentView::parent_view`] on that leads further up.
impl<A> ParseContext<'_, A> {
    pub fn construct_at_key<S, T>(
        &self,
        container: &mut DefaultedMap<S>,
        key: &str,
        args: &T::Args,
    ) -> Result<()>
    where
        S: Schema,
        T: Construct,
    {
        replace_at_key(container, self.parent(), key, |view, raw| {
            T::construct(view, raw, args).map(Entry::node)
        })
    }

    pub fn construct_child_at_key<S, T>(
        &self,
        container: &mut DefaultedMap<S>,
        key: &str,
        args: &T::Args,
    ) -> Result<()>
    where
        S: Schema,
        T: ConstructChild,
    {
        replace_at_key(container, self.parent(), key, |view, raw| {
            T::construct_child(view, raw, args).map(Entry::node)
        })
    }

    pub fn apply_construction_directives<'d, S: Schema>(
        &self,
        container: &mut DefaultedMap<S>,
        directives: impl IntoIterator<Item = Directive<'d>>,
    ) -> Result<()> {
        for Directive { key, build } in directives {
            replace_at_key(container, self.parent(), &key, build)?;
        }
        Ok(())
    }

    pub fn apply_construction_directives_child<'d, S: Schema>(
        &self,
        container: &mut DefaultedMap<S>,
        directives: impl IntoIterator<Item = ChildDirective<'d>>,
    ) -> Result<()> {
        for ChildDirective { key, build } in directives {
            replace_at_key(container, self.parent(), &key, build)?;
        }
        Ok(())
    }
}
