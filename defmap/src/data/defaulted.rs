use std::{
    any::type_name,
    collections::BTreeMap,
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    data::{
        child::ParentView,
        entry::{Entry, Mapping, Node},
    },
    error::{Error, Result},
};

/// Key/value state of a container.
pub type Storage = BTreeMap<String, Entry>;

/// When the parse hook runs at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Run the hook unconditionally.
    #[default]
    Always,
    /// Never run the hook.
    Never,
    /// Run the hook only when the caller supplied at least one entry.
    #[serde(rename = "if_data_nonempty")]
    IfDataNonEmpty,
}

impl ParseMode {
    /// Decide whether the hook runs for the given caller data.
    pub fn should_parse(self, data: &Mapping) -> bool {
        match self {
            ParseMode::Always => true,
            ParseMode::Never => false,
            ParseMode::IfDataNonEmpty => !data.is_empty(),
        }
    }
}

impl FromStr for ParseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "always" => Ok(ParseMode::Always),
            "never" => Ok(ParseMode::Never),
            "if_data_nonempty" => Ok(ParseMode::IfDataNonEmpty),
            other => Err(anyhow!("unknown parse mode: {other:?}").into()),
        }
    }
}

/// Per-type behavior of a [`DefaultedMap`].
///
/// Implement this on a marker type to declare the default template and the
/// parse hook that turns raw sub-mappings into typed children.
///
/// ```rust
/// use defmap::{DefaultedMap, Mapping, Schema};
/// use serde_json::json;
///
/// struct Audio;
///
/// impl Schema for Audio {
///     type Args = ();
///
///     fn defaults() -> Mapping {
///         let mut m = Mapping::new();
///         m.insert("volume".into(), json!(50));
///         m
///     }
/// }
///
/// let audio = DefaultedMap::<Audio>::with_data(Mapping::new(), &()).unwrap();
/// assert_eq!(audio.to_value(), json!({"volume": 50}));
/// ```
pub trait Schema: Sized + 'static {
    /// Extra arguments forwarded to [`Schema::parse`].
    type Args;

    /// Default factory. Must return a fresh, equal mapping on every call.
    fn defaults() -> Mapping {
        Mapping::new()
    }

    /// Parse hook, run once at construction according to [`ParseMode`].
    fn parse(map: &mut DefaultedMap<Self>, cx: &ParseContext<'_, Self::Args>) -> Result<()> {
        let _ = (map, cx);
        Ok(())
    }
}

/// What a parse hook sees besides the container itself.
pub struct ParseContext<'a, A> {
    args: &'a A,
    parent: Option<&'a dyn ParentView>,
}

impl<'a, A> ParseContext<'a, A> {
    pub fn new(args: &'a A) -> Self {
        Self { args, parent: None }
    }

    pub(crate) fn with_parent(args: &'a A, parent: &'a dyn ParentView) -> Self {
        Self {
            args,
            parent: Some(parent),
        }
    }

    /// Arguments given at construction.
    pub fn args(&self) -> &'a A {
        self.args
    }

    /// The logical parent, when the container is being built as a child.
    pub fn parent(&self) -> Option<&'a dyn ParentView> {
        self.parent
    }
}

/// Process-unique identity of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u64);

impl MapId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        MapId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mapping initialized from `S::defaults()`, overlaid with caller data and
/// optionally parsed into typed children.
///
/// Dereferences to its [`Storage`], so ordinary map operations apply. Parsing
/// only happens at construction; later mutation never re-triggers it.
pub struct DefaultedMap<S: Schema> {
    id: MapId,
    storage: Storage,
    schema: PhantomData<fn() -> S>,
}

impl<S: Schema> DefaultedMap<S> {
    /// Build from optional caller data.
    ///
    /// `None` means no data was supplied and behaves like an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns whatever the parse hook returns.
    pub fn new(data: Option<Mapping>, mode: ParseMode, args: &S::Args) -> Result<Self> {
        Self::build(data, mode, ParseContext::new(args))
    }

    /// Build from caller data with [`ParseMode::Always`].
    pub fn with_data(data: Mapping, args: &S::Args) -> Result<Self> {
        Self::new(Some(data), ParseMode::Always, args)
    }

    pub(crate) fn build(
        data: Option<Mapping>,
        mode: ParseMode,
        cx: ParseContext<'_, S::Args>,
    ) -> Result<Self> {
        let data = data.unwrap_or_default();
        let mut map = Self {
            id: MapId::next(),
            storage: Storage::new(),
            schema: PhantomData,
        };

        map.overlay(S::defaults());
        let parse = mode.should_parse(&data);
        trace!("{} {}: overlaying {} keys", type_name::<S>(), map.id, data.len());
        map.overlay(data);

        if parse {
            debug!("{} {}: running parse hook", type_name::<S>(), map.id);
            S::parse(&mut map, &cx)?;
        } else {
            debug!("{} {}: parse skipped ({mode:?})", type_name::<S>(), map.id);
        }
        Ok(map)
    }

    fn overlay(&mut self, mapping: Mapping) {
        for (key, value) in mapping {
            self.storage.insert(key, Entry::Value(value));
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    /// A fresh default mapping for this type.
    pub fn default_mapping() -> Mapping {
        S::defaults()
    }

    /// Overlay the current defaults onto the storage.
    ///
    /// Keys absent from the defaults are left alone.
    pub fn reset(&mut self) {
        trace!("{} {}: reset", type_name::<S>(), self.id);
        self.overlay(S::defaults());
    }

    fn keys_matching_default(&self, equal: bool) -> impl Iterator<Item = &str> {
        let defaults = S::defaults();
        self.storage.iter().filter_map(move |(key, value)| {
            let default = defaults.get(key)?;
            ((value == default) == equal).then_some(key.as_str())
        })
    }

    /// Keys whose value differs from the default.
    ///
    /// Only keys present in both the storage and the defaults are compared.
    pub fn modified_values(&self) -> impl Iterator<Item = &str> {
        self.keys_matching_default(false)
    }

    /// Keys whose value equals the default.
    pub fn unmodified_values(&self) -> impl Iterator<Item = &str> {
        self.keys_matching_default(true)
    }

    pub fn has_modified_values(&self) -> bool {
        self.modified_values().next().is_some()
    }

    /// Keys that were never declared as defaults.
    pub fn keys_not_in_default(&self) -> impl Iterator<Item = &str> {
        let defaults = S::defaults();
        self.storage
            .keys()
            .filter(move |key| !defaults.contains_key(key.as_str()))
            .map(String::as_str)
    }

    pub fn has_extra_keys(&self) -> bool {
        self.keys_not_in_default().next().is_some()
    }

    /// Typed access to a child built by the parse hook.
    pub fn get_as<T: Node>(&self, key: &str) -> Option<&T> {
        self.storage.get(key)?.downcast_ref()
    }

    pub fn get_as_mut<T: Node>(&mut self, key: &str) -> Option<&mut T> {
        self.storage.get_mut(key)?.downcast_mut()
    }

    /// Raw snapshot of the whole tree.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.storage
                .iter()
                .map(|(key, entry)| (key.clone(), entry.to_value()))
                .collect(),
        )
    }

    pub fn into_storage(self) -> Storage {
        self.storage
    }
}

impl<S: Schema> Deref for DefaultedMap<S> {
    type Target = Storage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

impl<S: Schema> DerefMut for DefaultedMap<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.storage
    }
}

/// Cloning yields a new container with its own identity. Children of the
/// original are re-pointed at the copy.
impl<S: Schema> Clone for DefaultedMap<S> {
    fn clone(&self) -> Self {
        let id = MapId::next();
        let mut storage = self.storage.clone();
        for entry in storage.values_mut() {
            if let Entry::Node(node) = entry {
                node.reparent(self.id, id);
            }
        }
        Self {
            id,
            storage,
            schema: PhantomData,
        }
    }
}

impl<S: Schema> fmt::Debug for DefaultedMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultedMap")
            .field("schema", &type_name::<S>())
            .field("id", &self.id)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<S: Schema> Node for DefaultedMap<S> {
    fn to_value(&self) -> Value {
        DefaultedMap::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::BTreeSet};

    use super::*;
    use crate::data::entry::into_mapping;
    use serde_json::json;

    struct Settings;

    impl Schema for Settings {
        type Args = ();

        fn defaults() -> Mapping {
            into_mapping(json!({"volume": 10, "quality": "low", "muted": false})).unwrap()
        }
    }

    /// Counts hook invocations through its args.
    struct Counted;

    impl Schema for Counted {
        type Args = Cell<usize>;

        fn defaults() -> Mapping {
            into_mapping(json!({"a": 1})).unwrap()
        }

        fn parse(map: &mut DefaultedMap<Self>, cx: &ParseContext<'_, Cell<usize>>) -> Result<()> {
            cx.args().set(cx.args().get() + 1);
            map.insert("parsed".into(), json!(true).into());
            Ok(())
        }
    }

    struct Failing;

    impl Schema for Failing {
        type Args = ();

        fn parse(_: &mut DefaultedMap<Self>, _: &ParseContext<'_, ()>) -> Result<()> {
            Err(anyhow!("bad data").into())
        }
    }

    fn settings(data: serde_json::Value) -> DefaultedMap<Settings> {
        DefaultedMap::new(Some(into_mapping(data).unwrap()), ParseMode::Never, &()).unwrap()
    }

    fn keys<'a>(it: impl Iterator<Item = &'a str>) -> BTreeSet<&'a str> {
        it.collect()
    }

    #[test]
    fn test_data_overlays_defaults() {
        let _ = env_logger::builder().is_test(true).try_init();

        let map = settings(json!({"volume": 21, "shader": "fxaa"}));
        assert_eq!(
            map.to_value(),
            json!({"volume": 21, "quality": "low", "muted": false, "shader": "fxaa"})
        );
    }

    #[test]
    fn test_no_data_is_defaults() {
        let map = DefaultedMap::<Settings>::new(None, ParseMode::Always, &()).unwrap();
        assert_eq!(
            map.to_value(),
            serde_json::Value::Object(DefaultedMap::<Settings>::default_mapping())
        );
        assert!(!map.has_modified_values());
        assert!(!map.has_extra_keys());
    }

    #[test]
    fn test_reset() {
        let mut map = settings(json!({"volume": 21}));
        map.insert("quality".into(), json!("high").into());
        map.insert("extra".into(), json!(1).into());

        map.reset();
        let once = map.to_value();
        assert_eq!(
            once,
            json!({"volume": 10, "quality": "low", "muted": false, "extra": 1})
        );

        map.reset();
        assert_eq!(map.to_value(), once);
    }

    #[test]
    fn test_modified_unmodified_partition() {
        let mut map = settings(json!({"volume": 21, "muted": false, "shader": "fxaa"}));
        map.insert("late".into(), json!(null).into());

        let modified = keys(map.modified_values());
        let unmodified = keys(map.unmodified_values());
        assert_eq!(modified, BTreeSet::from(["volume"]));
        assert_eq!(unmodified, BTreeSet::from(["muted", "quality"]));
        assert!(modified.is_disjoint(&unmodified));

        let extra = keys(map.keys_not_in_default());
        assert_eq!(extra, BTreeSet::from(["late", "shader"]));
        assert!(map.has_extra_keys());
        assert!(map.has_modified_values());
    }

    #[test]
    fn test_extra_keys_alone_are_not_modifications() {
        let map = settings(json!({"shader": "fxaa"}));
        assert!(!map.has_modified_values());
        assert!(map.has_extra_keys());
    }

    #[test]
    fn test_removed_default_key_is_not_compared() {
        let mut map = settings(json!({}));
        map.remove("volume");
        assert!(!keys(map.unmodified_values()).contains("volume"));
        assert!(!keys(map.modified_values()).contains("volume"));
    }

    #[test]
    fn test_parse_modes() {
        let calls = Cell::new(0);
        let data = || Some(into_mapping(json!({"b": 2})).unwrap());

        let map = DefaultedMap::<Counted>::new(None, ParseMode::IfDataNonEmpty, &calls).unwrap();
        assert_eq!(calls.get(), 0);
        assert!(!map.contains_key("parsed"));

        DefaultedMap::<Counted>::new(Some(Mapping::new()), ParseMode::IfDataNonEmpty, &calls)
            .unwrap();
        assert_eq!(calls.get(), 0);

        let map = DefaultedMap::<Counted>::new(data(), ParseMode::IfDataNonEmpty, &calls).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(map.get("parsed"), Some(&Entry::from(json!(true))));

        DefaultedMap::<Counted>::new(None, ParseMode::Always, &calls).unwrap();
        assert_eq!(calls.get(), 2);

        DefaultedMap::<Counted>::new(data(), ParseMode::Never, &calls).unwrap();
        DefaultedMap::<Counted>::new(None, ParseMode::Never, &calls).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_mutation_does_not_reparse() {
        let calls = Cell::new(0);
        let mut map = DefaultedMap::<Counted>::with_data(Mapping::new(), &calls).unwrap();
        map.insert("b".into(), json!({"nested": 1}).into());
        map.reset();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_parse_error_propagates() {
        let err = DefaultedMap::<Failing>::new(None, ParseMode::Always, &()).unwrap_err();
        assert_eq!(err.to_string(), "bad data");

        assert!(DefaultedMap::<Failing>::new(None, ParseMode::IfDataNonEmpty, &()).is_ok());
    }

    #[test]
    fn test_defaults_are_fresh() {
        let mut map = settings(json!({}));
        map.insert("volume".into(), json!(99).into());
        assert_eq!(
            DefaultedMap::<Settings>::default_mapping().get("volume"),
            Some(&json!(10))
        );
        assert_eq!(
            DefaultedMap::<Settings>::default_mapping(),
            DefaultedMap::<Settings>::default_mapping()
        );
    }

    #[test]
    fn test_clone_gets_new_identity() {
        let map = settings(json!({"volume": 1}));
        let copy = map.clone();
        assert_ne!(map.id(), copy.id());
        assert_eq!(map.to_value(), copy.to_value());
    }

    #[test]
    fn test_parse_mode_from_config() {
        assert_eq!(
            "if_data_nonempty".parse::<ParseMode>().unwrap(),
            ParseMode::IfDataNonEmpty
        );
        assert!("ifdata".parse::<ParseMode>().is_err());

        let mode: ParseMode = serde_json::from_value(json!("never")).unwrap();
        assert_eq!(mode, ParseMode::Never);
        assert_eq!(
            serde_json::to_value(ParseMode::IfDataNonEmpty).unwrap(),
            json!("if_data_nonempty")
        );
        assert_eq!(ParseMode::default(), ParseMode::Always);
    }
}
