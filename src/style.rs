//! Style mutation engine.
//!
//! The backend restyles the client by issuing `changeCSS` commands. The
//! engine owns the live stylesheet for the session: commands append rule
//! text and are never edited afterwards, so precedence between repeated
//! writes to the same (selector, property) pair is plain last-rule-wins CSS
//! cascade. Durability goes through a separate table that always holds the
//! latest value per pair; rehydration replays that table, not the rule
//! history.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::{PersistenceStore, Slot};

/// The only command action the client understands.
pub const ACTION_CHANGE_CSS: &str = "changeCSS";

// ---------------------------------------------------------------------------
// Insertion-ordered map
// ---------------------------------------------------------------------------

/// String-keyed map that preserves insertion order and serializes as a JSON
/// object.
///
/// Overwriting an existing key keeps its original position, matching the
/// object semantics the persisted layout was designed around. Lookups are
/// linear; the tables involved hold a handful of selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or overwrite `key`. An overwrite keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a key mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Property name to CSS value text, insertion-ordered.
pub type PropertyMap = OrderedMap<String>;

/// Selector to [`PropertyMap`]; the persisted source of truth for
/// rehydration.
pub type StyleTable = OrderedMap<PropertyMap>;

// ---------------------------------------------------------------------------
// Style commands
// ---------------------------------------------------------------------------

/// One backend-issued style mutation, as embedded in a reply directive.
///
/// Property values are opaque: they are forwarded into rule text untouched,
/// never validated or interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCommand {
    /// Command kind; only [`ACTION_CHANGE_CSS`] has an effect.
    pub action: String,
    /// CSS selector the properties apply to.
    pub selector: String,
    /// Property/value pairs in source order.
    pub properties: PropertyMap,
}

impl StyleCommand {
    /// Whether this is a `changeCSS` command.
    pub fn is_change_css(&self) -> bool {
        self.action == ACTION_CHANGE_CSS
    }
}

// ---------------------------------------------------------------------------
// Live stylesheet
// ---------------------------------------------------------------------------

/// Append-only rule text for the current session.
///
/// Discarded with the session; rebuilt from the style table on the next one.
#[derive(Debug, Default)]
pub struct Stylesheet {
    blocks: Vec<String>,
}

impl Stylesheet {
    fn push_rule(&mut self, selector: &str, properties: &[(&str, &str)]) {
        let mut block = String::new();
        block.push_str(selector);
        block.push_str(" {\n");
        for (property, value) in properties {
            block.push_str("  ");
            block.push_str(property);
            block.push_str(": ");
            block.push_str(value);
            block.push_str(";\n");
        }
        block.push('}');
        self.blocks.push(block);
    }

    /// Full rule text, blocks in append order.
    pub fn css(&self) -> String {
        self.blocks.join("\n\n")
    }

    /// Number of rule blocks appended so far.
    pub fn rule_count(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no rules have been appended.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the live stylesheet and the persisted style table.
///
/// There is deliberately no removal operation: a property can only be
/// overridden by a later rule, never deleted. Reset happens by clearing the
/// styles slot and starting a fresh session.
pub struct StyleEngine {
    store: Arc<dyn PersistenceStore>,
    table: StyleTable,
    sheet: Stylesheet,
}

impl StyleEngine {
    /// Create an engine with an empty stylesheet over `store`.
    ///
    /// Call [`rehydrate`](Self::rehydrate) before applying any session
    /// commands so restored rules precede new ones.
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            table: StyleTable::new(),
            sheet: Stylesheet::default(),
        }
    }

    /// Rebuild the stylesheet from the persisted style table.
    ///
    /// Emits one rule block per selector covering all its recorded
    /// properties, in table insertion order. An absent or corrupt styles
    /// slot yields an empty sheet.
    pub fn rehydrate(&mut self) {
        let table = self
            .store
            .load(Slot::Styles)
            .and_then(|value| serde_json::from_value::<StyleTable>(value).ok())
            .unwrap_or_default();

        for (selector, properties) in table.iter() {
            let pairs: Vec<(&str, &str)> = properties
                .iter()
                .map(|(property, value)| (property, value.as_str()))
                .collect();
            self.sheet.push_rule(selector, &pairs);
        }
        self.table = table;
    }

    /// Apply one command: append rule text and update the persisted table.
    ///
    /// Each property becomes its own appended rule block, mirroring the
    /// per-property writes the command describes. Commands with an
    /// unrecognized action are ignored.
    pub fn apply(&mut self, command: &StyleCommand) {
        if !command.is_change_css() {
            tracing::debug!("ignoring command with action {:?}", command.action);
            return;
        }
        for (property, value) in command.properties.iter() {
            self.sheet.push_rule(&command.selector, &[(property, value.as_str())]);
            match self.table.get_mut(&command.selector) {
                Some(properties) => properties.insert(property, value.clone()),
                None => {
                    let mut properties = PropertyMap::new();
                    properties.insert(property, value.clone());
                    self.table.insert(command.selector.as_str(), properties);
                }
            }
        }
        self.persist();
    }

    /// Drop all in-memory style state. Used by reset; the styles slot is
    /// cleared separately by the caller.
    pub fn clear(&mut self) {
        self.table.clear();
        self.sheet = Stylesheet::default();
    }

    /// The live rule text.
    pub fn css(&self) -> String {
        self.sheet.css()
    }

    /// Number of rule blocks in the live sheet.
    pub fn rule_count(&self) -> usize {
        self.sheet.rule_count()
    }

    /// The persisted-table view of current style state.
    pub fn table(&self) -> &StyleTable {
        &self.table
    }

    fn persist(&self) {
        match serde_json::to_value(&self.table) {
            Ok(value) => {
                if let Err(err) = self.store.save(Slot::Styles, &value) {
                    tracing::warn!("failed to persist style table: {}", err);
                }
            }
            Err(err) => tracing::warn!("failed to serialize style table: {}", err),
        }
    }
}
