// src/data/context.rs

use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use super::key::{DataKey, TypeTag};

/// Type-erased payload stored in a [`DataContext`].
pub type DataValue = Arc<dyn Any + Send + Sync>;

/// Concurrent registry of named, typed values for one execution.
///
/// Keys are `(name, type tag)`, so one name may hold a `String` and an
/// `i64` at the same time. Lookups fall through to the parent context when
/// the local map has no value; writes always stay local.
///
/// A slot created by [`prepare`](Self::prepare) but never filled does not
/// shadow a value in the parent.
#[derive(Default)]
pub struct DataContext {
    entries: DashMap<DataKey, Option<DataValue>>,
    parent: RwLock<Option<Arc<DataContext>>>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<DataContext>) -> Self {
        let ctx = Self::new();
        ctx.set_parent(Some(parent));
        ctx
    }

    pub fn set_parent(&self, parent: Option<Arc<DataContext>>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = parent;
    }

    pub fn parent(&self) -> Option<Arc<DataContext>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create an empty slot for `key` if none exists yet.
    pub fn prepare(&self, key: DataKey) {
        self.entries.entry(key).or_insert(None);
    }

    pub fn set<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.set_value(DataKey::of::<T>(name), Arc::new(value));
    }

    /// Store an already shared value under the tag of `T`.
    pub fn set_arc<T: Any + Send + Sync>(&self, name: impl Into<String>, value: Arc<T>) {
        self.set_value(DataKey::of::<T>(name), value);
    }

    pub fn set_value(&self, key: DataKey, value: DataValue) {
        self.entries.insert(key, Some(value));
    }

    /// Typed lookup through the parent chain.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.get_value(&DataKey::of::<T>(name))?;
        value.downcast::<T>().ok()
    }

    pub fn get_value(&self, key: &DataKey) -> Option<DataValue> {
        if let Some(value) = self.get_local_value(key) {
            return Some(value);
        }
        self.parent()?.get_value(key)
    }

    /// Lookup in this context only.
    pub fn get_local_value(&self, key: &DataKey) -> Option<DataValue> {
        self.entries.get(key).and_then(|slot| slot.value().clone())
    }

    /// Whether a value of any type is stored under `name`, here or in a parent.
    pub fn contains_name(&self, name: &str) -> bool {
        let local = self
            .entries
            .iter()
            .any(|slot| slot.key().name == name && slot.value().is_some());
        local || self.parent().is_some_and(|p| p.contains_name(name))
    }

    /// All locally stored values named `name`, one per type tag.
    pub fn entries_named(&self, name: &str) -> Vec<(TypeTag, DataValue)> {
        self.entries
            .iter()
            .filter(|slot| slot.key().name == name)
            .filter_map(|slot| slot.value().clone().map(|v| (slot.key().tag, v)))
            .collect()
    }

    /// Boolean stored under `name`, as written by config setting evaluation.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get::<bool>(name).map(|b| *b)
    }

    /// Number of locally filled slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|slot| slot.value().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detached copy of the locally filled slots. Values are shared, not
    /// cloned.
    pub fn snapshot(&self) -> DataContext {
        let copy = DataContext::new();
        for slot in self.entries.iter() {
            if let Some(value) = slot.value() {
                copy.entries.insert(slot.key().clone(), Some(value.clone()));
            }
        }
        copy
    }

    /// Drop every local slot and detach from the parent.
    pub fn reset(&self) {
        self.entries.clear();
        self.set_parent(None);
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|slot| slot.value().is_some())
            .map(|slot| slot.key().to_string())
            .collect();
        keys.sort();
        f.debug_struct("DataContext")
            .field("keys", &keys)
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}
