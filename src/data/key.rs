// src/data/key.rs

//! Typed data keys.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Small process-wide integer identifying a payload type.
///
/// Tags are handed out in first-use order; the same Rust type always maps
/// to the same tag for the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u32);

#[derive(Default)]
struct TagTable {
    by_type: HashMap<TypeId, TypeTag>,
    names: Vec<&'static str>,
}

fn tag_table() -> &'static RwLock<TagTable> {
    static TABLE: OnceLock<RwLock<TagTable>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(TagTable::default()))
}

impl TypeTag {
    /// Tag for `T`, assigning a new one on first use.
    pub fn of<T: Any>() -> Self {
        let type_id = TypeId::of::<T>();

        {
            let table = tag_table().read().unwrap_or_else(PoisonError::into_inner);
            if let Some(tag) = table.by_type.get(&type_id) {
                return *tag;
            }
        }

        let mut table = tag_table().write().unwrap_or_else(PoisonError::into_inner);
        if let Some(tag) = table.by_type.get(&type_id) {
            return *tag;
        }
        let tag = TypeTag(table.names.len() as u32);
        table.names.push(std::any::type_name::<T>());
        table.by_type.insert(type_id, tag);
        tag
    }

    pub fn id(self) -> u32 {
        self.0
    }

    /// Rust type name the tag was assigned for.
    pub fn type_name(self) -> &'static str {
        let table = tag_table().read().unwrap_or_else(PoisonError::into_inner);
        table.names.get(self.0 as usize).copied().unwrap_or("<unknown>")
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({}: {})", self.0, self.type_name())
    }
}

/// Identity of one value slot in a [`DataContext`](super::DataContext):
/// a data name plus the tag of the payload type stored under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataKey {
    pub name: String,
    pub tag: TypeTag,
}

impl DataKey {
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }

    pub fn of<T: Any>(name: impl Into<String>) -> Self {
        Self::new(name, TypeTag::of::<T>())
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.name, self.tag.type_name())
    }
}
