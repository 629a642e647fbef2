//! Identifier service: mints unique IDs for scopes, values, types and
//! instruction sets, with a monotonic counter per tag.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::Mutex;

/// Short type tag distinguishing what an [`Id`] addresses.
pub type Tag = &'static str;

pub const TAG_DATA: Tag = "data";
pub const TAG_SCOPE: Tag = "scope";
pub const TAG_INST: Tag = "inst";
pub const TAG_TYPE: Tag = "type";
pub const TAG_RI: Tag = "ri";

/// An addressable entity's identity: a tag, a monotonic index local to that
/// tag, and a display string. IDs never recycle within a process.
#[derive(Clone, Eq)]
pub struct Id {
    pub tag: Tag,
    pub index: u64,
    display: String,
}

impl Id {
    fn new(tag: Tag, index: u64) -> Self {
        let display = format!("#{tag}{index}");
        Id { tag, index, display }
    }

    fn with_display(tag: Tag, index: u64, display: String) -> Self {
        Id { tag, index, display }
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.index == other.index
    }
}

impl std::hash::Hash for Id {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Process-wide minter of [`Id`]s, one monotonic counter per tag.
#[derive(Default)]
pub struct IdMinter {
    counters: Mutex<HashMap<Tag, AtomicU64>>,
}

impl IdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, tag: Tag) -> Id {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(tag).or_insert_with(|| AtomicU64::new(0));
        let index = counter.fetch_add(1, Ordering::SeqCst);
        Id::new(tag, index)
    }

    /// Mints under `tag` with `prefix + counter` as the display string,
    /// rather than the default `#{tag}{counter}` (used by `Memory::acquire`
    /// to name scopes after the caller's prefix).
    pub fn mint_named(&self, tag: Tag, prefix: &str) -> Id {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(tag).or_insert_with(|| AtomicU64::new(0));
        let index = counter.fetch_add(1, Ordering::SeqCst);
        Id::with_display(tag, index, format!("{prefix}{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_never_recycle() {
        let minter = IdMinter::new();
        let a = minter.mint(TAG_DATA);
        let b = minter.mint(TAG_DATA);
        assert_ne!(a, b);
        assert_eq!(a.tag, TAG_DATA);
    }

    #[test]
    fn structural_equality_requires_same_tag() {
        let minter = IdMinter::new();
        let a = minter.mint(TAG_DATA);
        let b = minter.mint(TAG_SCOPE);
        assert_ne!(a, b);
    }
}
