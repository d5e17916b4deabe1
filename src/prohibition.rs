//! Prohibition set — cells excluded from automated healing
//!
//! A cell enters the set when a healing sequence exhausts its budget and
//! leaves it only when it is later observed `STARTED`, whoever fixed it.
//! Owned by the reconciler; lives for the process lifetime only.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::CellId;

#[derive(Debug, Default, Clone)]
pub struct ProhibitionSet {
    entries: HashMap<CellId, DateTime<Utc>>,
}

impl ProhibitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.entries.contains_key(id)
    }

    /// Add a cell. Returns `false` if it was already prohibited, keeping the
    /// original timestamp.
    pub fn prohibit(&mut self, id: CellId) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, Utc::now());
        true
    }

    /// Remove a cell, returning when it was prohibited.
    pub fn release(&mut self, id: &CellId) -> Option<DateTime<Utc>> {
        self.entries.remove(id)
    }

    /// When `id` was prohibited, if it is.
    pub fn prohibited_since(&self, id: &CellId) -> Option<DateTime<Utc>> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prohibited cell ids, sorted for stable log output.
    pub fn ids(&self) -> Vec<&CellId> {
        let mut ids: Vec<&CellId> = self.entries.keys().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prohibit_and_release() {
        let mut set = ProhibitionSet::new();
        let id = CellId::new("aaaa-1");

        assert!(set.prohibit(id.clone()));
        assert!(set.contains(&id));
        assert!(!set.prohibit(id.clone()), "second prohibit is a no-op");
        assert_eq!(set.len(), 1);

        assert!(set.release(&id).is_some());
        assert!(!set.contains(&id));
        assert!(set.release(&id).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_reprohibit_keeps_first_timestamp() {
        let mut set = ProhibitionSet::new();
        let id = CellId::new("aaaa-1");
        set.prohibit(id.clone());
        let first = set.prohibited_since(&id);
        set.prohibit(id.clone());
        assert_eq!(set.prohibited_since(&id), first);
    }

    #[test]
    fn test_ids_sorted() {
        let mut set = ProhibitionSet::new();
        set.prohibit(CellId::new("c"));
        set.prohibit(CellId::new("a"));
        set.prohibit(CellId::new("b"));
        let ids: Vec<&str> = set.ids().into_iter().map(CellId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
