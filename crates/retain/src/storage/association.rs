//! Association index over long-term memories
//!
//! Links are stored as symmetric id sets on the items themselves; the
//! long-term map acts as the arena. Only long-term memories can be linked.

use tracing::{debug, warn};

use crate::error::{Result, RetainError};
use crate::memory::types::{MemoryId, MemoryItem};
use crate::storage::tiers::TierStore;

impl TierStore {
    /// Link two long-term memories.
    ///
    /// Returns `Ok(true)` when a new link was created and `Ok(false)` when the
    /// pair was already linked. Either both directions are written or neither.
    pub fn associate(&mut self, a: MemoryId, b: MemoryId) -> Result<bool> {
        self.check_pair(a, b)?;

        let already = self
            .long_term
            .get(&a)
            .is_some_and(|item| item.associations.contains(&b));
        if already {
            return Ok(false);
        }

        // Both ids were checked above, so both lookups succeed.
        if let Some(item) = self.long_term.get_mut(&a) {
            item.associations.insert(b);
        }
        if let Some(item) = self.long_term.get_mut(&b) {
            item.associations.insert(a);
        }

        debug!(%a, %b, "associated memories");
        Ok(true)
    }

    /// Remove the link between two long-term memories.
    ///
    /// Returns `Ok(false)` if they were not linked.
    pub fn dissociate(&mut self, a: MemoryId, b: MemoryId) -> Result<bool> {
        self.check_pair(a, b)?;

        let removed_ab = self
            .long_term
            .get_mut(&a)
            .is_some_and(|item| item.associations.remove(&b));
        let removed_ba = self
            .long_term
            .get_mut(&b)
            .is_some_and(|item| item.associations.remove(&a));

        if removed_ab || removed_ba {
            debug!(%a, %b, "dissociated memories");
        }
        Ok(removed_ab || removed_ba)
    }

    /// Resolve the memories linked to `id`.
    ///
    /// Links that no longer resolve are left out of the result, logged once
    /// and pruned so they are not reported again.
    pub fn related(&mut self, id: MemoryId) -> Result<Vec<MemoryItem>> {
        let links = match self.long_term.get(&id) {
            Some(item) => item.associations.clone(),
            None => return Err(self.long_term_miss(id)),
        };

        let mut related = Vec::with_capacity(links.len());
        let mut stale = Vec::new();
        for peer in links {
            match self.long_term.get(&peer) {
                Some(item) => related.push(item.clone()),
                None => stale.push(peer),
            }
        }

        if !stale.is_empty() {
            if let Some(item) = self.long_term.get_mut(&id) {
                for peer in &stale {
                    item.associations.remove(peer);
                    let error = RetainError::StaleReference {
                        id: *peer,
                        referenced_by: id,
                    };
                    warn!(%error, "pruned stale association");
                }
            }
        }

        related.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(related)
    }

    /// Both ids must be distinct long-term memories
    fn check_pair(&self, a: MemoryId, b: MemoryId) -> Result<()> {
        if !self.long_term.contains_key(&a) {
            return Err(self.long_term_miss(a));
        }
        if !self.long_term.contains_key(&b) {
            return Err(self.long_term_miss(b));
        }
        if a == b {
            return Err(RetainError::InvalidItem(format!(
                "memory {a} cannot be associated with itself"
            )));
        }
        Ok(())
    }

    fn long_term_miss(&self, id: MemoryId) -> RetainError {
        match self.tier_of(id) {
            Some(tier) => RetainError::NotFound(format!("memory {id} is in {tier}, not long_term")),
            None => RetainError::memory_not_found(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Tier;
    use crate::storage::tiers::TierConfig;
    use crate::testing::item;

    fn store_with_long_term(n: usize) -> (TierStore, Vec<MemoryId>) {
        let mut store = TierStore::new(TierConfig::default());
        let ids = (0..n)
            .map(|_| store.store(item(0.9, Tier::LongTerm)).unwrap())
            .collect();
        (store, ids)
    }

    #[test]
    fn test_associate_is_symmetric() {
        let (mut store, ids) = store_with_long_term(2);

        assert!(store.associate(ids[0], ids[1]).unwrap());

        assert!(store.get(ids[0]).unwrap().associations.contains(&ids[1]));
        assert!(store.get(ids[1]).unwrap().associations.contains(&ids[0]));
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_associate_twice_is_noop() {
        let (mut store, ids) = store_with_long_term(2);

        assert!(store.associate(ids[0], ids[1]).unwrap());
        assert!(!store.associate(ids[1], ids[0]).unwrap());
        assert_eq!(store.get(ids[0]).unwrap().associations.len(), 1);
    }

    #[test]
    fn test_associate_with_short_term_is_not_found() {
        let (mut store, ids) = store_with_long_term(1);
        let short = store.store(item(0.5, Tier::ShortTerm)).unwrap();

        let result = store.associate(ids[0], short);

        assert!(matches!(result, Err(RetainError::NotFound(_))));
        assert!(store.get(ids[0]).unwrap().associations.is_empty());
        assert!(store.get(short).unwrap().associations.is_empty());
    }

    #[test]
    fn test_associate_missing_is_not_found() {
        let (mut store, ids) = store_with_long_term(1);
        let result = store.associate(uuid::Uuid::new_v4(), ids[0]);
        assert!(matches!(result, Err(RetainError::NotFound(_))));
        assert!(store.get(ids[0]).unwrap().associations.is_empty());
    }

    #[test]
    fn test_self_association_rejected() {
        let (mut store, ids) = store_with_long_term(1);
        let result = store.associate(ids[0], ids[0]);
        assert!(matches!(result, Err(RetainError::InvalidItem(_))));
    }

    #[test]
    fn test_dissociate() {
        let (mut store, ids) = store_with_long_term(2);
        store.associate(ids[0], ids[1]).unwrap();

        assert!(store.dissociate(ids[1], ids[0]).unwrap());
        assert!(!store.dissociate(ids[0], ids[1]).unwrap());
        assert!(store.get(ids[0]).unwrap().associations.is_empty());
        assert!(store.get(ids[1]).unwrap().associations.is_empty());
    }

    #[test]
    fn test_related_resolves_links() {
        let (mut store, ids) = store_with_long_term(3);
        store.associate(ids[0], ids[1]).unwrap();
        store.associate(ids[0], ids[2]).unwrap();

        let related: Vec<_> = store.related(ids[0]).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(related.len(), 2);
        assert!(related.contains(&ids[1]));
        assert!(related.contains(&ids[2]));

        assert!(store.related(ids[1]).unwrap().iter().all(|m| m.id == ids[0]));
    }

    #[test]
    fn test_related_requires_long_term() {
        let mut store = TierStore::new(TierConfig::default());
        let working = store.store(item(0.1, Tier::Working)).unwrap();
        assert!(matches!(store.related(working), Err(RetainError::NotFound(_))));
        assert!(matches!(
            store.related(uuid::Uuid::new_v4()),
            Err(RetainError::NotFound(_))
        ));
    }

    #[test]
    fn test_related_prunes_stale_links() {
        let (mut store, ids) = store_with_long_term(2);
        store.associate(ids[0], ids[1]).unwrap();

        // Simulate a dangling link the way a damaged snapshot would leave one.
        let ghost = uuid::Uuid::new_v4();
        store.long_term.get_mut(&ids[0]).unwrap().associations.insert(ghost);

        let related = store.related(ids[0]).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, ids[1]);
        assert!(!store.get(ids[0]).unwrap().associations.contains(&ghost));
        assert!(store.check_invariants().is_ok());
    }
}
