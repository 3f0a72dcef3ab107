//! Integration tests for the memory store
//!
//! Exercises tiers, associations, queries and retention through the public
//! `MemoryStore` handle.

use chrono::{Duration, Utc};
use retain::storage::{MemoryQuery, MemoryStore, RetentionConfig, TierConfig};
use retain::testing::{idle_for, item, numbered, tagged};
use retain::{RetainError, Tier};

/// Test fixture: a memory-only store with default capacities
fn create_test_store() -> MemoryStore {
    MemoryStore::in_memory(TierConfig::default(), RetentionConfig::default())
}

mod tier_tests {
    use super::*;

    #[tokio::test]
    async fn test_working_tier_keeps_newest_ten() {
        let store = create_test_store();
        for n in 1..=101 {
            store.store(numbered(n, 0.1, Tier::Working)).await.unwrap();
        }

        let stats = store.stats().await;
        assert_eq!(stats.working_count, 10);
        assert_eq!(stats.total, 10);

        let kept: Vec<u64> = store
            .list(Tier::Working)
            .await
            .iter()
            .map(|m| m.content["n"].as_u64().unwrap())
            .collect();
        assert_eq!(kept, (92..=101).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_short_term_evicts_first_of_one_hundred_and_one() {
        let store = create_test_store();
        for n in 1..=101 {
            store.store(numbered(n, 0.5, Tier::ShortTerm)).await.unwrap();
        }

        let kept: Vec<u64> = store
            .list(Tier::ShortTerm)
            .await
            .iter()
            .map(|m| m.content["n"].as_u64().unwrap())
            .collect();
        assert_eq!(kept.len(), 100);
        assert_eq!(kept.first(), Some(&2));
        assert_eq!(kept.last(), Some(&101));
    }

    #[tokio::test]
    async fn test_long_term_is_unbounded() {
        let store = create_test_store();
        for n in 0..250 {
            store.store(numbered(n, 0.9, Tier::LongTerm)).await.unwrap();
        }
        assert_eq!(store.stats().await.long_term_count, 250);
    }

    #[tokio::test]
    async fn test_rejects_invalid_items() {
        let store = create_test_store();

        let mut out_of_range = item(0.5, Tier::Working);
        out_of_range.importance = 1.5;
        assert!(matches!(
            store.store(out_of_range).await,
            Err(RetainError::InvalidItem(_))
        ));

        let mut not_a_number = item(0.5, Tier::Working);
        not_a_number.importance = f32::NAN;
        assert!(store.store(not_a_number).await.is_err());

        let memory = item(0.5, Tier::LongTerm);
        store.store(memory.clone()).await.unwrap();
        assert!(store.store(memory).await.is_err(), "duplicate id");

        assert_eq!(store.stats().await.total, 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let store = create_test_store();
        let result = store.remove(uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(RetainError::NotFound(_))));
    }
}

mod association_tests {
    use super::*;

    #[tokio::test]
    async fn test_associate_with_short_term_id_is_not_found() {
        let store = create_test_store();
        let long = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        let short = store.store(item(0.5, Tier::ShortTerm)).await.unwrap();

        let result = store.associate(long, short).await;
        assert!(matches!(result, Err(RetainError::NotFound(_))));
        assert!(store.get(long).await.unwrap().associations.is_empty());
    }

    #[tokio::test]
    async fn test_links_are_symmetric() {
        let store = create_test_store();
        let a = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        let b = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        let c = store.store(item(0.9, Tier::LongTerm)).await.unwrap();

        store.associate(a, b).await.unwrap();
        store.associate(c, a).await.unwrap();

        let mut related_to_a: Vec<_> = store
            .related(a)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        related_to_a.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(related_to_a, expected);

        assert_eq!(store.related(b).await.unwrap()[0].id, a);
        assert_eq!(store.related(c).await.unwrap()[0].id, a);
    }

    #[tokio::test]
    async fn test_self_association_rejected() {
        let store = create_test_store();
        let a = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        assert!(matches!(
            store.associate(a, a).await,
            Err(RetainError::InvalidItem(_))
        ));
    }

    #[tokio::test]
    async fn test_removal_scrubs_peers() {
        let store = create_test_store();
        let a = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        let b = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        store.associate(a, b).await.unwrap();

        store.remove(b).await.unwrap();

        assert!(store.get(a).await.unwrap().associations.is_empty());
        assert!(store.related(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_related_on_missing_id_is_not_found() {
        let store = create_test_store();
        let short = store.store(item(0.5, Tier::ShortTerm)).await.unwrap();
        assert!(store.related(short).await.is_err());
        assert!(store.related(uuid::Uuid::new_v4()).await.is_err());
    }
}

mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_tags_and_importance_combine() {
        let store = create_test_store();
        let wanted = store
            .store(tagged(0.6, Tier::LongTerm, &["meeting", "project"]))
            .await
            .unwrap();
        store
            .store(tagged(0.2, Tier::LongTerm, &["meeting"]))
            .await
            .unwrap();
        store
            .store(tagged(0.9, Tier::LongTerm, &["lunch"]))
            .await
            .unwrap();

        let query = MemoryQuery::from_json(serde_json::json!({
            "tags": ["meeting"],
            "importance": 0.4
        }))
        .unwrap();
        let results = store.search(&query, None).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, wanted);
        assert_eq!(results[0].access_count, 1);
    }

    #[tokio::test]
    async fn test_time_range_and_tier_filter() {
        let store = create_test_store();
        let before = Utc::now() - Duration::seconds(1);
        let id = store.store(item(0.5, Tier::Working)).await.unwrap();
        store.store(item(0.5, Tier::LongTerm)).await.unwrap();
        let after = Utc::now() + Duration::seconds(1);

        let query = MemoryQuery::new().created_between(before, after);
        assert_eq!(store.search(&query, None).await.len(), 2);

        let working = store.search(&query, Some(Tier::Working)).await;
        assert_eq!(working.len(), 1);
        assert_eq!(working[0].id, id);
        assert_eq!(store.get(id).await.unwrap().access_count, 2);
    }
}

mod retention_tests {
    use super::*;

    #[tokio::test]
    async fn test_consolidation_by_importance_and_access() {
        let store = create_test_store();
        let important = store.store(item(0.7, Tier::ShortTerm)).await.unwrap();
        let popular = store
            .store(tagged(0.2, Tier::ShortTerm, &["hot"]))
            .await
            .unwrap();
        let ordinary = store.store(item(0.2, Tier::ShortTerm)).await.unwrap();

        // Six hits puts the access count above the promotion limit of five.
        let query = MemoryQuery::new().with_tags(["hot"]);
        for _ in 0..6 {
            store.search(&query, Some(Tier::ShortTerm)).await;
        }

        let mut promoted = store.consolidate().await;
        promoted.sort();
        let mut expected = vec![important, popular];
        expected.sort();
        assert_eq!(promoted, expected);

        assert_eq!(store.get(important).await.unwrap().tier, Tier::LongTerm);
        assert_eq!(store.get(ordinary).await.unwrap().tier, Tier::ShortTerm);
        assert!(store.get(popular).await.unwrap().associations.is_empty());
    }

    #[tokio::test]
    async fn test_decay_law() {
        let store = create_test_store();
        let stale = store
            .store(idle_for(item(0.3, Tier::LongTerm), 10))
            .await
            .unwrap();
        let recent = store
            .store(idle_for(item(0.3, Tier::LongTerm), 5))
            .await
            .unwrap();
        let important = store
            .store(idle_for(item(0.5, Tier::LongTerm), 100))
            .await
            .unwrap();

        let forgotten = store.decay().await;

        assert_eq!(forgotten, vec![stale]);
        assert!(store.get(recent).await.is_some());
        assert!(store.get(important).await.is_some());
    }

    #[tokio::test]
    async fn test_decay_with_injected_clock() {
        let store = create_test_store();
        let id = store.store(item(0.1, Tier::LongTerm)).await.unwrap();

        assert!(store.decay_at(Utc::now() + Duration::days(9)).await.is_empty());
        assert_eq!(store.decay_at(Utc::now() + Duration::days(10)).await, vec![id]);
    }

    #[tokio::test]
    async fn test_forgetting_removes_associations() {
        let store = create_test_store();
        let stale = store
            .store(idle_for(item(0.2, Tier::LongTerm), 30))
            .await
            .unwrap();
        let keeper = store.store(item(0.9, Tier::LongTerm)).await.unwrap();
        store.associate(stale, keeper).await.unwrap();

        let report = store.run_maintenance().await;

        assert_eq!(report.forgotten, vec![stale]);
        assert!(store.get(keeper).await.unwrap().associations.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_is_idempotent() {
        let store = create_test_store();
        store.store(item(0.9, Tier::ShortTerm)).await.unwrap();
        store
            .store(idle_for(item(0.1, Tier::LongTerm), 20))
            .await
            .unwrap();

        let first = store.run_maintenance().await;
        assert!(!first.is_empty());

        let before = store.all().await;
        let second = store.run_maintenance().await;
        assert!(second.is_empty());
        assert_eq!(store.all().await, before);
    }
}
