//! Plan persistence interface and an in-process implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::PlanData;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("plan {0} not found")]
    NotFound(Uuid),
    #[error("plan {0} belongs to another owner")]
    OwnerMismatch(Uuid),
}

/// Where finished plans are kept.
///
/// Plans are keyed by id and owned by one owner id. The store treats the
/// plan as an opaque document.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert or replace a plan. Replacing a plan owned by someone else
    /// fails with [`StoreError::OwnerMismatch`].
    async fn upsert(&self, plan: PlanData) -> Result<PlanData, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<PlanData>, StoreError>;

    /// Plans of `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlanData>, StoreError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// A [`PlanStore`] held in memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<Uuid, PlanData>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn upsert(&self, plan: PlanData) -> Result<PlanData, StoreError> {
        let mut plans = self.plans.write().await;
        if let Some(existing) = plans.get(&plan.id) {
            if existing.owner_id != plan.owner_id {
                return Err(StoreError::OwnerMismatch(plan.id));
            }
        }
        plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match self.plans.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<PlanData>, StoreError> {
        Ok(self.plans.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlanData>, StoreError> {
        let plans = self.plans.read().await;
        let mut owned: Vec<PlanData> = plans
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn upsert_get_delete() {
        let store = InMemoryPlanStore::new();
        let plan = PlanData::new_empty("alice", Utc::now());
        let id = plan.id;

        store.upsert(plan.clone()).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(plan.clone()));

        let mut renamed = plan.clone();
        renamed.campaign_name = "Renamed".into();
        store.upsert(renamed).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().campaign_name, "Renamed");

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn owner_cannot_be_changed_by_upsert() {
        let store = InMemoryPlanStore::new();
        let plan = PlanData::new_empty("alice", Utc::now());
        store.upsert(plan.clone()).await.unwrap();

        let mut stolen = plan.clone();
        stolen.owner_id = "mallory".into();
        assert!(matches!(
            store.upsert(stolen).await,
            Err(StoreError::OwnerMismatch(_))
        ));
    }

    #[tokio::test]
    async fn list_by_owner_is_newest_first() {
        let store = InMemoryPlanStore::new();
        let now = Utc::now();
        let old = PlanData::new_empty("alice", now - Duration::days(2));
        let new = PlanData::new_empty("alice", now);
        let other = PlanData::new_empty("bob", now);
        for plan in [old.clone(), new.clone(), other] {
            store.upsert(plan).await.unwrap();
        }

        let listed = store.list_by_owner("alice").await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, [new.id, old.id]);
        assert!(store.list_by_owner("carol").await.unwrap().is_empty());
    }
}
