use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::lead_store::LeadStore;
use crate::models::{Lead, LeadStats, LeadStatus, StatusFilter};

/// The operator's local view of the lead list.
///
/// Mutations are applied locally first and then sent to the store. When the
/// store call fails the local change is rolled back and the error returned,
/// so the view never silently diverges from the store.
#[derive(Debug, Clone, Default)]
pub struct LeadBoard {
    leads: Vec<Lead>,
    filter: StatusFilter,
}

impl LeadBoard {
    /// Fetches every lead, newest first.
    pub async fn load(store: &dyn LeadStore) -> Result<Self, AppError> {
        let leads = store.list().await?;
        tracing::debug!("Loaded {} leads", leads.len());
        Ok(Self::from_leads(leads))
    }

    pub fn from_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads,
            filter: StatusFilter::All,
        }
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    /// Leads matching the current filter, in list order.
    pub fn filtered(&self) -> impl Iterator<Item = &Lead> {
        self.leads.iter().filter(move |l| self.filter.matches(l))
    }

    pub fn get(&self, id: Uuid) -> Option<&Lead> {
        self.leads.iter().find(|l| l.id == id)
    }

    pub fn count(&self, status: LeadStatus) -> usize {
        self.leads.iter().filter(|l| l.status == status).count()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> LeadStats {
        LeadStats::from_leads(&self.leads, now)
    }

    /// Sets a lead's status locally, then in the store.
    pub async fn update_status(
        &mut self,
        store: &dyn LeadStore,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), AppError> {
        let index = self.position(id)?;
        let previous = std::mem::replace(&mut self.leads[index].status, status);

        match store.update_status(id, status).await {
            Ok(Some(stored)) => {
                self.leads[index] = stored;
                Ok(())
            }
            Ok(None) => {
                tracing::warn!("Lead {} vanished from the store; dropping it locally", id);
                self.leads.remove(index);
                Err(AppError::NotFound(format!("Lead {} no longer exists", id)))
            }
            Err(e) => {
                tracing::warn!(
                    "Rolling back status of lead {} to '{}': {}",
                    id,
                    previous,
                    e
                );
                self.leads[index].status = previous;
                Err(e)
            }
        }
    }

    /// Removes a lead locally, then deletes it permanently from the store.
    ///
    /// Refused unless the operator has explicitly confirmed the deletion.
    pub async fn delete(
        &mut self,
        store: &dyn LeadStore,
        id: Uuid,
        confirmed: bool,
    ) -> Result<(), AppError> {
        if !confirmed {
            return Err(AppError::BadRequest(
                "Deleting a lead requires confirmation".to_string(),
            ));
        }

        let index = self.position(id)?;
        let removed = self.leads.remove(index);

        match store.delete(id).await {
            Ok(found) => {
                if !found {
                    tracing::debug!("Lead {} was already gone from the store", id);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Restoring lead {} after failed delete: {}", id, e);
                self.leads.insert(index, removed);
                Err(e)
            }
        }
    }

    fn position(&self, id: Uuid) -> Result<usize, AppError> {
        self.leads
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_store::MemoryLeadStore;
    use crate::models::NewLead;
    use async_trait::async_trait;
    use serde_json::json;

    /// Serves reads from a memory store and fails every write.
    struct ReadOnlyStore(MemoryLeadStore);

    #[async_trait]
    impl LeadStore for ReadOnlyStore {
        async fn insert(&self, lead: NewLead) -> Result<Lead, AppError> {
            self.0.insert(lead).await
        }

        async fn list(&self) -> Result<Vec<Lead>, AppError> {
            self.0.list().await
        }

        async fn update_status(&self, _: Uuid, _: LeadStatus) -> Result<Option<Lead>, AppError> {
            Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut))
        }

        async fn delete(&self, _: Uuid) -> Result<bool, AppError> {
            Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut))
        }
    }

    async fn seed(store: &dyn LeadStore, names: &[&str]) -> Vec<Lead> {
        let mut out = Vec::new();
        for name in names {
            let body = json!({ "name": name });
            let lead = NewLead::from_submission(body.as_object().unwrap(), Utc::now());
            out.push(store.insert(lead).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_update_status_applies_locally_and_remotely() {
        let store = MemoryLeadStore::new();
        let seeded = seed(&store, &["Ana"]).await;
        let mut board = LeadBoard::load(&store).await.unwrap();

        board
            .update_status(&store, seeded[0].id, LeadStatus::Proposal)
            .await
            .unwrap();

        assert_eq!(board.get(seeded[0].id).unwrap().status, LeadStatus::Proposal);
        let remote = store.list().await.unwrap();
        assert_eq!(remote[0].status, LeadStatus::Proposal);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back() {
        let store = ReadOnlyStore(MemoryLeadStore::new());
        let seeded = seed(&store, &["Ana"]).await;
        let mut board = LeadBoard::load(&store).await.unwrap();

        let result = board
            .update_status(&store, seeded[0].id, LeadStatus::Won)
            .await;

        assert!(result.is_err());
        assert_eq!(board.get(seeded[0].id).unwrap().status, LeadStatus::New);
    }

    #[tokio::test]
    async fn test_failed_delete_restores_position() {
        let store = ReadOnlyStore(MemoryLeadStore::new());
        seed(&store, &["a", "b", "c"]).await;
        let mut board = LeadBoard::load(&store).await.unwrap();
        let before: Vec<Uuid> = board.leads().iter().map(|l| l.id).collect();

        let result = board.delete(&store, before[1], true).await;

        assert!(result.is_err());
        let after: Vec<Uuid> = board.leads().iter().map(|l| l.id).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let store = MemoryLeadStore::new();
        let seeded = seed(&store, &["Ana"]).await;
        let mut board = LeadBoard::load(&store).await.unwrap();

        let result = board.delete(&store, seeded[0].id, false).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(board.leads().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_only_target() {
        let store = MemoryLeadStore::new();
        let seeded = seed(&store, &["a", "b"]).await;
        let mut board = LeadBoard::load(&store).await.unwrap();

        board.delete(&store, seeded[0].id, true).await.unwrap();

        assert!(board.get(seeded[0].id).is_none());
        let remote = store.list().await.unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].id, seeded[1].id);
    }

    #[tokio::test]
    async fn test_filter_and_counts() {
        let store = MemoryLeadStore::new();
        let seeded = seed(&store, &["a", "b", "c"]).await;
        store
            .update_status(seeded[1].id, LeadStatus::Won)
            .await
            .unwrap();
        let mut board = LeadBoard::load(&store).await.unwrap();

        assert_eq!(board.filtered().count(), 3);
        board.set_filter(StatusFilter::Only(LeadStatus::Won));
        let won: Vec<_> = board.filtered().map(|l| l.id).collect();
        assert_eq!(won, vec![seeded[1].id]);
        assert_eq!(board.count(LeadStatus::New), 2);
    }

    #[tokio::test]
    async fn test_unknown_lead_is_not_found() {
        let store = MemoryLeadStore::new();
        let mut board = LeadBoard::load(&store).await.unwrap();

        let result = board
            .update_status(&store, Uuid::new_v4(), LeadStatus::Won)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
