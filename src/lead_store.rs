use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{Lead, LeadStatus, NewLead};

/// Persisted collection of lead records.
///
/// Implementations own identity (`id`) and insertion time (`created_at`);
/// callers never supply either.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Inserts a new lead and returns it as stored.
    async fn insert(&self, lead: NewLead) -> Result<Lead, AppError>;

    /// All leads, newest `created_at` first.
    async fn list(&self) -> Result<Vec<Lead>, AppError>;

    /// Overwrites the status of one lead. `None` if no lead has that id.
    async fn update_status(&self, id: Uuid, status: LeadStatus)
        -> Result<Option<Lead>, AppError>;

    /// Permanently removes one lead. `false` if no lead has that id.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

const LEAD_COLUMNS: &str =
    "id, name, company, launching, budget, timeline, link, submitted, status, created_at";

/// Lead store backed by the hosted Postgres `leads` table.
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn insert(&self, lead: NewLead) -> Result<Lead, AppError> {
        let stored = sqlx::query_as::<_, Lead>(&format!(
            r#"
            INSERT INTO leads (name, company, launching, budget, timeline, link, submitted, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(&lead.name)
        .bind(&lead.company)
        .bind(&lead.launching)
        .bind(&lead.budget)
        .bind(&lead.timeline)
        .bind(&lead.link)
        .bind(&lead.submitted)
        .bind(lead.status.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert lead")?;

        tracing::debug!("Stored lead id={}", stored.id);
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<Lead>, AppError> {
        sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leads")
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<Lead>, AppError> {
        sqlx::query_as::<_, Lead>(&format!(
            "UPDATE leads SET status = $2 WHERE id = $1 RETURNING {LEAD_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update status of lead {}", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete lead {}", id))?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process lead store for local development (`DATABASE_URL=memory://`)
/// and tests. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryLeadStore {
    // Kept in insertion order, so `created_at` ascends along the vector.
    leads: RwLock<Vec<Lead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert(&self, lead: NewLead) -> Result<Lead, AppError> {
        let mut leads = self.leads.write().await;

        let mut created_at = Utc::now();
        if let Some(last) = leads.last() {
            if created_at <= last.created_at {
                created_at = last.created_at + Duration::microseconds(1);
            }
        }

        let stored = Lead {
            id: Uuid::new_v4(),
            name: lead.name,
            company: lead.company,
            launching: lead.launching,
            budget: lead.budget,
            timeline: lead.timeline,
            link: lead.link,
            submitted: lead.submitted,
            status: lead.status,
            created_at,
        };
        leads.push(stored.clone());

        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<Lead>, AppError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().rev().cloned().collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<Lead>, AppError> {
        let mut leads = self.leads.write().await;
        Ok(leads.iter_mut().find(|l| l.id == id).map(|lead| {
            lead.status = status;
            lead.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut leads = self.leads.write().await;
        let before = leads.len();
        leads.retain(|l| l.id != id);
        Ok(leads.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(name: &str) -> NewLead {
        let body = json!({ "name": name });
        NewLead::from_submission(body.as_object().unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn test_memory_store_lists_newest_first() {
        let store = MemoryLeadStore::new();
        for name in ["first", "second", "third"] {
            store.insert(submission(name)).await.unwrap();
        }

        let leads = store.list().await.unwrap();
        let names: Vec<_> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["third", "second", "first"]);
        assert!(leads.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }

    #[tokio::test]
    async fn test_memory_store_update_and_delete_unknown_id() {
        let store = MemoryLeadStore::new();
        let kept = store.insert(submission("kept")).await.unwrap();

        let missing = Uuid::new_v4();
        assert_eq!(
            store.update_status(missing, LeadStatus::Won).await.unwrap(),
            None
        );
        assert!(!store.delete(missing).await.unwrap());

        let leads = store.list().await.unwrap();
        assert_eq!(leads, vec![kept]);
    }

    #[tokio::test]
    async fn test_memory_store_update_status() {
        let store = MemoryLeadStore::new();
        let lead = store.insert(submission("Ana")).await.unwrap();

        let updated = store
            .update_status(lead.id, LeadStatus::Contacted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, LeadStatus::Contacted);
        assert_eq!(updated.created_at, lead.created_at);
    }
}
