use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::{AuditAction, AuditLog},
    repository::RepositoryState,
};

/// AuditEvent
///
/// What happened, before it is stamped with an id and a timestamp.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub club_id: Option<Uuid>,
    pub actor_id: String,
    pub action: AuditAction,
    pub target_type: &'static str,
    pub target_id: Option<String>,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn club(
        club_id: Uuid,
        actor_id: &str,
        action: AuditAction,
        target_type: &'static str,
        target_id: impl ToString,
    ) -> Self {
        Self {
            club_id: Some(club_id),
            actor_id: actor_id.to_string(),
            action,
            target_type,
            target_id: Some(target_id.to_string()),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn site(actor_id: &str, action: AuditAction, target_type: &'static str, target_id: impl ToString) -> Self {
        Self {
            club_id: None,
            actor_id: actor_id.to_string(),
            action,
            target_type,
            target_id: Some(target_id.to_string()),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// AuditLogger
///
/// Writes audit rows into the same database as everything else and mirrors each one
/// to the tracing pipeline. A failed write is logged and swallowed: the action it
/// describes has already happened.
#[derive(Clone)]
pub struct AuditLogger {
    repo: RepositoryState,
}

impl AuditLogger {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn record(&self, event: AuditEvent) {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            club_id: event.club_id,
            actor_id: event.actor_id,
            action: event.action,
            target_type: event.target_type.to_string(),
            target_id: event.target_id,
            metadata: event.metadata,
            created_at: Utc::now(),
        };

        tracing::info!(
            audit_id = %entry.id,
            club_id = ?entry.club_id,
            actor = %entry.actor_id,
            action = %entry.action,
            target_type = %entry.target_type,
            target_id = ?entry.target_id,
            "audit"
        );

        if let Err(e) = self.repo.insert_audit_log(&entry).await {
            tracing::warn!(audit_id = %entry.id, error = %e, "failed to persist audit log");
        }
    }
}
