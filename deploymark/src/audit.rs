//! Audit log of desired-state mutations

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::filesys::file::File;
use crate::utils::{current_user, host_name};

/// Sink for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record `action` with its `details` for `service`
    async fn log_audit(&self, action: &str, details: serde_json::Value, service: &str);
}

/// A single audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub service: String,
    pub details: serde_json::Value,
    pub user: String,
    pub host: String,
}

impl AuditRecord {
    pub fn new(action: &str, details: serde_json::Value, service: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            action: action.to_string(),
            service: service.to_string(),
            details,
            user: current_user(),
            host: host_name(),
        }
    }
}

/// Appends audit records as JSON lines and mirrors them to the `audit`
/// tracing target
pub struct JsonLinesAuditLog {
    file: File,
}

impl JsonLinesAuditLog {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditLog {
    async fn log_audit(&self, action: &str, details: serde_json::Value, service: &str) {
        let record = AuditRecord::new(action, details, service);
        info!(
            target: "audit",
            action = %record.action,
            service = %record.service,
            details = %record.details,
            user = %record.user,
            "audit"
        );

        // The mutation already happened; a lost audit line must not undo it
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit record: {}", e);
                return;
            }
        };
        if let Err(e) = self.file.append_line(&line).await {
            error!("Failed to write audit record to {}: {}", self.file.path().display(), e);
        }
    }
}
