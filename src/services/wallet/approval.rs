//! Manual approval of signing requests

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::SigningRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub session_id: String,
    pub feature: String,
    pub step_name: String,
    pub description: String,
    pub requested_at: DateTime<Utc>,
}

/// Holds signing requests until an operator approves or rejects them
#[derive(Default)]
pub struct ApprovalManager {
    pending: DashMap<Uuid, (PendingApproval, oneshot::Sender<ApprovalDecision>)>,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, request: &SigningRequest) -> (Uuid, oneshot::Receiver<ApprovalDecision>) {
        let approval = PendingApproval {
            id: Uuid::new_v4(),
            workflow_id: request.workflow_id,
            session_id: request.session_id.clone(),
            feature: request.feature.clone(),
            step_name: request.step_name.clone(),
            description: request.description.clone(),
            requested_at: Utc::now(),
        };
        let id = approval.id;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, (approval, tx));

        tracing::info!(
            "Approval {} requested for {} step '{}' (workflow {})",
            id,
            request.feature,
            request.step_name,
            request.workflow_id
        );

        (id, rx)
    }

    /// Delivers a decision. Returns false when the request is unknown or already settled.
    pub fn respond(&self, id: Uuid, decision: ApprovalDecision) -> bool {
        match self.pending.remove(&id) {
            Some((_, (_, tx))) => {
                let _ = tx.send(decision);
                tracing::info!("Approval {} answered: {:?}", id, decision);
                true
            }
            None => false,
        }
    }

    /// Waits for a decision. Timeouts and dropped requests count as rejection.
    pub async fn wait(
        &self,
        id: Uuid,
        rx: oneshot::Receiver<ApprovalDecision>,
        timeout: Duration,
    ) -> ApprovalDecision {
        // removes the entry however the wait ends, including the future being dropped
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => ApprovalDecision::Rejected,
            Err(_) => {
                tracing::warn!("Approval {} timed out after {:?}", id, timeout);
                ApprovalDecision::Rejected
            }
        }
    }

    pub fn list_pending(&self) -> Vec<PendingApproval> {
        let mut pending: Vec<PendingApproval> =
            self.pending.iter().map(|entry| entry.value().0.clone()).collect();
        pending.sort_by_key(|approval| approval.requested_at);
        pending
    }
}

struct PendingGuard<'a> {
    pending: &'a DashMap<Uuid, (PendingApproval, oneshot::Sender<ApprovalDecision>)>,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.remove(&self.id).is_some() {
            tracing::debug!("Approval {} withdrawn", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn signing_request() -> SigningRequest {
        SigningRequest {
            workflow_id: Uuid::new_v4(),
            session_id: "session".to_string(),
            feature: "launch".to_string(),
            step_name: "create_mint".to_string(),
            description: "Create mint".to_string(),
        }
    }

    #[tokio::test]
    async fn test_approval_request_and_response() {
        let manager = Arc::new(ApprovalManager::new());
        let (id, rx) = manager.request(&signing_request());
        assert_eq!(manager.list_pending().len(), 1);

        assert!(manager.respond(id, ApprovalDecision::Approved));
        let decision = manager.wait(id, rx, Duration::from_secs(1)).await;
        assert_eq!(decision, ApprovalDecision::Approved);
        assert!(manager.list_pending().is_empty());

        // a second answer has nothing to deliver to
        assert!(!manager.respond(id, ApprovalDecision::Rejected));
    }

    #[tokio::test]
    async fn test_approval_timeout_rejects() {
        let manager = ApprovalManager::new();
        let (id, rx) = manager.request(&signing_request());

        let decision = manager.wait(id, rx, Duration::from_millis(10)).await;
        assert_eq!(decision, ApprovalDecision::Rejected);
        assert!(manager.list_pending().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_wait_withdraws_request() {
        let manager = ApprovalManager::new();
        let (id, rx) = manager.request(&signing_request());

        let waited = tokio::time::timeout(
            Duration::from_millis(10),
            manager.wait(id, rx, Duration::from_secs(10)),
        )
        .await;
        assert!(waited.is_err());
        assert!(manager.list_pending().is_empty());
        assert!(!manager.respond(id, ApprovalDecision::Approved));
    }
}
