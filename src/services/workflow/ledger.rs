//! Progress left behind by failed runs, so a re-run resumes instead of starting over

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;

use super::state::{Feature, WorkflowContext, WorkflowState};

pub const DEFAULT_LEDGER_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub session_id: String,
    pub feature: Feature,
    /// Digest of the request inputs
    pub fingerprint: String,
}

/// A broadcast transaction whose outcome was never observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedBroadcast {
    pub step: usize,
    pub signature: Signature,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub context: WorkflowContext,
    pub unresolved: Option<UnresolvedBroadcast>,
    pub step: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Entries older than the TTL are dropped on every store and lookup.
#[derive(Debug, Clone)]
pub struct ResumeLedger {
    entries: Arc<DashMap<LedgerKey, LedgerEntry>>,
    ttl: Duration,
}

impl Default for ResumeLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_TTL)
    }
}

impl ResumeLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn store(&self, key: LedgerKey, entry: LedgerEntry) {
        self.evict_expired();
        tracing::debug!(
            "Recording progress for {} ({} context entries, unresolved: {})",
            key.feature,
            entry.context.len(),
            entry.unresolved.is_some()
        );
        self.entries.insert(key, entry);
    }

    pub fn take(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        self.evict_expired();
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn get(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        self.evict_expired();
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&self) {
        let now = Utc::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        // a clock step backwards yields a negative age; keep those entries
        self.entries
            .retain(|_, entry| (now - entry.recorded_at).to_std().map_or(true, |age| age < ttl));

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!("Evicted {} expired resume entries", evicted);
        }
    }
}

/// Records a run's progress under its ledger key while the run is still going.
pub struct Checkpoint<'a> {
    ledger: &'a ResumeLedger,
    key: &'a LedgerKey,
}

impl<'a> Checkpoint<'a> {
    pub fn new(ledger: &'a ResumeLedger, key: &'a LedgerKey) -> Self {
        Self { ledger, key }
    }

    /// Stores the state unless there is nothing worth resuming.
    pub fn save(&self, state: &WorkflowState, unresolved: Option<UnresolvedBroadcast>) {
        if state.context.is_empty() && unresolved.is_none() {
            return;
        }
        self.ledger.store(
            self.key.clone(),
            LedgerEntry {
                context: state.context.clone(),
                unresolved,
                step: state.step,
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.ledger.take(self.key);
    }
}
