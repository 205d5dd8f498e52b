use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::state::Feature;

type FlightKey = (String, Feature);

/// At most one in-flight workflow per (session, feature)
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    active: Arc<DashMap<FlightKey, Uuid>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot, or returns `None` when another run holds it.
    pub fn try_acquire(&self, session_id: &str, feature: Feature) -> Option<FlightGuard> {
        let key = (session_id.to_string(), feature);
        let token = Uuid::new_v4();

        match self.active.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(token);
                Some(FlightGuard {
                    active: self.active.clone(),
                    key,
                    token,
                })
            }
        }
    }

    pub fn is_active(&self, session_id: &str, feature: Feature) -> bool {
        self.active.contains_key(&(session_id.to_string(), feature))
    }
}

/// Releases the slot when dropped
#[derive(Debug)]
pub struct FlightGuard {
    active: Arc<DashMap<FlightKey, Uuid>>,
    key: FlightKey,
    token: Uuid,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.active.remove_if(&self.key, |_, token| *token == self.token);
    }
}
