use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::PgPool;
use uuid::Uuid;

use crate::oracle::OracleClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub oracle: OracleClient,
    pub turn_gate: TurnGate,
}

/// Enforces the one-oracle-call-in-flight rule per student session.
/// Acquiring returns a permit that releases the slot on drop, so the gate
/// opens again whether the turn succeeds or fails.
#[derive(Clone, Default)]
pub struct TurnGate {
    inflight: Arc<Mutex<HashSet<Uuid>>>,
}

impl TurnGate {
    pub fn acquire(&self, student_session_id: Uuid) -> Option<TurnPermit> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight.insert(student_session_id) {
            Some(TurnPermit {
                gate: self.clone(),
                student_session_id,
            })
        } else {
            None
        }
    }
}

pub struct TurnPermit {
    gate: TurnGate,
    student_session_id: Uuid,
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        let mut inflight = self
            .gate
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        inflight.remove(&self.student_session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_while_permit_is_held() {
        let gate = TurnGate::default();
        let id = Uuid::now_v7();

        let permit = gate.acquire(id).expect("first acquire succeeds");
        assert!(gate.acquire(id).is_none(), "concurrent turn must be rejected");

        drop(permit);
        assert!(gate.acquire(id).is_some(), "slot reopens after drop");
    }

    #[test]
    fn different_student_sessions_are_independent() {
        let gate = TurnGate::default();
        let _a = gate.acquire(Uuid::now_v7()).expect("first session");
        assert!(gate.acquire(Uuid::now_v7()).is_some(), "other sessions unaffected");
    }
}
