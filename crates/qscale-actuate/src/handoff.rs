//! The orchestrator handoff record.
//!
//! The external scaler reads `{"action": <target replicas>}` from a
//! well-known path and reconciles the workload to that count. The write
//! goes through a temp file and rename so the watcher never reads a
//! torn record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use qscale_core::{ACTION_DELTAS, MIN_REPLICAS};

use crate::error::ActuateError;

/// The persisted handoff record, exactly as the orchestrator expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecord {
    /// Target replica count (not a delta).
    pub action: u32,
}

/// Clamp `current + delta` into `[1, max_replicas]`.
pub fn clamp_target(current: u32, delta: i32, max_replicas: u32) -> u32 {
    (current as i64 + delta as i64)
        .clamp(MIN_REPLICAS as i64, max_replicas as i64) as u32
}

/// Writes scaling targets for the external orchestrator.
#[derive(Debug, Clone)]
pub struct ScaleHandoff {
    path: PathBuf,
    max_replicas: u32,
}

impl ScaleHandoff {
    pub fn new(path: impl Into<PathBuf>, max_replicas: u32) -> Self {
        Self {
            path: path.into(),
            max_replicas,
        }
    }

    /// Compute the clamped target for an action index and publish it.
    /// Returns the target replica count the caller should await.
    pub fn apply(
        &self,
        action_index: usize,
        current_replicas: u32,
    ) -> Result<u32, ActuateError> {
        let delta = ACTION_DELTAS[action_index];
        let target = clamp_target(current_replicas, delta, self.max_replicas);
        self.publish(target)?;
        info!(
            delta,
            from = current_replicas,
            target,
            "scaling target published"
        );
        Ok(target)
    }

    /// Write the record atomically (temp file + rename in place).
    fn publish(&self, target: u32) -> Result<(), ActuateError> {
        let record = HandoffRecord { action: target };
        let encoded = serde_json::to_vec(&record)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &encoded)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_stays_in_bounds_for_every_state_action_pair() {
        for current in 1..=10u32 {
            for delta in ACTION_DELTAS {
                let target = clamp_target(current, delta, 10);
                assert!(
                    (1..=10).contains(&target),
                    "current {current}, delta {delta} → {target}"
                );
            }
        }
    }

    #[test]
    fn clamp_is_identity_when_in_range() {
        assert_eq!(clamp_target(5, 2, 10), 7);
        assert_eq!(clamp_target(5, -2, 10), 3);
        assert_eq!(clamp_target(5, 0, 10), 5);
    }

    #[test]
    fn clamp_pins_the_edges() {
        assert_eq!(clamp_target(1, -2, 10), 1);
        assert_eq!(clamp_target(2, -2, 10), 1);
        assert_eq!(clamp_target(10, 2, 10), 10);
        assert_eq!(clamp_target(9, 2, 10), 10);
    }

    #[test]
    fn apply_writes_the_orchestrator_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.json");
        let handoff = ScaleHandoff::new(&path, 10);

        // Action index 3 is delta +1.
        let target = handoff.apply(3, 5).unwrap();
        assert_eq!(target, 6);

        let content = std::fs::read_to_string(&path).unwrap();
        let record: HandoffRecord = serde_json::from_str(&content).unwrap();
        assert_eq!(record, HandoffRecord { action: 6 });

        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn apply_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.json");
        let handoff = ScaleHandoff::new(&path, 10);

        handoff.apply(4, 3).unwrap(); // +2 → 5
        handoff.apply(0, 5).unwrap(); // -2 → 3

        let record: HandoffRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.action, 3);
    }
}
