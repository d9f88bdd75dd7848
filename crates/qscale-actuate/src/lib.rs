//! qscale-actuate — applying a scaling decision to live infrastructure.
//!
//! QScale never resizes the workload itself. It writes a target replica
//! count to a well-known handoff file that an external orchestrator
//! (a KEDA-style external scaler) watches and reconciles, then polls
//! the metrics source until the live replica count matches the target
//! or a deadline elapses.
//!
//! # Actuate-and-converge protocol
//!
//! ```text
//! apply(delta, current)
//!   ├── target = clamp(current + delta, 1, max_replicas)
//!   └── write {"action": target} → handoff path (write-temp + rename)
//!
//! await_convergence(source, tracker)
//!   └── poll replicas every interval
//!         ├── == target        → Ok
//!         └── deadline passed  → Err(ConvergenceTimeout)   (retryable)
//! ```
//!
//! A timeout is never fatal: some orchestration backends get stuck
//! scaling down from the maximum, and the caller retries the whole
//! decide→apply cycle.

pub mod convergence;
pub mod error;
pub mod handoff;

pub use convergence::{ConvergenceTracker, PollVerdict, await_convergence};
pub use error::ActuateError;
pub use handoff::{ScaleHandoff, clamp_target};
