//! qscale-control — the QScale decision cycle.
//!
//! One sequential loop, no concurrent decisions:
//!
//! ```text
//! OBSERVE ──▶ DECIDE ──▶ ACTUATE_WAIT ──▶ SETTLE ──▶ OBSERVE(next)
//!    ▲           (epsilon-greedy)  │ retries itself      │
//!    │                             ▼                     ▼
//!    └──────── next cycle ◀── REPLAY / SYNC ◀── reward + store
//! ```
//!
//! Every phase completes before the next begins. The only suspension
//! points are convergence polls, metrics backoff, and the settle delay.
//! Nothing in the loop is fatal: metrics outages are waited out,
//! convergence timeouts re-enter the decide→apply phase, and training
//! is skipped until enough experience exists.

pub mod controller;

pub use controller::{ControlLoop, CycleOutcome, CycleSummary};
