//! qscale-agent — the learning core of QScale.
//!
//! A small DQN: an epsilon-greedy policy over a multi-layer value
//! network, trained by replaying stored transitions against a frozen
//! target copy of the network.
//!
//! # Architecture
//!
//! ```text
//! EpsilonGreedy ──select()──▶ QNetwork.evaluate()      (online params)
//! ControlLoop  ──store()───▶ ReplayMemory              (bounded FIFO)
//! Learner ──train_step()──▶ sample batch
//!                            ├── QNetwork.evaluate_target()  (frozen)
//!                            └── QNetwork.fit()  (Huber + Adam, online)
//! ControlLoop ──periodic──▶ QNetwork.sync_target()
//! ```
//!
//! The target parameter set is an immutable snapshot swapped in a single
//! assignment, so an evaluator can never observe a half-synced copy.

pub mod error;
pub mod learner;
pub mod network;
pub mod policy;
pub mod replay;

pub use error::AgentError;
pub use learner::{Learner, TrainReport, TrainStats};
pub use network::QNetwork;
pub use policy::EpsilonGreedy;
pub use replay::ReplayMemory;
