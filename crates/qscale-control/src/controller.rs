//! The control loop driving observe → decide → actuate → learn.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use qscale_actuate::{ConvergenceTracker, ScaleHandoff, await_convergence};
use qscale_agent::{EpsilonGreedy, Learner, QNetwork, ReplayMemory, TrainReport};
use qscale_core::{ACTION_DELTAS, Observation, QscaleConfig, Transition, shaped_reward};
use qscale_metrics::{Backoff, MetricsSource};

/// What one pass through the loop produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The cycle ran to completion and stored a transition.
    Completed(CycleSummary),
    /// Actuation never converged within the configured retry bound;
    /// no transition was stored.
    Abandoned { cycle: u64, attempts: u32 },
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub cycle: u64,
    /// Chosen action index into the action set.
    pub action: usize,
    pub target_replicas: u32,
    pub reward: f64,
    /// Exploration rate after this cycle's decay.
    pub epsilon: f64,
    /// Present when this cycle ran a training step.
    pub trained: Option<TrainReport>,
    /// Whether this cycle synced the target network.
    pub target_synced: bool,
}

/// The sequential decision loop. Owns every mutable piece of the agent;
/// nothing here is shared across tasks.
pub struct ControlLoop<S> {
    source: S,
    handoff: ScaleHandoff,
    policy: EpsilonGreedy,
    network: QNetwork,
    memory: ReplayMemory,
    learner: Learner,
    batch_size: usize,
    replay_frequency: u64,
    target_update_frequency: u64,
    poll_interval: Duration,
    convergence_deadline: Duration,
    settle_delay: Duration,
    max_actuation_retries: u32,
    cycle: u64,
    rng: StdRng,
}

impl<S: MetricsSource> ControlLoop<S> {
    pub fn new(config: &QscaleConfig, source: S) -> anyhow::Result<Self> {
        Self::with_rng(config, source, StdRng::from_entropy())
    }

    /// Construct with a caller-supplied RNG (for deterministic tests).
    pub fn with_rng(
        config: &QscaleConfig,
        source: S,
        mut rng: StdRng,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let agent = &config.agent;
        let scaling = &config.scaling;
        // validate() guarantees these parse.
        let poll_interval = scaling.poll_interval().unwrap();
        let convergence_deadline = scaling.convergence_deadline().unwrap();
        let settle_delay = scaling.settle_delay().unwrap();

        Ok(Self {
            source,
            handoff: ScaleHandoff::new(&scaling.handoff_path, scaling.max_replicas),
            policy: EpsilonGreedy::new(agent)?,
            network: QNetwork::new(agent.learning_rate, &mut rng),
            memory: ReplayMemory::new(agent.memory_capacity),
            learner: Learner::new(agent.gamma),
            batch_size: agent.batch_size,
            replay_frequency: agent.replay_frequency,
            target_update_frequency: agent.target_update_frequency,
            poll_interval,
            convergence_deadline,
            settle_delay,
            max_actuation_retries: scaling.max_actuation_retries,
            cycle: 0,
            rng,
        })
    }

    /// Run cycles until the shutdown signal flips.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            replay_frequency = self.replay_frequency,
            target_update_frequency = self.target_update_frequency,
            "control loop started"
        );

        loop {
            tokio::select! {
                outcome = self.run_cycle() => {
                    if let CycleOutcome::Abandoned { cycle, attempts } = outcome {
                        warn!(cycle, attempts, "cycle abandoned without convergence");
                    }
                }
                _ = shutdown.changed() => {
                    info!(cycle = self.cycle, "control loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full decision cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycle += 1;
        let cycle = self.cycle;

        let state = self.observe_with_backoff().await;

        // ACTUATE_WAIT retries itself: each attempt re-decides off the
        // cycle's state and re-reads the live replica count, because a
        // timed-out attempt may still have moved the cluster.
        let mut attempts = 0u32;
        let (action, target) = loop {
            attempts += 1;
            let current = if attempts == 1 {
                state
            } else {
                self.observe_with_backoff().await
            };

            let action = self.policy.select(&self.network, &state, &mut self.rng);
            match self.handoff.apply(action, current.replicas) {
                Ok(target) => {
                    let tracker = ConvergenceTracker::new(
                        target,
                        self.convergence_deadline,
                        self.poll_interval,
                    );
                    match await_convergence(&self.source, tracker).await {
                        Ok(()) => break (action, target),
                        Err(e) => warn!(
                            cycle,
                            attempt = attempts,
                            error = %e,
                            "actuation did not converge, retrying decide→apply"
                        ),
                    }
                }
                Err(e) => warn!(cycle, error = %e, "handoff write failed, retrying"),
            }

            if self.max_actuation_retries != 0 && attempts >= self.max_actuation_retries
            {
                self.policy.decay();
                return CycleOutcome::Abandoned { cycle, attempts };
            }
        };

        // Let metrics stabilize before judging the outcome.
        tokio::time::sleep(self.settle_delay).await;

        let next_state = self.observe_with_backoff().await;
        let reward = shaped_reward(&next_state);
        self.memory.push(Transition {
            state,
            action,
            reward,
            next_state,
        });
        self.policy.decay();

        let trained = if cycle % self.replay_frequency == 0 {
            match self.learner.train_step(
                &self.memory,
                &mut self.network,
                self.batch_size,
                &mut self.rng,
            ) {
                Ok(report) => Some(report),
                Err(e) => {
                    debug!(cycle, error = %e, "skipping training");
                    None
                }
            }
        } else {
            None
        };

        let target_synced = cycle % self.target_update_frequency == 0;
        if target_synced {
            self.network.sync_target();
            info!(cycle, "target network synced");
        }

        info!(
            cycle,
            delta = ACTION_DELTAS[action],
            target,
            reward,
            epsilon = self.policy.epsilon(),
            "cycle complete"
        );

        CycleOutcome::Completed(CycleSummary {
            cycle,
            action,
            target_replicas: target,
            reward,
            epsilon: self.policy.epsilon(),
            trained,
            target_synced,
        })
    }

    /// Query the metrics source until it answers. The loop must never
    /// reach reward computation without an observation.
    async fn observe_with_backoff(&mut self) -> Observation {
        let mut backoff = Backoff::for_metrics();
        loop {
            match self.source.observe().await {
                Ok(obs) => return obs,
                Err(e) => {
                    let wait = backoff.failure();
                    warn!(
                        error = %e,
                        wait_secs = wait.as_secs(),
                        "metrics unavailable, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn epsilon(&self) -> f64 {
        self.policy.epsilon()
    }
}
