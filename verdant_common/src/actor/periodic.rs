//! Lifecycle actor around a periodic duty.
//!
//! Satellites and simulated devices share the same shape: prepare once,
//! then do a unit of work every so often, and park in `ERROR` when the work
//! fails. [`PeriodicActor`] supplies the modes; a [`Duty`] supplies the work.

use super::machine::{ActorCore, StateMachine};
use super::mode::LifecycleMode;
use crate::state::{Namespace, SharedState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum DutyError {
    #[error("Hardware unavailable: {0}")]
    Hardware(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Work performed by a [`PeriodicActor`].
pub trait Duty: Send + 'static {
    /// Time between polls. Read again after every poll.
    fn interval(&self, state: &SharedState) -> Duration;

    /// One-time preparation in `INIT`.
    fn start(&mut self, state: &SharedState) -> Result<(), DutyError>;

    /// One unit of work in `NORMAL`.
    fn poll(&mut self, state: &SharedState) -> impl Future<Output = Result<(), DutyError>> + Send;
}

/// Generic `INIT → NORMAL` actor driving a [`Duty`].
pub struct PeriodicActor<D: Duty> {
    core: ActorCore<LifecycleMode, ()>,
    duty: D,
}

impl<D: Duty> PeriodicActor<D> {
    pub fn new(
        name: impl Into<String>,
        namespace: Namespace,
        state: Arc<SharedState>,
        tick: Duration,
        duty: D,
    ) -> Self {
        Self {
            core: ActorCore::new(name, namespace, state, tick),
            duty,
        }
    }

    pub fn duty(&self) -> &D {
        &self.duty
    }

    fn run_init_mode(&mut self) {
        info!("{}: initializing", self.core.name());
        let state = Arc::clone(self.core.state());
        match self.duty.start(&state) {
            Ok(()) => self.core.transition_to(LifecycleMode::Normal),
            Err(e) => {
                error!("{}: unable to initialize: {}", self.core.name(), e);
                self.core.publish("error", e.to_string());
                self.core.transition_to(LifecycleMode::Error);
            }
        }
    }

    async fn run_normal_mode(&mut self) {
        let state = Arc::clone(self.core.state());
        let mut next_poll = Instant::now();
        loop {
            if Instant::now() >= next_poll {
                if let Err(e) = self.duty.poll(&state).await {
                    error!("{}: {}", self.core.name(), e);
                    self.core.publish("error", e.to_string());
                    self.core.transition_to(LifecycleMode::Error);
                    break;
                }
                next_poll = Instant::now() + self.duty.interval(&state);
            }

            self.core.idle().await;
            if self.core.request_transition(LifecycleMode::Normal) {
                break;
            }
        }
    }

    fn run_reset_mode(&mut self) {
        self.core.publish("error", serde_json::Value::Null);
        self.core.transition_to(LifecycleMode::Init);
    }
}

impl<D: Duty> StateMachine for PeriodicActor<D> {
    type Mode = LifecycleMode;
    type Event = ();

    fn core(&self) -> &ActorCore<LifecycleMode, ()> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore<LifecycleMode, ()> {
        &mut self.core
    }

    async fn run_mode(&mut self, mode: LifecycleMode) {
        match mode {
            LifecycleMode::Init => self.run_init_mode(),
            LifecycleMode::Normal => self.run_normal_mode().await,
            LifecycleMode::Reset => self.run_reset_mode(),
            LifecycleMode::Error | LifecycleMode::Shutdown => {
                self.core.idle_until_transition(mode).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, ManagedActor};
    use crate::state::Subtree;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        polls: Arc<AtomicU32>,
        fail_after: Option<u32>,
    }

    impl Duty for Counter {
        fn interval(&self, _state: &SharedState) -> Duration {
            Duration::from_millis(1)
        }

        fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
            state.set(Subtree::Resource, &["status"], "starting");
            Ok(())
        }

        async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
            let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            state.set(Subtree::Resource, &["polls"], count);
            match self.fail_after {
                Some(limit) if count >= limit => Err(DutyError::Hardware("disk vanished".into())),
                _ => Ok(()),
            }
        }
    }

    fn counter(fail_after: Option<u32>) -> (Actor<PeriodicActor<Counter>>, Arc<AtomicU32>, Arc<SharedState>) {
        let polls = Arc::new(AtomicU32::new(0));
        let state = Arc::new(SharedState::new());
        let actor = Actor::new(PeriodicActor::new(
            "resource",
            Namespace::root(Subtree::Resource),
            Arc::clone(&state),
            Duration::from_millis(2),
            Counter {
                polls: Arc::clone(&polls),
                fail_after,
            },
        ));
        (actor, polls, state)
    }

    #[tokio::test]
    async fn polls_repeatedly_in_normal() {
        let (mut actor, polls, state) = counter(None);
        actor.spawn().unwrap();

        for _ in 0..200 {
            if polls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(polls.load(Ordering::SeqCst) >= 3);
        assert_eq!(state.get(Subtree::Resource, &["mode"]), Some(json!("NORMAL")));
        assert_eq!(state.get(Subtree::Resource, &["status"]), Some(json!("starting")));

        actor.shutdown();
        actor.join().await;
        assert!(actor.is_terminated());
    }

    #[tokio::test]
    async fn failing_poll_parks_in_error_until_reset() {
        let (mut actor, polls, state) = counter(Some(1));
        actor.spawn().unwrap();

        for _ in 0..200 {
            if actor.current_mode() == LifecycleMode::Error {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(actor.current_mode(), LifecycleMode::Error);
        assert_eq!(
            state.get(Subtree::Resource, &["error"]),
            Some(json!("Hardware unavailable: disk vanished"))
        );

        actor.reset();
        for _ in 0..200 {
            if polls.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(polls.load(Ordering::SeqCst) >= 2);

        actor.shutdown();
        actor.join().await;
    }
}
