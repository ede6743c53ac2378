//! Supervisor-facing actor handles.

use super::ActorError;
use super::machine::{ActorStatus, StateMachine, run};
use super::mode::ActorMode;
use super::queue::EventSender;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// The one interface a supervisor needs from any actor.
pub trait ManagedActor: Send {
    fn name(&self) -> &str;

    /// Start the actor's task.
    fn spawn(&mut self) -> Result<(), ActorError>;

    /// Enqueue a shutdown request.
    fn shutdown(&self);

    /// Enqueue a reset request.
    fn reset(&self);

    /// Current mode name.
    fn mode(&self) -> &'static str;

    /// True once the actor has moved past `INIT` or stopped altogether.
    fn has_left_init(&self) -> bool;

    fn is_terminated(&self) -> bool;
}

/// Handle around a [`StateMachine`] before and after it is spawned.
pub struct Actor<S: StateMachine> {
    name: String,
    machine: Option<S>,
    sender: EventSender<S::Event>,
    status: Arc<ActorStatus<S::Mode>>,
    task: Option<JoinHandle<()>>,
}

impl<S: StateMachine> Actor<S> {
    pub fn new(machine: S) -> Self {
        let core = machine.core();
        Self {
            name: core.name().to_string(),
            sender: core.sender(),
            status: core.status(),
            machine: Some(machine),
            task: None,
        }
    }

    pub fn sender(&self) -> EventSender<S::Event> {
        self.sender.clone()
    }

    pub fn current_mode(&self) -> S::Mode {
        self.status.mode()
    }

    pub fn is_spawned(&self) -> bool {
        self.task.is_some()
    }

    /// Wait for the task to finish. Returns immediately if never spawned.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("{}: task ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl<S: StateMachine> ManagedActor for Actor<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&mut self) -> Result<(), ActorError> {
        let machine = self
            .machine
            .take()
            .ok_or_else(|| ActorError::AlreadySpawned(self.name.clone()))?;
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                self.machine = Some(machine);
                return Err(ActorError::NoRuntime(self.name.clone()));
            }
        };

        let guard = TerminationGuard {
            name: self.name.clone(),
            status: Arc::clone(&self.status),
        };
        self.task = Some(runtime.spawn(async move {
            let _guard = guard;
            run(machine).await;
        }));
        Ok(())
    }

    fn shutdown(&self) {
        if self.machine.is_some() {
            // Never spawned: nothing will drain the inbox.
            self.status.mark_terminated();
            return;
        }
        if let Err(e) = self.sender.shutdown() {
            warn!("{}", e);
        }
    }

    fn reset(&self) {
        if let Err(e) = self.sender.reset() {
            warn!("{}", e);
        }
    }

    fn mode(&self) -> &'static str {
        self.status.mode().as_str()
    }

    fn has_left_init(&self) -> bool {
        self.status.mode() != S::Mode::INIT || self.status.is_terminated()
    }

    fn is_terminated(&self) -> bool {
        self.status.is_terminated()
    }
}

/// Flags termination when the task ends, including by panic.
struct TerminationGuard<M: ActorMode> {
    name: String,
    status: Arc<ActorStatus<M>>,
}

impl<M: ActorMode> Drop for TerminationGuard<M> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("💥 {} panicked in {} mode", self.name, self.status.mode());
        }
        self.status.mark_terminated();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorCore, LifecycleMode};
    use crate::state::{Namespace, SharedState, Subtree};
    use std::time::Duration;

    struct Blinker {
        core: ActorCore<LifecycleMode, ()>,
        panic_in_normal: bool,
    }

    impl Blinker {
        fn new(panic_in_normal: bool) -> Self {
            Self {
                core: ActorCore::new(
                    "blinker",
                    Namespace::root(Subtree::Iot),
                    Arc::new(SharedState::new()),
                    Duration::from_millis(5),
                ),
                panic_in_normal,
            }
        }
    }

    impl StateMachine for Blinker {
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
                LifecycleMode::Init => self.core.transition_to(LifecycleMode::Normal),
                LifecycleMode::Normal if self.panic_in_normal => panic!("blinker burnt out"),
                other => self.core.idle_until_transition(other).await,
            }
        }
    }

    async fn wait_for(predicate: impl Fn() -> bool) {
        for _ in 0..200 {
            if predicate() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn spawn_runs_until_shutdown() {
        let mut actor = Actor::new(Blinker::new(false));
        actor.spawn().unwrap();

        wait_for(|| actor.has_left_init()).await;
        assert_eq!(ManagedActor::mode(&actor), "NORMAL");

        actor.shutdown();
        actor.join().await;
        assert!(actor.is_terminated());
        assert_eq!(actor.current_mode(), LifecycleMode::Shutdown);
    }

    #[tokio::test]
    async fn second_spawn_is_rejected() {
        let mut actor = Actor::new(Blinker::new(false));
        actor.spawn().unwrap();
        assert!(matches!(actor.spawn(), Err(ActorError::AlreadySpawned(_))));
        actor.shutdown();
        actor.join().await;
    }

    #[test]
    fn spawn_outside_runtime_keeps_machine() {
        let mut actor = Actor::new(Blinker::new(false));
        assert!(matches!(actor.spawn(), Err(ActorError::NoRuntime(_))));
        assert!(!actor.is_spawned());
    }

    #[test]
    fn shutdown_before_spawn_terminates_immediately() {
        let actor = Actor::new(Blinker::new(false));
        actor.shutdown();
        assert!(actor.is_terminated());
        assert!(actor.has_left_init());
    }

    #[tokio::test]
    async fn panicking_actor_is_marked_terminated() {
        let mut actor = Actor::new(Blinker::new(true));
        actor.spawn().unwrap();
        actor.join().await;
        assert!(actor.is_terminated());
    }
}
