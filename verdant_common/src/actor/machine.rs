//! Actor core and run loop.

use super::mode::{ActorMode, valid_transition};
use super::queue::{Control, EventSender, Envelope, Inbox};
use crate::state::{Namespace, SharedState};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Externally observable status of one actor.
///
/// Written only by the owning loop (mode) and its task guard (terminated).
#[derive(Debug)]
pub struct ActorStatus<M> {
    mode: RwLock<M>,
    terminated: AtomicBool,
}

impl<M: ActorMode> ActorStatus<M> {
    fn new() -> Self {
        Self {
            mode: RwLock::new(M::INIT),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> M {
        *self.mode.read()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// State every actor carries: identity, mode, inbox and ticker.
pub struct ActorCore<M: ActorMode, E> {
    name: String,
    namespace: Namespace,
    state: Arc<SharedState>,
    mode: M,
    status: Arc<ActorStatus<M>>,
    inbox: Inbox<E>,
    tick: Duration,
    ticker: Option<Interval>,
}

impl<M: ActorMode, E: Send + 'static> ActorCore<M, E> {
    /// Core starting in `INIT`, mirrored into `<namespace>.mode`.
    pub fn new(
        name: impl Into<String>,
        namespace: Namespace,
        state: Arc<SharedState>,
        tick: Duration,
    ) -> Self {
        let name = name.into();
        let inbox = Inbox::new(&name);
        let core = Self {
            name,
            namespace,
            state,
            mode: M::INIT,
            status: Arc::new(ActorStatus::new()),
            inbox,
            tick,
            ticker: None,
        };
        core.mirror_mode();
        core
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn mode(&self) -> M {
        self.mode
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn sender(&self) -> EventSender<E> {
        self.inbox.sender()
    }

    pub fn status(&self) -> Arc<ActorStatus<M>> {
        Arc::clone(&self.status)
    }

    /// Write a field under this actor's namespace.
    pub fn publish(&self, field: &str, value: impl Into<serde_json::Value>) {
        self.state
            .set(self.namespace.subtree, &self.namespace.path(field), value);
    }

    /// Assign the mode and mirror it into shared state.
    pub fn set_mode(&mut self, mode: M) {
        if mode != self.mode {
            debug!("{}: {} -> {}", self.name, self.mode, mode);
        }
        self.mode = mode;
        *self.status.mode.write() = mode;
        self.mirror_mode();
    }

    fn mirror_mode(&self) {
        self.publish("mode", self.mode.as_str());
    }

    pub fn valid_transition(&self, from: M, to: M) -> bool {
        valid_transition(from, to)
    }

    /// Called by the handler of `running` at the end of each pass.
    ///
    /// Returns false while the mode is still `running`. Returns true once the
    /// mode has moved on, forcing `ERROR` first if the move was illegal.
    pub fn request_transition(&mut self, running: M) -> bool {
        if running == self.mode {
            return false;
        }
        if !valid_transition(running, self.mode) {
            error!(
                "{}: illegal transition {} -> {}, forcing {}",
                self.name,
                running,
                self.mode,
                M::ERROR
            );
            self.set_mode(M::ERROR);
        }
        true
    }

    /// Move to `next` if the table allows it, otherwise fail into `ERROR`.
    pub fn transition_to(&mut self, next: M) {
        if valid_transition(self.mode, next) {
            self.set_mode(next);
        } else {
            error!(
                "{}: illegal transition {} -> {}, forcing {}",
                self.name,
                self.mode,
                next,
                M::ERROR
            );
            self.set_mode(M::ERROR);
        }
    }

    /// Wait for the next inbox entry or the next tick.
    ///
    /// Control requests are applied here. A typed event is handed back to
    /// the caller; a tick yields `None`.
    pub async fn idle(&mut self) -> Option<E> {
        let tick = self.tick;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let envelope = tokio::select! {
            envelope = self.inbox.recv() => envelope,
            _ = ticker.tick() => None,
        };

        match envelope? {
            Envelope::Control(control) => {
                self.apply_control(control);
                None
            }
            Envelope::Event(event) => Some(event),
        }
    }

    /// Take one queued entry without waiting.
    pub fn poll_event(&mut self) -> Option<E> {
        match self.inbox.try_recv()? {
            Envelope::Control(control) => {
                self.apply_control(control);
                None
            }
            Envelope::Event(event) => Some(event),
        }
    }

    /// Idle until the mode leaves `running`, discarding typed events.
    pub async fn idle_until_transition(&mut self, running: M)
    where
        E: std::fmt::Debug,
    {
        loop {
            if let Some(event) = self.idle().await {
                warn!("{}: ignoring {:?} in {} mode", self.name, event, running);
            }
            if self.request_transition(running) {
                break;
            }
        }
    }

    fn apply_control(&mut self, control: Control) {
        match control {
            Control::Shutdown => {
                info!("{}: shutdown requested", self.name);
                self.set_mode(M::SHUTDOWN);
            }
            Control::Reset => {
                if valid_transition(self.mode, M::RESET) {
                    info!("{}: reset requested", self.name);
                    self.set_mode(M::RESET);
                } else {
                    warn!("{}: unable to reset from {} mode", self.name, self.mode);
                }
            }
        }
    }
}

/// A concrete actor: owns an [`ActorCore`] and one handler per mode.
pub trait StateMachine: Send + 'static {
    type Mode: ActorMode;
    type Event: Send + std::fmt::Debug + 'static;

    fn core(&self) -> &ActorCore<Self::Mode, Self::Event>;

    fn core_mut(&mut self) -> &mut ActorCore<Self::Mode, Self::Event>;

    /// Run the handler for `mode` until it requests a transition.
    fn run_mode(&mut self, mode: Self::Mode) -> impl Future<Output = ()> + Send;

    /// Called once after the loop reaches `SHUTDOWN`.
    fn on_shutdown(&mut self) {}
}

/// Dispatch modes until `SHUTDOWN`.
pub async fn run<S: StateMachine>(mut machine: S) {
    info!("▶️  {} running", machine.core().name());
    loop {
        let mode = machine.core().mode();
        if mode == S::Mode::SHUTDOWN {
            break;
        }
        machine.run_mode(mode).await;
    }
    machine.on_shutdown();
    info!("⏹️  {} stopped", machine.core().name());
}
