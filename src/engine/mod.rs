//! Cycle engine - the list / wait / relist state machine.
//!
//! The engine is a chain of scheduled continuations rather than a blocking
//! loop. Each step is submitted to the [`Scheduler`], fires on its worker,
//! hops onto the host's [`MainThread`] and re-validates the session before
//! touching anything. A step schedules its successor only from its own
//! callback, so the steps of one cycle run in strict order.
//!
//! Two producers call in concurrently: the tick path ([`CycleEngine::toggle`])
//! and the chat path ([`CycleEngine::on_text_message`]). Mutual exclusion of
//! cycles comes from the session's compare-and-set lock, not from the
//! scheduler.
//!
//! # Layout
//!
//! - `cycle`: scan, split, relocate, sell, exhaustion
//! - `failback`: the resell supervisor and the purchase/blocked signals

mod cycle;
mod failback;

use crate::config::ConfigStore;
use crate::host::{DesktopNotifier, GameClient, LogNotifier, MainThread, ScreenKind};
use crate::metrics::Metrics;
use crate::models::{CyclePhase, SessionSnapshot};
use crate::scheduler::Scheduler;
use crate::services::{PhraseClassifier, TextClassifier, TextSignal};
use crate::state::{CycleToken, Session, SessionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Handle to the automation engine. Cheap to clone; all clones drive the same
/// session.
#[derive(Clone)]
pub struct CycleEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`CycleEngine`].
pub struct EngineBuilder {
    scheduler: Arc<dyn Scheduler>,
    main: Arc<dyn MainThread>,
    config: Arc<dyn ConfigStore>,
    notifier: Arc<dyn DesktopNotifier>,
    classifier: Arc<dyn TextClassifier>,
    metrics: Arc<Metrics>,
}

impl EngineBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn DesktopNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> CycleEngine {
        let inner = EngineInner {
            session: Session::new(Arc::clone(&self.metrics)),
            scheduler: self.scheduler,
            main: self.main,
            config: self.config,
            notifier: self.notifier,
            classifier: self.classifier,
            metrics: self.metrics,
            owns_inventory: AtomicBool::new(false),
        };
        CycleEngine {
            inner: Arc::new(inner),
        }
    }
}

impl CycleEngine {
    /// Start building an engine from its three required collaborators.
    pub fn builder(
        scheduler: Arc<dyn Scheduler>,
        main: Arc<dyn MainThread>,
        config: Arc<dyn ConfigStore>,
    ) -> EngineBuilder {
        EngineBuilder {
            scheduler,
            main,
            config,
            notifier: Arc::new(LogNotifier),
            classifier: Arc::new(PhraseClassifier::default()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Switch automation on or off.
    pub fn toggle(&self) {
        if self.inner.session.toggle() {
            tracing::info!("Automation activated");
            self.inner.start_cycle();
        } else {
            tracing::info!("Automation deactivated");
            self.inner.release_inventory();
        }
    }

    /// Switch automation off if it is on.
    pub fn shutdown(&self) {
        if self.inner.session.deactivate() {
            tracing::info!("Automation deactivated");
            self.inner.release_inventory();
        }
    }

    /// Feed one inbound chat or game message.
    pub fn on_text_message(&self, text: &str) {
        if let Some(signal) = self.inner.classifier.classify(text) {
            tracing::debug!("Classified {:?}: {}", signal, text);
            self.notify(signal);
        }
    }

    /// Apply an already classified signal.
    pub fn notify(&self, signal: TextSignal) {
        match signal {
            TextSignal::Blocked => self.inner.handle_blocked(),
            TextSignal::Sold => self.inner.handle_sold(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.is_active()
    }

    pub fn phase(&self) -> CyclePhase {
        self.inner.session.phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    /// Continuations of the current activation that may still fire.
    pub fn pending_steps(&self) -> usize {
        self.inner.session.pending_steps()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.session.subscribe()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}

pub(crate) struct EngineInner {
    session: Session,
    scheduler: Arc<dyn Scheduler>,
    main: Arc<dyn MainThread>,
    config: Arc<dyn ConfigStore>,
    notifier: Arc<dyn DesktopNotifier>,
    classifier: Arc<dyn TextClassifier>,
    metrics: Arc<Metrics>,

    /// Set while a cycle has the inventory screen open.
    owns_inventory: AtomicBool,
}

impl EngineInner {
    /// Schedule the next step of the cycle owning `token`. The step is
    /// dropped if the cycle is no longer live when it fires.
    fn schedule_step<F>(self: &Arc<Self>, delay: Duration, token: CycleToken, step: F)
    where
        F: FnOnce(&Arc<Self>, CycleToken) + Send + 'static,
    {
        let this = Arc::clone(self);
        let handle = self.scheduler.after(
            delay,
            Box::new(move || {
                if this.session.is_live(token) {
                    step(&this, token);
                }
            }),
        );
        self.session.track(handle);
    }

    /// Schedule a step that only needs the activation to still be current.
    fn schedule_in_epoch<F>(self: &Arc<Self>, delay: Duration, epoch: u64, step: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        let this = Arc::clone(self);
        let handle = self.scheduler.after(
            delay,
            Box::new(move || {
                if this.session.is_current(epoch) {
                    step(&this);
                }
            }),
        );
        self.session.track(handle);
    }

    /// Run `action` on the main thread for the cycle owning `token`.
    ///
    /// Re-checks the cycle and the player session on arrival; without a
    /// player the cycle is abandoned.
    fn on_main<F>(self: &Arc<Self>, token: CycleToken, action: F)
    where
        F: FnOnce(&Arc<Self>, CycleToken, &mut dyn GameClient) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.main.execute(Box::new(move |client: &mut dyn GameClient| {
            if !this.session.is_live(token) {
                return;
            }
            if !client.has_player() {
                this.abandon(token, "no player session");
                return;
            }
            action(&this, token, client);
        }));
    }

    fn open_inventory(&self, client: &mut dyn GameClient) {
        client.open_inventory();
        self.owns_inventory.store(true, Ordering::SeqCst);
    }

    fn close_inventory(&self, client: &mut dyn GameClient) {
        self.owns_inventory.store(false, Ordering::SeqCst);
        client.close_screen();
    }

    /// Close an inventory screen a cycle opened and never got to close.
    ///
    /// Queued on the main thread, so it lands after any step already running
    /// there.
    fn release_inventory(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.main.execute(Box::new(move |client: &mut dyn GameClient| {
            if !this.owns_inventory.swap(false, Ordering::SeqCst) {
                return;
            }
            let open = client
                .current_screen()
                .is_some_and(|screen| screen.kind == ScreenKind::Inventory);
            if open && client.has_player() {
                tracing::debug!("Closing inventory left open by an interrupted cycle");
                client.close_screen();
            }
        }));
    }

    /// `schedule_step` followed by `on_main`.
    fn step_on_main<F>(self: &Arc<Self>, delay: Duration, token: CycleToken, action: F)
    where
        F: FnOnce(&Arc<Self>, CycleToken, &mut dyn GameClient) + Send + 'static,
    {
        self.schedule_step(delay, token, move |this, token| this.on_main(token, action));
    }
}
