//! Transient user-facing notifications.
//!
//! # Architecture
//!
//! - [`NotificationQueue`] owns the ordered set of active notifications;
//!   callers only get back a [`NotificationId`]
//! - Every lifecycle step is a timer on one scheduler task: a deadline heap
//!   fed over a channel, so notifications never hold timers of their own
//! - The active set is published on a `watch` channel after every change
//!
//! # Lifecycle
//!
//! ```text
//! pending --entry delay--> visible --duration--> hiding --exit delay--> removed
//!    \____________________ dismiss _______________/
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::notify::NotificationQueue;
//!
//! let queue = NotificationQueue::new(NotificationConfig::default());
//! let id = queue.success("Added to cart");
//! queue.dismiss(id);
//! ```

mod scheduler;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

pub use shopfront_core::{NotificationId, Severity, Visibility};

use scheduler::{Timer, TimerAction};

/// Lifecycle delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Time a notification stays `pending` before it is shown.
    pub entry_delay: Duration,
    /// Display duration used by [`NotificationQueue::notify_default`] and the
    /// severity helpers.
    pub default_duration: Duration,
    /// Time a notification stays `hiding` before it is removed.
    pub exit_delay: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            entry_delay: Duration::from_millis(50),
            default_duration: Duration::from_millis(4000),
            exit_delay: Duration::from_millis(300),
        }
    }
}

/// One active notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub visibility: Visibility,
}

/// Handle to the notification queue.
///
/// Cheaply cloneable. The scheduler task stops once every handle is dropped;
/// timers still pending at that point never fire.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
    timers: mpsc::UnboundedSender<Timer>,
    config: NotificationConfig,
}

/// State shared between handles and the scheduler task.
pub(crate) struct Shared {
    state: Mutex<QueueState>,
    active: watch::Sender<Vec<Notification>>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    /// Oldest first.
    notifications: Vec<Notification>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &QueueState) {
        self.active.send_replace(state.notifications.clone());
    }

    /// `pending -> visible`. Any other state is left alone.
    pub(crate) fn reveal(&self, id: NotificationId) {
        let mut state = self.state();
        let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) else {
            return;
        };
        if !notification.visibility.can_reveal() {
            return;
        }

        notification.visibility = Visibility::Visible;
        debug!(%id, "notification visible");
        self.publish(&state);
    }

    /// `pending | visible -> hiding`.
    ///
    /// Returns `false` when the notification is unknown, removed or already
    /// hiding; the caller then schedules nothing.
    pub(crate) fn hide(&self, id: NotificationId) -> bool {
        let mut state = self.state();
        let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !notification.visibility.can_hide() {
            return false;
        }

        notification.visibility = Visibility::Hiding;
        debug!(%id, "notification hiding");
        self.publish(&state);
        true
    }

    /// `hiding -> removed`.
    pub(crate) fn remove(&self, id: NotificationId) {
        let mut state = self.state();
        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| n.id != id || n.visibility != Visibility::Hiding);
        if state.notifications.len() == before {
            return;
        }

        debug!(%id, "notification removed");
        self.publish(&state);
    }
}

impl NotificationQueue {
    /// Create a queue and start its scheduler task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        let (active, _) = watch::channel(Vec::new());
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            active,
        });

        let (timers, rx) = mpsc::unbounded_channel();
        tokio::spawn(scheduler::run(Arc::clone(&shared), rx, config.exit_delay));

        Self {
            shared,
            timers,
            config,
        }
    }

    /// The delays this queue runs with.
    #[must_use]
    pub const fn config(&self) -> &NotificationConfig {
        &self.config
    }

    fn schedule(&self, deadline: Instant, id: NotificationId, action: TimerAction) {
        // Fails only once the scheduler has stopped, which needs every
        // handle (including this one) gone.
        let _ = self.timers.send(Timer::new(deadline, id, action));
    }

    // =========================================================================
    // Raising
    // =========================================================================

    /// Show `message` for `duration`, then dismiss it.
    pub fn notify(
        &self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> NotificationId {
        let now = Instant::now();
        let id = {
            let mut state = self.shared.state();
            state.next_id += 1;
            let id = NotificationId::new(state.next_id);
            state.notifications.push(Notification {
                id,
                message: message.into(),
                severity,
                visibility: Visibility::Pending,
            });
            self.shared.publish(&state);
            id
        };

        debug!(%id, %severity, duration_ms = duration.as_millis(), "notification raised");
        self.schedule(now + self.config.entry_delay, id, TimerAction::Reveal);
        self.schedule(now + duration, id, TimerAction::Dismiss);
        id
    }

    /// Show `message` for the default duration.
    pub fn notify_default(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        self.notify(message, severity, self.config.default_duration)
    }

    /// Raise a success notification with the default duration.
    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.notify_default(message, Severity::Success)
    }

    /// Raise an error notification with the default duration.
    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.notify_default(message, Severity::Error)
    }

    /// Raise a warning notification with the default duration.
    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.notify_default(message, Severity::Warning)
    }

    /// Raise an informational notification with the default duration.
    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.notify_default(message, Severity::Info)
    }

    /// Start hiding a notification; it is removed after the exit delay.
    ///
    /// Unknown, removed and already hiding ids are ignored.
    pub fn dismiss(&self, id: NotificationId) {
        if self.shared.hide(id) {
            self.schedule(
                Instant::now() + self.config.exit_delay,
                id,
                TimerAction::Remove,
            );
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Active notifications, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notification> {
        self.shared.state().notifications.clone()
    }

    /// One active notification.
    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.shared
            .state()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    /// Watch the active set.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.shared.active.subscribe()
    }
}
