//! Delayed-task scheduler driving notification lifecycles.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::{NotificationId, Shared};

/// Lifecycle step to run when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum TimerAction {
    Reveal,
    Dismiss,
    Remove,
}

/// One scheduled step.
///
/// Ordered by deadline; timers with the same deadline fire in the order they
/// were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Timer {
    deadline: Instant,
    seq: u64,
    id: NotificationId,
    action: TimerAction,
}

impl Timer {
    pub(crate) const fn new(deadline: Instant, id: NotificationId, action: TimerAction) -> Self {
        Self {
            deadline,
            seq: 0,
            id,
            action,
        }
    }
}

#[derive(Default)]
struct TimerHeap {
    heap: BinaryHeap<Reverse<Timer>>,
    next_seq: u64,
}

impl TimerHeap {
    fn push(&mut self, mut timer: Timer) {
        timer.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(timer));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(timer)| timer.deadline)
    }

    fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(timer)| timer)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run until every queue handle is dropped.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Timer>,
    exit_delay: Duration,
) {
    let mut timers = TimerHeap::default();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(timer) => timers.push(timer),
                None => break,
            },
            () = sleep_until(timers.next_deadline()) => {
                let now = Instant::now();
                while let Some(timer) = timers.pop_due(now) {
                    match timer.action {
                        TimerAction::Reveal => shared.reveal(timer.id),
                        TimerAction::Dismiss => {
                            if shared.hide(timer.id) {
                                timers.push(Timer::new(
                                    timer.deadline + exit_delay,
                                    timer.id,
                                    TimerAction::Remove,
                                ));
                            }
                        }
                        TimerAction::Remove => shared.remove(timer.id),
                    }
                }
            }
        }
    }

    debug!(pending = timers.heap.len(), "notification scheduler stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_heap_orders_by_deadline_then_schedule_order() {
        let now = Instant::now();
        let mut heap = TimerHeap::default();
        let id = NotificationId::new(1);

        heap.push(Timer::new(now + Duration::from_millis(20), id, TimerAction::Remove));
        heap.push(Timer::new(now + Duration::from_millis(10), id, TimerAction::Dismiss));
        heap.push(Timer::new(now + Duration::from_millis(10), id, TimerAction::Reveal));

        let later = now + Duration::from_millis(30);
        let order: Vec<_> = std::iter::from_fn(|| heap.pop_due(later))
            .map(|t| t.action)
            .collect();
        assert_eq!(
            order,
            vec![TimerAction::Dismiss, TimerAction::Reveal, TimerAction::Remove]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_due_leaves_future_timers() {
        let now = Instant::now();
        let mut heap = TimerHeap::default();
        heap.push(Timer::new(
            now + Duration::from_millis(50),
            NotificationId::new(1),
            TimerAction::Reveal,
        ));

        assert!(heap.pop_due(now).is_none());
        assert_eq!(heap.next_deadline(), Some(now + Duration::from_millis(50)));
    }
}
