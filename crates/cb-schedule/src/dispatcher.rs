//! Per-user reminder dispatch loop
//!
//! A dispatcher is either idle or running exactly one loop. The loop sleeps
//! until the head reminder is due, delivers it, and moves on; a replacement
//! list delivered through [`ReminderDispatcher::arm`] discards whatever the
//! loop still had pending. An empty replacement stops the loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use cb_calendar::CalendarEvent;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::reminder::Reminder;

/// Receiver of fired reminders
///
/// Called from the dispatch loop; the loop waits for `deliver` to return
/// before looking at the next reminder. Failures are the sink's to log.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    /// Deliver one due reminder
    async fn deliver(&self, event: Arc<CalendarEvent>);
}

enum LoopState {
    Idle,
    /// A loop is running and listens for replacements on `updates`.
    Running { updates: watch::Sender<Vec<Reminder>> },
}

/// Owner of at most one dispatch loop
pub struct ReminderDispatcher {
    label: String,
    sink: Arc<dyn ReminderSink>,
    state: Arc<Mutex<LoopState>>,
}

impl ReminderDispatcher {
    /// Create an idle dispatcher; `label` identifies it in logs
    pub fn new(label: impl Into<String>, sink: Arc<dyn ReminderSink>) -> Self {
        Self {
            label: label.into(),
            sink,
            state: Arc::new(Mutex::new(LoopState::Idle)),
        }
    }

    /// Start, refresh or stop the schedule
    ///
    /// Starts a loop seeded with `reminders` when idle; otherwise hands the
    /// list to the running loop as a full replacement. An empty list stops a
    /// running loop and does nothing on an idle dispatcher. Must be called
    /// from within a Tokio runtime.
    pub fn arm(&self, reminders: Vec<Reminder>) {
        let mut state = lock(&self.state);

        match &*state {
            LoopState::Running { updates } => {
                debug!(user = %self.label, "Replacing pending reminders ({} new)", reminders.len());
                // send_replace never fails; the loop owns a receiver until
                // it has set the state back to idle under this lock.
                updates.send_replace(reminders);
            }
            LoopState::Idle if reminders.is_empty() => {
                debug!(user = %self.label, "Nothing to schedule");
            }
            LoopState::Idle => {
                let (updates, receiver) = watch::channel(Vec::new());
                *state = LoopState::Running { updates };

                info!(user = %self.label, "Starting reminder loop ({} reminders)", reminders.len());
                tokio::spawn(run_loop(
                    self.label.clone(),
                    reminders.into(),
                    receiver,
                    Arc::clone(&self.sink),
                    Arc::clone(&self.state),
                ));
            }
        }
    }

    /// Stop the running loop, if any
    pub fn cancel(&self) {
        self.arm(Vec::new());
    }

    /// Whether a loop is currently running
    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), LoopState::Running { .. })
    }
}

fn lock(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    // The state is a plain enum that is never left half-written.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_loop(
    label: String,
    mut reminders: VecDeque<Reminder>,
    mut updates: watch::Receiver<Vec<Reminder>>,
    sink: Arc<dyn ReminderSink>,
    state: Arc<Mutex<LoopState>>,
) {
    loop {
        let Some(next) = reminders.front() else {
            match take_pending_or_stop(&state, &mut updates) {
                Some(replacement) => {
                    reminders = replacement.into();
                    continue;
                }
                None => break,
            }
        };

        let delay = (next.trigger_at() - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            // Replacements are checked first so a list handed over while a
            // reminder was being delivered is adopted before anything stale
            // fires.
            biased;

            changed = updates.changed() => {
                if changed.is_err() {
                    error!(user = %label, "Reminder update channel closed");
                    break;
                }
                reminders = updates.borrow_and_update().iter().cloned().collect();
                debug!(user = %label, "Adopted {} replacement reminders", reminders.len());
            }
            _ = tokio::time::sleep(delay) => {
                if let Some(due) = reminders.pop_front() {
                    info!(user = %label, "Reminder for: {}", due.event().text);
                    sink.deliver(Arc::clone(due.event())).await;
                }
            }
        }
    }

    info!(user = %label, "Reminder loop stopped");
}

/// Called with an empty list: adopt a replacement that raced in, or mark
/// the dispatcher idle so the next `arm` starts a fresh loop.
fn take_pending_or_stop(
    state: &Mutex<LoopState>,
    updates: &mut watch::Receiver<Vec<Reminder>>,
) -> Option<Vec<Reminder>> {
    let mut state = lock(state);

    if updates.has_changed().unwrap_or(false) {
        let pending = updates.borrow_and_update().clone();
        if !pending.is_empty() {
            return Some(pending);
        }
    }

    *state = LoopState::Idle;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderOffset;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::sync::Weak;
    use tokio::sync::mpsc;

    /// Sink forwarding every delivered event to a channel
    struct ChannelSink {
        tx: mpsc::UnboundedSender<Arc<CalendarEvent>>,
    }

    #[async_trait]
    impl ReminderSink for ChannelSink {
        async fn deliver(&self, event: Arc<CalendarEvent>) {
            let _ = self.tx.send(event);
        }
    }

    fn sink() -> (Arc<ChannelSink>, mpsc::UnboundedReceiver<Arc<CalendarEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelSink { tx }), rx)
    }

    fn reminder_at(at: DateTime<Utc>, text: &str) -> Reminder {
        let event = Arc::new(CalendarEvent::new(at, at + ChronoDuration::minutes(75), text));
        Reminder::new(event, ReminderOffset::AT_START)
    }

    fn due_now(text: &str) -> Reminder {
        reminder_at(Utc::now(), text)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Arc<CalendarEvent>>) -> Arc<CalendarEvent> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reminder was not delivered in time")
            .expect("sink channel closed")
    }

    async fn wait_idle(dispatcher: &ReminderDispatcher) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatcher.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("dispatch loop did not stop");
    }

    #[tokio::test]
    async fn test_sends_reminders_in_list_order() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@alice:example.org", sink);

        let (r0, r1, r2) = (due_now("event 0"), due_now("event 1"), due_now("event 2"));
        dispatcher.arm(vec![r0.clone(), r1.clone(), r2.clone()]);

        assert!(Arc::ptr_eq(&next(&mut rx).await, r0.event()));
        assert!(Arc::ptr_eq(&next(&mut rx).await, r1.event()));
        assert!(Arc::ptr_eq(&next(&mut rx).await, r2.event()));

        wait_idle(&dispatcher).await;
        assert!(rx.try_recv().is_err());
    }

    /// Sink that hands a replacement list to its dispatcher when a chosen
    /// event is delivered
    struct ReplacingSink {
        tx: mpsc::UnboundedSender<Arc<CalendarEvent>>,
        trigger: Arc<CalendarEvent>,
        replacement: Vec<Reminder>,
        dispatcher: Mutex<Weak<ReminderDispatcher>>,
    }

    #[async_trait]
    impl ReminderSink for ReplacingSink {
        async fn deliver(&self, event: Arc<CalendarEvent>) {
            let is_trigger = Arc::ptr_eq(&event, &self.trigger);
            let _ = self.tx.send(event);
            if is_trigger {
                let dispatcher = self.dispatcher.lock().unwrap().upgrade();
                if let Some(dispatcher) = dispatcher {
                    dispatcher.arm(self.replacement.clone());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_receives_updates_correctly() {
        let (r0, r1, r2, r3) = (
            due_now("event 0"),
            due_now("event 1"),
            due_now("event 2"),
            due_now("event 3"),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ReplacingSink {
            tx,
            trigger: Arc::clone(r1.event()),
            replacement: vec![r3.clone(), r2.clone()],
            dispatcher: Mutex::new(Weak::new()),
        });
        let dispatcher = Arc::new(ReminderDispatcher::new("@bob:example.org", sink.clone()));
        *sink.dispatcher.lock().unwrap() = Arc::downgrade(&dispatcher);

        dispatcher.arm(vec![r0.clone(), r1.clone(), r2.clone()]);

        let received = [
            next(&mut rx).await,
            next(&mut rx).await,
            next(&mut rx).await,
            next(&mut rx).await,
        ];
        assert!(Arc::ptr_eq(&received[0], r0.event()));
        assert!(Arc::ptr_eq(&received[1], r1.event()));
        assert!(Arc::ptr_eq(&received[2], r3.event()));
        assert!(Arc::ptr_eq(&received[3], r2.event()));

        wait_idle(&dispatcher).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_arm_on_idle_is_noop() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@carol:example.org", sink);

        dispatcher.arm(Vec::new());

        assert!(!dispatcher.is_running());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_arm_cancels_pending() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@dave:example.org", sink);

        dispatcher.arm(vec![reminder_at(Utc::now() + ChronoDuration::hours(1), "later")]);
        assert!(dispatcher.is_running());

        dispatcher.cancel();
        wait_idle(&dispatcher).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rearm_supersedes_instead_of_stacking() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@erin:example.org", sink);

        let stale = reminder_at(Utc::now() + ChronoDuration::milliseconds(200), "stale");
        dispatcher.arm(vec![stale]);

        let fresh = reminder_at(Utc::now() + ChronoDuration::milliseconds(50), "fresh");
        dispatcher.arm(vec![fresh.clone()]);

        assert!(Arc::ptr_eq(&next(&mut rx).await, fresh.event()));
        wait_idle(&dispatcher).await;

        // The stale reminder was discarded with the old list.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restarts_after_exhaustion() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@frank:example.org", sink);

        let first = due_now("first");
        dispatcher.arm(vec![first.clone()]);
        assert!(Arc::ptr_eq(&next(&mut rx).await, first.event()));
        wait_idle(&dispatcher).await;

        let second = due_now("second");
        dispatcher.arm(vec![second.clone()]);
        assert!(Arc::ptr_eq(&next(&mut rx).await, second.event()));
        wait_idle(&dispatcher).await;
    }

    #[tokio::test]
    async fn test_waits_for_trigger_time() {
        let (sink, mut rx) = sink();
        let dispatcher = ReminderDispatcher::new("@grace:example.org", sink);

        let start = tokio::time::Instant::now();
        dispatcher.arm(vec![reminder_at(Utc::now() + ChronoDuration::milliseconds(100), "soon")]);
        next(&mut rx).await;

        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
