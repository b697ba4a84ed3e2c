use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::path::TreePath;
use crate::project::SessionEvent;

struct PendingWrite {
    path: TreePath,
    ticket: u64,
    timer: JoinHandle<()>,
}

/// Delays propagation of content edits until typing pauses
///
/// Each [`schedule`](Debouncer::schedule) cancels the running timer and
/// starts a new one. When a timer survives the full delay it sends
/// [`SessionEvent::DebounceElapsed`] carrying its ticket; the session then
/// calls [`take_elapsed`](Debouncer::take_elapsed), which ignores tickets
/// that were superseded in the meantime.
pub struct Debouncer {
    delay: Duration,
    next_ticket: u64,
    pending: Option<PendingWrite>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Debouncer {
    pub fn new(delay: Duration, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            delay,
            next_ticket: 0,
            pending: None,
            events,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Path with an edit waiting to be propagated
    pub fn pending_path(&self) -> Option<&TreePath> {
        self.pending.as_ref().map(|pending| &pending.path)
    }

    /// Restart the quiet period for an edit to `path`; returns the ticket
    pub fn schedule(&mut self, path: TreePath) -> u64 {
        self.discard();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let delay = self.delay;
        let events = self.events.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::DebounceElapsed { ticket });
        });

        self.pending = Some(PendingWrite {
            path,
            ticket,
            timer,
        });
        ticket
    }

    /// Claim the pending write if `ticket` is still the live one
    pub fn take_elapsed(&mut self, ticket: u64) -> Option<TreePath> {
        let live = self
            .pending
            .as_ref()
            .map_or(false, |pending| pending.ticket == ticket);
        if !live {
            return None;
        }
        self.pending.take().map(|pending| pending.path)
    }

    /// Stop the timer early and hand back the pending path for propagation
    pub fn flush(&mut self) -> Option<TreePath> {
        let pending = self.pending.take()?;
        pending.timer.abort();
        Some(pending.path)
    }

    /// Stop the timer and drop the pending write
    pub fn discard(&mut self) -> bool {
        self.flush().is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn p(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(700), tx);
        let start = Instant::now();

        debouncer.schedule(p("a.js"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        let ticket = debouncer.schedule(p("a.js"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, SessionEvent::DebounceElapsed { ticket });
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(debouncer.take_elapsed(ticket), Some(p("a.js")));

        // the superseded timer never fires
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_ticket_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(700), tx);

        let old = debouncer.schedule(p("a.js"));
        let new = debouncer.schedule(p("a.js"));

        assert_eq!(debouncer.take_elapsed(old), None);
        assert_eq!(debouncer.pending_path(), Some(&p("a.js")));
        assert_eq!(debouncer.take_elapsed(new), Some(p("a.js")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(700), tx);

        debouncer.schedule(p("a.js"));
        assert_eq!(debouncer.flush(), Some(p("a.js")));
        assert_eq!(debouncer.flush(), None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
