//! Side channel told about new entries once per poll run.

use tokio::sync::mpsc;

pub trait Notifier {
    /// Fire and forget. Called at most once per run, only when `count > 0`.
    fn entries_added(&self, count: usize);
}

/// Writes a log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn entries_added(&self, count: usize) {
        tracing::info!(count, "New entries available");
    }
}

/// Forwards counts to an mpsc receiver. A full or closed channel drops the
/// notification.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<usize>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<usize>) -> Self {
        Self { sender }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<usize>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self::new(sender), receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn entries_added(&self, count: usize) {
        if let Err(e) = self.sender.try_send(count) {
            tracing::debug!("Dropped entries notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::channel(4);
        notifier.entries_added(3);
        assert_eq!(rx.try_recv().unwrap(), 3);
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::channel(1);
        drop(rx);
        notifier.entries_added(1);
    }

    #[test]
    fn test_channel_notifier_drops_when_full() {
        let (notifier, mut rx) = ChannelNotifier::channel(1);
        notifier.entries_added(1);
        notifier.entries_added(2);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }
}
