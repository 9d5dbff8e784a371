//! User-facing advisories raised by the request pipeline (currently only 403).

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Non-blocking sink for notices. Must not fail or wait on the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        warn!(title = %notice.title, "{}", notice.description);
    }
}

/// Forwards notices to a receiver drained by the shell.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            warn!("Notice dropped: receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notice::new("Forbidden", "Missing permission"));
        let notice = rx.try_recv().expect("notice delivered");
        assert_eq!(notice.title, "Forbidden");
        assert_eq!(notice.description, "Missing permission");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notice::new("Forbidden", "ignored"));
    }
}
