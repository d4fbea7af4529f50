use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

impl ToastKind {
    fn lifetime(self) -> Duration {
        match self {
            ToastKind::Error => Duration::from_secs(6),
            ToastKind::Info | ToastKind::Success => Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    expires_at: Instant,
}

const MAX_TOASTS: usize = 5;

/// Transient notifications, newest first.
#[derive(Debug, Default)]
pub struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    pub fn push(&mut self, kind: ToastKind, message: impl Into<String>, now: Instant) {
        self.items.push_front(Toast {
            kind,
            message: message.into(),
            expires_at: now + kind.lifetime(),
        });
        self.items.truncate(MAX_TOASTS);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(ToastKind::Info, message, Instant::now());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(ToastKind::Success, message, Instant::now());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.push(ToastKind::Error, message, Instant::now());
    }

    /// Drop expired toasts.
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|t| t.expires_at > now);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
