//! User-facing notification and confirmation seams.
//!
//! Injected into the workflows instead of living as an ambient global, so
//! a headless caller (tests, CLI) and a UI shell plug in equally well.

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Info,
    Warn,
    Error,
    Success,
}

/// Sink for every user-facing outcome: toasts, the response banner, the
/// message log — whatever the shell renders.
pub trait Notifier {
    fn notify(&self, message: &str, kind: NotifyKind);
}

/// Human-in-the-loop confirmation. Every destructive step (delete, discard
/// unsaved edits, overwrite an existing command) asks here before mutating.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Notifier that drops everything. Useful in tests.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _kind: NotifyKind) {}
}

/// Run a remote operation, offering a confirm-to-retry on network-class
/// failures (timeout, connection refused). Accepting re-invokes the same
/// operation with the same arguments; declining returns the error.
/// Validation/service/conflict failures return immediately — retrying
/// does not help those.
pub async fn with_retry<T, F, Fut>(
    confirm: &dyn Confirm,
    operation: F,
) -> Result<T, crate::error::AppError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, crate::error::AppError>>,
{
    loop {
        match operation().await {
            Err(e) if e.is_network_class() => {
                if !confirm.confirm(&format!("{e} Retry?")) {
                    return Err(e);
                }
            }
            other => return other,
        }
    }
}
