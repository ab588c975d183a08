//! Exit protection for an active attempt.

use std::fmt;
use std::sync::Arc;

use crate::collaborators::{Notifier, Severity};

/// A way the user can try to leave the page hosting the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitSignal {
    Unload,
    BackNavigation,
    VisibilityLost,
}

impl ExitSignal {
    pub const ALL: [ExitSignal; 3] = [
        ExitSignal::Unload,
        ExitSignal::BackNavigation,
        ExitSignal::VisibilityLost,
    ];
}

/// What the host should do with an exit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitResponse {
    Allow,
    Block,
    /// Ask the user with a native confirmation prompt.
    Confirm,
}

pub type ExitHandler = Arc<dyn Fn(ExitSignal) -> ExitResponse + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Host-provided source of exit signals.
pub trait ExitSignalSource: Send + Sync {
    fn subscribe(&self, signal: ExitSignal, handler: ExitHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

pub(crate) const BACK_NAVIGATION_MESSAGE: &str =
    "Finish or submit the quiz before leaving this page.";
pub(crate) const VISIBILITY_LOST_MESSAGE: &str =
    "You left the quiz tab. The timer keeps running.";

fn respond(signal: ExitSignal, notifier: &dyn Notifier) -> ExitResponse {
    match signal {
        ExitSignal::Unload => ExitResponse::Confirm,
        ExitSignal::BackNavigation => {
            notifier.notify(BACK_NAVIGATION_MESSAGE, Severity::Warning);
            ExitResponse::Block
        }
        ExitSignal::VisibilityLost => {
            notifier.notify(VISIBILITY_LOST_MESSAGE, Severity::Warning);
            ExitResponse::Allow
        }
    }
}

/// Holds exit-signal subscriptions while enabled. Dropping the guard
/// releases them.
pub struct NavigationGuard {
    source: Arc<dyn ExitSignalSource>,
    notifier: Arc<dyn Notifier>,
    subscriptions: Vec<SubscriptionId>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(source: Arc<dyn ExitSignalSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            source,
            notifier,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe to every exit signal. No-op if already enabled.
    pub fn enable(&mut self) {
        if self.is_enabled() {
            return;
        }
        for signal in ExitSignal::ALL {
            let notifier = Arc::clone(&self.notifier);
            let handler: ExitHandler =
                Arc::new(move |signal| respond(signal, notifier.as_ref()));
            self.subscriptions.push(self.source.subscribe(signal, handler));
        }
        tracing::debug!("navigation guard enabled");
    }

    /// Release every subscription. No-op if already disabled.
    pub fn disable(&mut self) {
        if !self.is_enabled() {
            return;
        }
        for id in self.subscriptions.drain(..) {
            self.source.unsubscribe(id);
        }
        tracing::debug!("navigation guard disabled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.subscriptions.is_empty()
    }
}

impl Drop for NavigationGuard {
    fn drop(&mut self) {
        self.disable();
    }
}

impl fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ManualSignalSource, RecordingNotifier};

    fn guard() -> (NavigationGuard, Arc<ManualSignalSource>, Arc<RecordingNotifier>) {
        let source = Arc::new(ManualSignalSource::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let guard = NavigationGuard::new(source.clone(), notifier.clone());
        (guard, source, notifier)
    }

    #[test]
    fn responses_per_signal() {
        let (mut guard, source, notifier) = guard();
        guard.enable();

        assert_eq!(source.emit(ExitSignal::Unload), Some(ExitResponse::Confirm));
        assert!(notifier.messages().is_empty());

        assert_eq!(
            source.emit(ExitSignal::BackNavigation),
            Some(ExitResponse::Block)
        );
        assert_eq!(
            source.emit(ExitSignal::VisibilityLost),
            Some(ExitResponse::Allow)
        );
        assert_eq!(
            notifier.messages(),
            vec![
                (BACK_NAVIGATION_MESSAGE.to_string(), Severity::Warning),
                (VISIBILITY_LOST_MESSAGE.to_string(), Severity::Warning),
            ]
        );
    }

    #[test]
    fn enable_twice_subscribes_once() {
        let (mut guard, source, _) = guard();
        guard.enable();
        guard.enable();
        assert_eq!(source.active_subscriptions(), 3);
    }

    #[test]
    fn disable_releases_everything_once() {
        let (mut guard, source, _) = guard();
        guard.enable();
        guard.disable();
        guard.disable();
        assert_eq!(source.active_subscriptions(), 0);
        assert_eq!(source.unsubscribe_calls(), 3);
        assert_eq!(source.emit(ExitSignal::BackNavigation), None);
    }

    #[test]
    fn drop_releases_subscriptions() {
        let (mut guard, source, _) = guard();
        guard.enable();
        drop(guard);
        assert_eq!(source.active_subscriptions(), 0);
    }
}
