use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{EngineSettings, UserId};
use quiz_core::time::format_remaining;

use crate::collaborators::{Notifier, Router, Severity};
use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorOutcome {
    /// The slot was empty.
    NoSession,
    /// A stale, foreign, inactive or expired record was dropped.
    Discarded,
    /// The user was sent back to their running attempt.
    Redirected { path: String, remaining_secs: u32 },
}

/// Runs on entry to protected pages and sends a user with a live attempt
/// back to it.
pub struct ActiveSessionDetector {
    clock: Clock,
    settings: EngineSettings,
    store: SessionStore,
    notifier: Arc<dyn Notifier>,
    router: Arc<dyn Router>,
}

impl ActiveSessionDetector {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            clock,
            settings,
            store,
            notifier,
            router,
        }
    }

    pub async fn check(&self, user_id: UserId) -> DetectorOutcome {
        let Some(session) = self.store.read().await else {
            return DetectorOutcome::NoSession;
        };

        let now = self.clock.now();
        if !session.is_live_for(user_id, None, now) {
            tracing::debug!(
                slug = session.slug(),
                stale = session.is_stale(now),
                "discarding session that cannot be resumed"
            );
            self.store.clear().await;
            return DetectorOutcome::Discarded;
        }

        let remaining_secs = session.remaining_secs(now);
        let path = self.settings.quiz_route(session.slug());
        self.notifier.notify(
            &format!(
                "You have a quiz in progress with {} left. Taking you back to it.",
                format_remaining(remaining_secs)
            ),
            Severity::Info,
        );

        tokio::time::sleep(self.settings.redirect_delay()).await;
        tracing::info!(%path, remaining_secs, "redirecting to active session");
        self.router.navigate_to(&path);

        DetectorOutcome::Redirected {
            path,
            remaining_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuizId, QuizSession};
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    use crate::memory::{RecordingNotifier, RecordingRouter};

    struct Fixture {
        repo: InMemoryRepository,
        notifier: Arc<RecordingNotifier>,
        router: Arc<RecordingRouter>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repo: InMemoryRepository::new(),
                notifier: Arc::new(RecordingNotifier::new()),
                router: Arc::new(RecordingRouter::new()),
            }
        }

        fn store(&self) -> SessionStore {
            SessionStore::new(Arc::new(self.repo.clone()))
        }

        fn detector(&self, clock: Clock) -> ActiveSessionDetector {
            ActiveSessionDetector::new(
                clock,
                EngineSettings::default(),
                self.store(),
                self.notifier.clone(),
                self.router.clone(),
            )
        }

        async fn seed(&self, owner: u64) {
            let session =
                QuizSession::new(UserId::new(owner), QuizId::new(3), "traits", 300, fixed_now())
                    .unwrap();
            assert!(self.store().write(&session).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn redirects_owner_after_delay() {
        let fixture = Fixture::new();
        fixture.seed(1).await;
        let detector = fixture.detector(fixed_clock().advanced(Duration::seconds(100)));

        let started = tokio::time::Instant::now();
        let outcome = detector.check(UserId::new(1)).await;

        assert_eq!(
            outcome,
            DetectorOutcome::Redirected {
                path: "/quiz/traits".into(),
                remaining_secs: 200,
            }
        );
        assert!(started.elapsed() >= std::time::Duration::from_millis(1500));
        assert_eq!(fixture.router.paths(), vec!["/quiz/traits".to_string()]);
        let info = fixture.notifier.messages_with(Severity::Info);
        assert_eq!(info.len(), 1);
        assert!(info[0].contains("03:20"));
    }

    #[tokio::test]
    async fn empty_slot_does_nothing() {
        let fixture = Fixture::new();
        let outcome = fixture.detector(fixed_clock()).check(UserId::new(1)).await;
        assert_eq!(outcome, DetectorOutcome::NoSession);
        assert!(fixture.router.paths().is_empty());
    }

    #[tokio::test]
    async fn foreign_session_is_discarded_silently() {
        let fixture = Fixture::new();
        fixture.seed(2).await;

        let outcome = fixture.detector(fixed_clock()).check(UserId::new(1)).await;
        assert_eq!(outcome, DetectorOutcome::Discarded);
        assert!(fixture.notifier.messages().is_empty());
        assert!(fixture.router.paths().is_empty());
        assert!(fixture.repo.raw().is_none());
    }

    #[tokio::test]
    async fn stale_session_is_discarded() {
        let fixture = Fixture::new();
        fixture.seed(1).await;
        let clock = fixed_clock().advanced(Duration::minutes(31));

        let outcome = fixture.detector(clock).check(UserId::new(1)).await;
        assert_eq!(outcome, DetectorOutcome::Discarded);
        assert!(fixture.repo.raw().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_discarded() {
        let fixture = Fixture::new();
        fixture.seed(1).await;
        let clock = fixed_clock().advanced(Duration::seconds(300));

        let outcome = fixture.detector(clock).check(UserId::new(1)).await;
        assert_eq!(outcome, DetectorOutcome::Discarded);
    }
}
