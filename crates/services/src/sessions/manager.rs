use std::sync::Arc;

use quiz_core::evaluate;
use quiz_core::model::{
    EngineSettings, OptionId, Question, QuestionId, QuizDefinition, QuizId, QuizSession,
    ScoreResult, UserId,
};
use quiz_core::time::format_remaining;
use quiz_core::Clock;
use tokio::sync::mpsc;

use super::progress::SessionProgress;
use super::state::{
    AttemptResult, FinalizeOutcome, FinalizeTrigger, SessionState, StartOutcome, TimerEvent,
};
use crate::collaborators::{Collaborators, Severity};
use crate::countdown::{Countdown, CountdownEvent, CountdownState};
use crate::error::SessionError;
use crate::guard::NavigationGuard;
use crate::store::SessionStore;

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// Identity and content of the attempt, kept after finalize so it can be retried.
struct Attempt {
    user_id: UserId,
    definition: Arc<QuizDefinition>,
    default_time_limit_secs: u32,
    session: QuizSession,
}

/// Resources that only exist while `Active`. Dropping them stops the
/// countdown and releases the guard.
struct Live {
    countdown: Countdown,
    events: mpsc::UnboundedReceiver<CountdownEvent>,
    guard: NavigationGuard,
}

fn active_attempt(
    state: SessionState,
    attempt: &mut Option<Attempt>,
) -> Result<&mut Attempt, SessionError> {
    match (state, attempt.as_mut()) {
        (SessionState::Active, Some(attempt)) => Ok(attempt),
        (state, _) => Err(SessionError::NotActive(state)),
    }
}

struct Graded {
    score: ScoreResult,
    user_id: UserId,
    quiz_id: QuizId,
}

#[derive(Clone, Copy)]
enum Step {
    Forward,
    Back,
}

//
// ─── MANAGER ───────────────────────────────────────────────────────────────────
//

/// Drives one timed attempt at a time: start or resume, mutate, finalize, retry.
///
/// Every mutation is written through `SessionStore` immediately. Store faults
/// are absorbed by the store and never change the state machine.
pub struct SessionManager {
    clock: Clock,
    settings: EngineSettings,
    store: SessionStore,
    collaborators: Collaborators,
    state: SessionState,
    attempt: Option<Attempt>,
    live: Option<Live>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        store: SessionStore,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            clock,
            settings,
            store,
            collaborators,
            state: SessionState::NoSession,
            attempt: None,
            live: None,
        }
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The current attempt's session, including after it was finalized.
    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        self.attempt.as_ref().map(|attempt| &attempt.session)
    }

    #[must_use]
    pub fn definition(&self) -> Option<&QuizDefinition> {
        self.attempt.as_ref().map(|attempt| attempt.definition.as_ref())
    }

    /// Time left, derived from the session start. `None` unless `Active`.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        if self.state != SessionState::Active {
            return None;
        }
        self.session()
            .map(|session| session.remaining_secs(self.clock.now()))
    }

    #[must_use]
    pub fn countdown_state(&self) -> Option<CountdownState> {
        self.live.as_ref().map(|live| live.countdown.state())
    }

    #[must_use]
    pub fn is_guarded(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.guard.is_enabled())
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let attempt = self.attempt.as_ref()?;
        attempt
            .definition
            .question_at(attempt.session.current_question_index())
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let attempt = self.attempt.as_ref()?;
        let total = attempt.definition.question_count();
        let remaining = attempt.definition.unanswered_count(attempt.session.answers());
        Some(SessionProgress {
            total,
            answered: total - remaining,
            remaining,
            current_index: attempt.session.current_question_index(),
            is_complete: remaining == 0,
        })
    }

    // ─── Start ─────────────────────────────────────────────────────────────────

    /// Fetch the quiz behind `slug` and start or resume an attempt at it.
    ///
    /// The definition's own time limit wins over the configured default.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuizNotFound` or `SessionError::Provider` when no
    /// definition can be obtained; the user is notified and sent to the
    /// fallback route first.
    pub async fn start(&mut self, user_id: UserId, slug: &str) -> Result<StartOutcome, SessionError> {
        let definition = match self.collaborators.definitions.fetch_by_slug(slug).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                return Err(self.abandon_start(SessionError::QuizNotFound {
                    slug: slug.to_string(),
                }));
            }
            Err(err) => return Err(self.abandon_start(err.into())),
        };

        let default_time_limit_secs = definition
            .time_limit_secs()
            .unwrap_or(self.settings.default_time_limit_secs());
        self.start_with_definition(user_id, definition, default_time_limit_secs)
            .await
    }

    /// Start or resume an attempt at an already fetched definition.
    ///
    /// A stored record is resumed only if it is live for `(user_id, slug)`.
    /// Any other record is discarded and a fresh session with
    /// `default_time_limit_secs` is created.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Session` if `default_time_limit_secs` is zero.
    pub async fn start_with_definition(
        &mut self,
        user_id: UserId,
        definition: QuizDefinition,
        default_time_limit_secs: u32,
    ) -> Result<StartOutcome, SessionError> {
        self.begin(user_id, Arc::new(definition), default_time_limit_secs)
            .await
    }

    async fn begin(
        &mut self,
        user_id: UserId,
        definition: Arc<QuizDefinition>,
        default_time_limit_secs: u32,
    ) -> Result<StartOutcome, SessionError> {
        self.release();
        self.attempt = None;
        self.state = SessionState::Starting;

        let now = self.clock.now();
        let (session, resumed) = match self.store.read().await {
            Some(mut existing) if existing.is_live_for(user_id, Some(definition.slug()), now) => {
                let last = definition.question_count().saturating_sub(1);
                if existing.current_question_index() > last {
                    existing.set_current_question_index(last, now);
                    self.store.write(&existing).await;
                }
                (existing, true)
            }
            existing => {
                if let Some(discarded) = existing {
                    tracing::debug!(
                        slug = discarded.slug(),
                        stale = discarded.is_stale(now),
                        "discarding stored session"
                    );
                    self.store.clear().await;
                }
                let session = match QuizSession::new(
                    user_id,
                    definition.id(),
                    definition.slug(),
                    default_time_limit_secs,
                    now,
                ) {
                    Ok(session) => session,
                    Err(err) => {
                        self.state = SessionState::NoSession;
                        return Err(err.into());
                    }
                };
                self.store.write(&session).await;
                (session, false)
            }
        };

        let remaining_secs = session.remaining_secs(now);
        let mut countdown = Countdown::new(
            self.settings.tick_period(),
            self.settings.warning_threshold_secs(),
        );
        let events = match countdown.start(remaining_secs) {
            Ok(events) => events,
            Err(err) => {
                self.state = SessionState::NoSession;
                return Err(err.into());
            }
        };
        let mut guard = NavigationGuard::new(
            Arc::clone(&self.collaborators.signals),
            Arc::clone(&self.collaborators.notifier),
        );
        guard.enable();

        if resumed {
            self.collaborators.notifier.notify(
                &format!(
                    "Resuming your quiz with {} left.",
                    format_remaining(remaining_secs)
                ),
                Severity::Info,
            );
        }
        tracing::info!(
            user_id = %user_id,
            slug = definition.slug(),
            resumed,
            remaining_secs,
            "quiz session active"
        );

        self.live = Some(Live {
            countdown,
            events,
            guard,
        });
        self.attempt = Some(Attempt {
            user_id,
            definition,
            default_time_limit_secs,
            session,
        });
        self.state = SessionState::Active;

        Ok(StartOutcome {
            resumed,
            remaining_secs,
        })
    }

    fn abandon_start(&mut self, err: SessionError) -> SessionError {
        tracing::error!(error = %err, "quiz could not be started");
        self.release();
        self.attempt = None;
        self.state = SessionState::NoSession;
        self.collaborators
            .notifier
            .notify(&format!("This quiz could not be loaded: {err}"), Severity::Error);
        self.collaborators
            .router
            .navigate_to(self.settings.fallback_route());
        err
    }

    // ─── Mutations ─────────────────────────────────────────────────────────────

    /// Select `option_id` for `question_id`, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active` and
    /// `SessionError::UnknownAnswer` if the pair is not part of the quiz.
    pub async fn record_answer(
        &mut self,
        question_id: QuestionId,
        option_id: OptionId,
    ) -> Result<(), SessionError> {
        if self.expire_if_overdue().await.is_some() {
            return Err(SessionError::NotActive(self.state));
        }
        let now = self.clock.now();
        let attempt = active_attempt(self.state, &mut self.attempt)?;

        let known = attempt
            .definition
            .question(question_id)
            .is_some_and(|question| question.has_option(option_id));
        if !known {
            return Err(SessionError::UnknownAnswer {
                question: question_id,
                option: option_id,
            });
        }

        attempt.session.record_answer(question_id, option_id, now);
        tracing::debug!(question = %question_id, option = %option_id, "answer recorded");
        self.store.write(&attempt.session).await;
        Ok(())
    }

    /// Move to the next question. No-op on the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active`.
    pub async fn advance(&mut self) -> Result<usize, SessionError> {
        self.step(Step::Forward).await
    }

    /// Move to the previous question. No-op on the first one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active`.
    pub async fn retreat(&mut self) -> Result<usize, SessionError> {
        self.step(Step::Back).await
    }

    async fn step(&mut self, step: Step) -> Result<usize, SessionError> {
        if self.expire_if_overdue().await.is_some() {
            return Err(SessionError::NotActive(self.state));
        }
        let now = self.clock.now();
        let attempt = active_attempt(self.state, &mut self.attempt)?;

        let current = attempt.session.current_question_index();
        let last = attempt.definition.question_count().saturating_sub(1);
        let next = match step {
            Step::Forward => (current + 1).min(last),
            Step::Back => current.saturating_sub(1),
        };
        if next == current {
            return Ok(current);
        }

        attempt.session.set_current_question_index(next, now);
        self.store.write(&attempt.session).await;
        Ok(next)
    }

    // ─── Finalize ──────────────────────────────────────────────────────────────

    /// Grade the attempt and clear it.
    ///
    /// Only the first finalize of an attempt does anything; later calls return
    /// `FinalizeOutcome::AlreadyFinalized` until the next start or retry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IncompleteSubmission` for a manual submit with
    /// unanswered questions. The attempt stays `Active`.
    ///
    /// Once the time limit has passed by the clock, any finalize is graded as
    /// an expiry, even if the countdown has not reported it yet.
    pub async fn finalize(
        &mut self,
        trigger: FinalizeTrigger,
    ) -> Result<FinalizeOutcome, SessionError> {
        if let Some(outcome) = self.expire_if_overdue().await {
            return Ok(outcome);
        }
        if trigger == FinalizeTrigger::Manual && self.state == SessionState::Active {
            if let Some(progress) = self.progress().filter(|progress| progress.remaining > 0) {
                let (unanswered, total) = (progress.remaining, progress.total);
                self.collaborators.notifier.notify(
                    &format!("{unanswered} of {total} questions are still unanswered."),
                    Severity::Warning,
                );
                return Err(SessionError::IncompleteSubmission { unanswered, total });
            }
        }

        Ok(self.complete(trigger).await)
    }

    /// Finalize by expiry when the attempt is `Active` but its time, measured
    /// from `start_time`, is used up. `None` if nothing happened.
    async fn expire_if_overdue(&mut self) -> Option<FinalizeOutcome> {
        if self.remaining_secs() != Some(0) {
            return None;
        }
        tracing::info!("time limit passed ahead of the countdown");
        Some(self.expire().await)
    }

    async fn expire(&mut self) -> FinalizeOutcome {
        let outcome = self.complete(FinalizeTrigger::Expiry).await;
        if outcome != FinalizeOutcome::AlreadyFinalized {
            self.collaborators.notifier.notify(
                "Time is up. Your answers have been submitted.",
                Severity::Warning,
            );
        }
        outcome
    }

    fn grade(&self) -> Option<Graded> {
        let attempt = self.attempt.as_ref()?;
        Some(Graded {
            score: evaluate(&attempt.definition, attempt.session.answers()),
            user_id: attempt.user_id,
            quiz_id: attempt.definition.id(),
        })
    }

    async fn complete(&mut self, trigger: FinalizeTrigger) -> FinalizeOutcome {
        let graded = match (self.state, self.grade()) {
            (SessionState::Active, Some(graded)) => graded,
            (state, _) => {
                tracing::debug!(?state, ?trigger, "finalize ignored");
                return FinalizeOutcome::AlreadyFinalized;
            }
        };

        self.state = SessionState::Finalizing;
        self.release();
        self.store.clear().await;
        self.state = SessionState::Cleared;

        let Graded {
            score,
            user_id,
            quiz_id,
        } = graded;
        tracing::info!(
            user_id = %user_id,
            quiz_id = %quiz_id,
            correct = score.correct_count,
            total = score.total_questions,
            percentage = score.percentage,
            passed = score.passed,
            ?trigger,
            "quiz attempt finalized"
        );

        if score.passed {
            if let Err(err) = self
                .collaborators
                .progress
                .mark_complete(user_id, quiz_id)
                .await
            {
                tracing::warn!(error = %err, "could not record quiz completion");
                self.collaborators.notifier.notify(
                    "Your result could not be saved to your progress.",
                    Severity::Error,
                );
            }
        }

        FinalizeOutcome::Completed(AttemptResult { score, trigger })
    }

    // ─── Retry / cancel ────────────────────────────────────────────────────────

    /// Start the same quiz again from scratch with the original time limit.
    /// Only a finished attempt can be retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToRetry` if no attempt was started and
    /// `SessionError::AttemptInProgress` while it is still running.
    pub async fn retry(&mut self) -> Result<StartOutcome, SessionError> {
        let attempt = match (self.state, self.attempt.take()) {
            (SessionState::Cleared, Some(attempt)) => attempt,
            (_, None) => return Err(SessionError::NothingToRetry),
            (state, kept) => {
                self.attempt = kept;
                return Err(SessionError::AttemptInProgress(state));
            }
        };
        self.release();
        self.store.clear().await;
        tracing::info!(slug = attempt.definition.slug(), "retrying quiz");
        self.begin(
            attempt.user_id,
            attempt.definition,
            attempt.default_time_limit_secs,
        )
        .await
    }

    /// Leave the attempt without grading it. The stored record is kept so
    /// the attempt can be resumed later.
    pub fn cancel(&mut self) {
        if self.state == SessionState::Active {
            tracing::info!("quiz session cancelled; record kept for resume");
        }
        self.release();
        self.attempt = None;
        self.state = SessionState::NoSession;
    }

    /// Send the user away from a finished attempt.
    pub fn acknowledge_result(&self) {
        if self.state == SessionState::Cleared {
            self.collaborators
                .router
                .navigate_to(self.settings.fallback_route());
        }
    }

    fn release(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.countdown.stop();
            live.guard.disable();
        }
    }

    // ─── Timer ─────────────────────────────────────────────────────────────────

    /// Wait for the next countdown event. Cancel safe; `None` when no
    /// countdown is running.
    pub async fn wait_timer_event(&mut self) -> Option<CountdownEvent> {
        self.live.as_mut()?.events.recv().await
    }

    /// React to a countdown event: warn on the threshold, finalize on expiry.
    pub async fn handle_timer_event(&mut self, event: CountdownEvent) -> TimerEvent {
        match event {
            CountdownEvent::Tick { remaining_secs } => TimerEvent::Tick { remaining_secs },
            CountdownEvent::Warning { remaining_secs } => {
                self.collaborators.notifier.notify(
                    &format!("Only {} left!", format_remaining(remaining_secs)),
                    Severity::Warning,
                );
                TimerEvent::Warning { remaining_secs }
            }
            CountdownEvent::Expired => TimerEvent::Expired(self.expire().await),
        }
    }

    /// `wait_timer_event` followed by `handle_timer_event`.
    pub async fn next_timer_event(&mut self) -> Option<TimerEvent> {
        let event = self.wait_timer_event().await?;
        Some(self.handle_timer_event(event).await)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}
