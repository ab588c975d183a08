use quiz_core::model::ScoreResult;

/// Lifecycle of the attempt driven by `SessionManager`.
///
/// ```text
/// NoSession -> Starting -> Active -> Finalizing -> Cleared
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Starting,
    Active,
    Finalizing,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    /// The user pressed submit. Rejected while questions are unanswered.
    Manual,
    /// The countdown ran out. Always proceeds.
    Expiry,
}

/// A graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptResult {
    pub score: ScoreResult,
    pub trigger: FinalizeTrigger,
}

impl AttemptResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.score.passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Completed(AttemptResult),
    /// Another finalize already won; nothing happened.
    AlreadyFinalized,
}

impl FinalizeOutcome {
    #[must_use]
    pub fn result(&self) -> Option<&AttemptResult> {
        match self {
            FinalizeOutcome::Completed(result) => Some(result),
            FinalizeOutcome::AlreadyFinalized => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    /// An existing record was picked up instead of creating a new one.
    pub resumed: bool,
    pub remaining_secs: u32,
}

/// Countdown event after the manager has reacted to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining_secs: u32 },
    Warning { remaining_secs: u32 },
    Expired(FinalizeOutcome),
}
