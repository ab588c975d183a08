#![forbid(unsafe_code)]

pub mod app_services;
pub mod collaborators;
pub mod countdown;
pub mod definitions;
pub mod detector;
pub mod error;
pub mod guard;
pub mod memory;
pub mod sessions;
pub mod store;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use collaborators::{
    Collaborators, Notifier, ProgressRecorder, QuizDefinitionProvider, Router, Severity,
    TracingNotifier,
};
pub use countdown::{Countdown, CountdownEvent, CountdownState};
pub use definitions::JsonDefinitionProvider;
pub use detector::{ActiveSessionDetector, DetectorOutcome};
pub use error::{AppServicesError, CountdownError, ProviderError, SessionError};
pub use guard::{ExitResponse, ExitSignal, ExitSignalSource, NavigationGuard};
pub use sessions::{
    AttemptResult, FinalizeOutcome, FinalizeTrigger, SessionManager, SessionProgress,
    SessionState, StartOutcome, TimerEvent,
};
pub use store::SessionStore;
