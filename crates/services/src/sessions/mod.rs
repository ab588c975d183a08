mod manager;
mod progress;
mod state;

pub use crate::error::SessionError;
pub use manager::SessionManager;
pub use progress::SessionProgress;
pub use state::{
    AttemptResult, FinalizeOutcome, FinalizeTrigger, SessionState, StartOutcome, TimerEvent,
};
