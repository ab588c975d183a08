mod definition;
mod ids;
mod score;
mod session;
mod settings;

pub use ids::{OptionId, ParseIdError, QuestionId, QuizId, UserId};

pub use definition::{
    AnswerOption, DefinitionError, Question, QuestionDraft, QuizDefinition, QuizDefinitionDraft,
};
pub use score::{PASS_THRESHOLD_PERCENT, ScoreResult};
pub use session::{MAX_SESSION_AGE_SECS, QuizSession, QuizSessionError};
pub use settings::{EngineSettings, EngineSettingsDraft, SettingsError};
