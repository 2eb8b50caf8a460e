pub mod machine;
pub mod model;
pub mod snapshot;
mod store;
pub mod validation;

pub use machine::{Advance, CollectionStep};
pub use model::{
    ChatEntry, ChatEntryKind, ContactField, Difficulty, FinalSummary, Question, Session,
    SessionId, SessionStatus, DIFFICULTY_ORDER, OPTION_LABELS, POINTS_PER_QUESTION,
    QUESTION_COUNT,
};
pub use store::SessionStore;
pub use validation::validate_field;
