pub mod model;
pub mod plan;
pub mod settings;

pub use model::{
    ArtifactRef, Job, JobId, JobKind, JobStatus, Progress, ProgressPhase, SourceDocument,
};
pub use plan::{normalize_plan, ItemRole, SubItemSpec};
pub use settings::{
    Difficulty, FlashcardSettings, GenerationSettings, InfographicSettings, MindMapSettings,
    Orientation, QuizSettings, ReportFormat, ReportSettings, SlideDeckSettings,
};
