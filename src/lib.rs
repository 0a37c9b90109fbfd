pub mod crossfit;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod fit;
pub mod learners;
pub mod parallel;
pub mod pipeline;
pub mod preprocessing;
pub mod scoring;
pub mod validation;

// Re-export commonly used types at crate root
pub use crossfit::{FitParams, LearnerCrossfit};
pub use data::{Features, Sample};
pub use error::{CrossfitError, CrossfitResult, LearnerError, LearnerResult};
pub use fit::Fittable;
pub use learners::{Learner, LearnerKind, LearnerParams, MajorityClassLearner, MeanLearner, StumpLearner};
pub use parallel::{Backend, ParallelConfig, Parallelizable};
pub use pipeline::{Estimator, LearnerPipeline, Pipeline};
pub use scoring::{Scorer, Scoring};
pub use validation::{BootstrapCV, CrossValidator, KFold, PredefinedSplits, Split, StationaryBootstrapCV};
