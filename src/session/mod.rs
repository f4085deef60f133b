pub mod forward;
pub mod planner;
pub mod queue;
pub mod resume;

pub use forward::ReviewForwarder;
pub use planner::plan_batch;
pub use queue::{
    Direction, DisplayMode, Outcome, SessionError, SessionObserver, SessionProgress, SessionQueue,
    StudyCard,
};
pub use resume::{ResumeError, ResumeState};
