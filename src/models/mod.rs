pub mod item;
pub mod review_record;
pub mod review_request;
pub mod sm2;
pub mod stats;

pub use item::{Collection, Item};
pub use review_record::{ReviewRecord, ReviewState};
pub use review_request::ReviewRequest;
pub use stats::{CollectionProgress, Dashboard, ProgressStats};
