pub mod clock;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod models;
pub mod session;

pub use database::{ReviewStore, SqliteStore};
pub use engine::Scheduler;
pub use error::EngineError;
pub use models::{Item, ReviewRecord, ReviewState};
pub use session::{SessionObserver, SessionQueue};
