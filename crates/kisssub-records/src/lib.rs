//! Kisssub Records
//!
//! The `record` table holds every content entry the client has seen
//! (anime cards, release items, history). Display helpers shape those
//! rows for list and history views.

mod display;
mod error;
mod record;
mod store;

pub use display::{play_target, HistoryTitle, DATA_ERROR_PLACEHOLDER, SEASON_PLACEHOLDER};
pub use error::RecordError;
pub use record::{NewRecord, Record, RecordType};
pub use store::RecordStore;

pub type Result<T> = std::result::Result<T, RecordError>;
