//! `unitlink-linkage` — unit identity resolution and reservation linkage.
//!
//! Pure engine crate: receives pre-loaded canonical records and source
//! rows, returns resolved draft links plus a run summary. No CLI or
//! storage dependencies; persistence and its constraints (buyer caps,
//! write conflicts) belong to the caller.

pub mod arbiter;
pub mod candidates;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod resolve;
pub mod summary;

pub use config::LinkConfig;
pub use engine::run;
pub use error::LinkError;
pub use model::{DraftLinkRow, LinkInput, LinkResult, SourceRow};
