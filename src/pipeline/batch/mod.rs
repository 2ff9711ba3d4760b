//! Scanned-batch processing: the shared document store, the per-document
//! state machine and pipeline, and the sequential batch runner.

pub mod controller;
pub mod error;
pub mod runner;
pub mod save_gate;
pub mod state;
pub mod store;
pub mod types;

pub use controller::*;
pub use error::*;
pub use runner::*;
pub use save_gate::{BakedImages, SaveRejection};
pub use state::{PipelineEvent, TransitionError};
pub use store::*;
pub use types::*;
