pub mod cancel;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod logging;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod segmenter;
pub mod state;
pub mod storage;
pub mod url_model;

pub use cancel::CancellationToken;
pub use controller::{JobController, JobHandle};
pub use error::EngineError;
pub use events::Event;
pub use job::JobDescriptor;
