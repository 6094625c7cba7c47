//! Speech model domain module

mod status;

pub use status::{DownloadProgress, InvalidModelTransition, ModelInfo, ModelLifecycle, ModelStatus};
