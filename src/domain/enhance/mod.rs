//! Enhancement domain module

mod mode;
mod provider;

pub use mode::{EnhanceMode, ALL_MODES};
pub use provider::{AiProvider, Credentials, EnhanceSettings};
