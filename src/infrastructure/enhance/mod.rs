//! Text enhancement adapters

mod http;

pub use http::{Endpoints, HttpEnhancer};
