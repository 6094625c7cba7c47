//! Configuration domain module

mod app_config;

pub use app_config::{AppConfig, AudioConfig, DEFAULT_DATA_DIR_NAME, DEFAULT_LOCAL_URL};
