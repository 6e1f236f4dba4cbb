pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

pub use config::{Config, FeedTuning};
pub use error::{AppError, FeedError, Result, StoreError};
pub use services::FeedEngine;
