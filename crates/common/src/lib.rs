pub mod config;
pub mod error;
pub mod logger;

// Re-export commonly used types
pub use config::{AppConfig, BACKEND_OVERRIDE_ENV};
pub use error::VecRouteError;
pub type Result<T> = std::result::Result<T, VecRouteError>;
