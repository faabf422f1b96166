//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CONFIG_PATH → config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides, SERVER_PORT etc.)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only `server.*` is consumed by the HTTP core today; database and API
//!   settings are parsed and validated for the pipeline stages

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AppConfig, ConfigDuration, DatabaseConfig, ObservabilityConfig, ServerConfig,
    DEFAULT_REQUEST_TIMEOUT,
};
