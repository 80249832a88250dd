//! Core domain logic for HBNB.
//! Entity model, both storage engines and the request use cases live here;
//! transports and binaries only adapt them.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod search;
pub mod service;
pub mod storage;

pub use config::{ConfigError, LoggingConfig, StorageBackend, StorageConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::entity::{Attributes, Entity, EntityError, EntityId};
pub use model::kind::EntityKind;
pub use search::places::{places_search, PlacesSearchQuery};
pub use service::{ApiError, ApiResponse, ApiResult, HbnbService, LinkOutcome, Stats};
pub use storage::{
    open_storage, DbLocation, DbStorage, EntityMap, FileStorage, Storage, StorageError,
    StorageResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
