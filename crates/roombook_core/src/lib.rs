//! Core domain logic for roombook.
//! This crate is the single source of truth for reservation invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, DatabaseConfig, LoggingConfig, RoombookConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::principal::{Principal, PrincipalId, Role};
pub use model::reservation::{
    IntervalError, Reservation, ReservationId, ReservationStatus, PURPOSE_MAX_CHARS,
};
pub use model::room::{Resource, ResourceId};
pub use repo::principal_repo::{IdentityProvider, SqlitePrincipalDirectory};
pub use repo::reservation_repo::{
    ReservationListQuery, ReservationRepository, SqliteReservationRepository,
};
pub use repo::room_repo::{ResourceDirectory, SqliteRoomDirectory};
pub use repo::{RepoError, RepoResult};
pub use service::reservation_service::{
    CreateReservationRequest, ReservationDetails, ReservationService, ReservationServiceError,
    ReservationServiceResult, UpdateReservationRequest,
};
