//! Shared-ride coordination: drivers publish rides, riders ask to join,
//! drivers accept or reject within seat capacity, and rides move from
//! `Ready` to `Done` while tracking which riders actually showed up.

pub mod config;
pub mod error;
pub mod journal;
pub mod participation;
pub mod ride;
pub mod service;
pub mod state;
pub mod stats;
pub mod store;
pub mod types;
pub mod user;

pub use config::ServiceConfig;
pub use error::{ErrorKind, PersistenceError, RideError};
pub use service::RideService;
pub use store::{MemoryStore, SledStore, StateStore};
pub use types::RideId;
