//! Infrastructure layer: event store, projections, join stores, Postgres.

pub mod catalogue_service;
pub mod command_dispatcher;
pub mod config;
pub mod error;
pub mod event_store;
pub mod join_store;
pub mod postgres;
pub mod projections;
pub mod read_model;
pub mod sql;


pub use catalogue_service::{CatalogueError, CatalogueResult, CatalogueService};
pub use config::{ConfigError, InfraConfig};
pub use error::StoreError;
