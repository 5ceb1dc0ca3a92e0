//! Projections (read model builders).
//!
//! Projections fold committed events into query-optimized read models. They
//! are rebuildable from the event store, tenant-isolated, and idempotent under
//! redelivery.

pub mod product_classes;

pub use product_classes::{ProductClassProjection, ProductClassReadModel, ProjectionError};
