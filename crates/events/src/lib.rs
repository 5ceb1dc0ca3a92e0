//! Domain events and the envelopes they travel in.

pub mod envelope;
pub mod event;
pub mod tenant;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use tenant::TenantScoped;
