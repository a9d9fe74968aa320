//! SQLite-backed persistence for TwinRaven: the append-only `EventStore` and
//! the `CandidateStore` holding the Miner's discovered chains. A
//! schema-on-write approach, unlike a metadata-index layer — events and
//! candidates are the source of truth here, not a pointer into other files.

mod candidate_store;
mod event_store;
mod registry_store;
mod schema;

pub mod error;

pub use candidate_store::CandidateStore;
pub use error::{Error, Result};
pub use event_store::EventStore;
pub use registry_store::RegistryStore;
