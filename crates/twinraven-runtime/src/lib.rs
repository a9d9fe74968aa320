//! Orchestration for the TwinRaven workspace runtime: the `Collector` that
//! turns tool calls into a recorded event chain, the `ToolRegistry` that
//! versions promoted tools and watches them for drift, and the `export`
//! formats used to hand events to the outside world.

pub(crate) mod collector;
pub(crate) mod registry;
pub(crate) mod wrapper;

pub mod error;
pub mod export;

pub use collector::{BufferMode, Collector, ObservationContext};
pub use error::{Error, Result};
pub use registry::{DriftFlag, ToolRegistry};
pub use wrapper::intercept;
