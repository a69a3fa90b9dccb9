//! Local HTTP bridge for the presentation layer.
//!
//! The UI talks to the library and the community catalog exclusively through
//! this loopback API. Every handler awaits its own future, so any number of
//! requests can be in flight concurrently, including several against the same
//! catalog endpoint.

pub mod bridge;

pub use bridge::{router, AppState};
