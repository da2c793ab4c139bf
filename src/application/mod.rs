//! # Application Layer
//!
//! Use cases orchestrating the domain, and the ports (interfaces) they
//! depend on. Concrete adapters live in the connector layer.

pub mod interfaces;
pub mod progress;
pub mod use_cases;

pub use interfaces::*;
pub use progress::{ProgressHub, PROGRESS_CHANNEL_CAPACITY};
pub use use_cases::*;
