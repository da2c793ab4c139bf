//! # Domain Layer
//!
//! Core business logic, models, and pure services.
//! This layer is independent of external frameworks and infrastructure.

pub mod error;
pub mod models;
pub mod services;

pub use error::DomainError;
pub use models::*;
pub use services::*;
