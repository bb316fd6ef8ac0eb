//! Family Tree API Module
//!
//! HTTP interface of the family tree service: JSON endpoints for persons,
//! families, events, documents, settings, trash and backups, plus an
//! optional password login.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use handlers::ApiState;
pub use models::*;
pub use server::{build_router, ApiServer};
