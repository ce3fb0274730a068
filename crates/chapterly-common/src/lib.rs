//! Chapterly Common - Shared types and utilities
//!
//! This crate provides the chapter domain types, the error taxonomy, the
//! service configuration and the record validator used across all
//! Chapterly components.

pub mod config;
pub mod error;
pub mod types;
pub mod validation;

pub use config::ServiceConfig;
pub use error::{Error, FieldError, Result};
pub use types::*;
