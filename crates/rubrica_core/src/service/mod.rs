//! Contact use-case services.
//!
//! # Responsibility
//! - Validate caller input before it reaches storage.
//! - Keep the CLI decoupled from backend details.

pub mod directory;
pub mod validation;
