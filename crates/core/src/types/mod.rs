//! Core types for CertPrep.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod certification;
pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use certification::{CertificationId, CertificationIdError, QuizKey};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use status::*;
