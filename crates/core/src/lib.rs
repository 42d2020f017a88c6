//! CertPrep Core - Shared domain types and rules.
//!
//! This crate provides the types and pure business rules used across all
//! CertPrep components:
//! - `api` - HTTP handlers for the exam-prep SPA, Stripe webhooks and admin reads
//! - `cli` - Command-line tools for migrations and support operations
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Handlers in the `api` crate call into it to validate
//! questions, grade quiz attempts and decide entitlements.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, certifications, statuses and money
//! - [`question`] - Question content validation
//! - [`grading`] - Quiz attempt scoring
//! - [`entitlement`] - Certification access rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod entitlement;
pub mod grading;
pub mod question;
pub mod types;

pub use entitlement::Entitlements;
pub use grading::{AnswerKey, GradedQuestion, GradingError, QuizResult, grade_attempt};
pub use question::{QuestionContent, QuestionError};
pub use types::*;
