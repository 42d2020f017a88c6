//! CertPrep API library.
//!
//! The HTTP server behind the CertPrep single-page app: question bank and
//! grading, learner progress, Stripe billing and PDF certificates. Exposed as
//! a library so the CLI and tests can reuse repositories and the router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
