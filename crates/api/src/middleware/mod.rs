//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request, recorded on the trace span)
//! 4. Security headers
//! 5. CORS (SPA origin only)
//!
//! Authentication is per handler via the [`RequireUser`] and [`RequireAdmin`]
//! extractors.

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{CurrentUser, RequireAdmin, RequireUser};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
