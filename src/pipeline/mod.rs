//! Pipeline stages for URL-to-PNG conversion.
//!
//! Each submodule implements exactly one step, so each is testable alone
//! and the rendering backend can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ render ──▶ package
//! (reqwest)  (engine, pool)  (zip | base64)
//! ```
//!
//! 1. [`fetch`]: download under status, type and size limits; the only stage
//!    with network I/O
//! 2. [`render`]: page-limit check then sequential rasterisation, run on
//!    a bounded blocking pool; uses [`engine`] for the actual PDF work and
//!    [`encode`] for PNG output
//! 3. [`package`]: ZIP archive or inline base64 list
//!
//! [`usage`] samples process memory/CPU around each render pass.

pub mod encode;
pub mod engine;
pub mod fetch;
pub mod package;
pub mod render;
pub mod usage;
