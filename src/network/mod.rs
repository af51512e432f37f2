//! Network Module
//!
//! Thin HTTP adapter over the engine.
//!
//! ## Routes
//! - `GET /set?bucket=&key=&value=` → 200 / 400 / 500
//! - `GET /get?bucket=&key=` → 200 (value or expiry message) / 400 / 404 / 500
//! - `GET /delete?bucket=&key=` → 200 / 400 / 500
//! - `POST /merge` → 200 / 500
//!
//! The engine is injected as shared state; there is no global handle.

mod handlers;
mod server;

pub use handlers::{router, EXPIRED_MESSAGE};
pub use server::HttpServer;
