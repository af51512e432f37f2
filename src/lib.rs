//! # EmberKV
//!
//! An embedded key-value store with:
//! - Namespaced buckets
//! - Fixed-TTL expiry with absolute timestamps
//! - Write-Ahead Logging (WAL) for durability and crash recovery
//! - All-or-nothing multi-key transactions
//! - On-demand log compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Adapters (HTTP server, CLI, your app)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Engine                              │
//! │        (one RwLock over index + WAL handle)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │ Store Index │
//!   │  (Append)   │          │ bucket→key  │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  Compactor  │
//!   │  (Merge)    │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use emberkv::{Config, Engine, EmberError, Lookup};
//!
//! let engine = Engine::start(Config::builder().log_path("db.log").build())?;
//!
//! engine.update(|tx| {
//!     tx.set("users", "1", "Alice");
//!     tx.set("users", "2", "Bob");
//!     Ok::<_, EmberError>(())
//! })?;
//!
//! assert_eq!(engine.get("users", "1")?, Lookup::Value("Alice".into()));
//! # Ok::<(), EmberError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod index;
pub mod txn;
pub mod compaction;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmberError, Result};
pub use config::{Config, DurabilityMode, WalSyncStrategy};
pub use engine::Engine;
pub use index::{Entry, Lookup};
pub use txn::Transaction;
pub use compaction::MergeStats;
pub use wal::RecoveryResult;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
