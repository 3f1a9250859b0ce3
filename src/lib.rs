//! # RosterDB
//!
//! A crash-tolerant, single-writer student record store backed by a plain
//! CSV text file:
//! - Atomic full-file replacement (readers never see a torn write)
//! - Cross-process mutual exclusion with stale-lock reclaim
//! - Monotonic ID allocation recomputed from ground truth
//! - Timestamped backup snapshots with retention pruning
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CLI / UI front-end                          │
//! │              (external collaborator)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Record Store                             │
//! │        (per-operation locked transactions)                   │
//! └───────┬──────────────┬──────────────┬───────────────────────┘
//!         │              │              │
//!         ▼              ▼              ▼
//!  ┌────────────┐ ┌────────────┐ ┌────────────┐
//!  │ Table Lock │ │   Codec    │ │   Backup   │
//!  │ (mkdir +   │ │ (RFC-4180) │ │ (snapshot/ │
//!  │  sentinel) │ │            │ │   prune)   │
//!  └────────────┘ └─────┬──────┘ └────────────┘
//!                       │
//!                       ▼
//!               ┌──────────────┐
//!               │Atomic Writer │
//!               │(tmp + rename)│
//!               └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod lock;
pub mod atomic;
pub mod table;
pub mod backup;
pub mod store;
pub mod validate;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RosterError};
pub use config::Config;
pub use backup::{BackupManager, BackupReason};
pub use record::{Record, RecordDraft, RecordPatch};
pub use store::{DeleteConfirmation, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RosterDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
