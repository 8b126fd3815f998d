//! # iacguard Loader
//!
//! Builds the policy catalog for the iacguard compliance scanner.
//!
//! - [`PolicyLoader`] loads one policy root (provider-first or flat layout)
//! - [`load_with_fallback`] merges the embedded, user-global and
//!   workspace-local tiers, later tiers overriding earlier ones by ID
//! - [`snapshot`] reads and writes pre-computed index snapshots
//!
//! ## Example
//!
//! ```rust,ignore
//! use iacguard_loader::{load_with_fallback, snapshot, LoaderConfig};
//!
//! let config = LoaderConfig::standard(".")
//!     .with_embedded(snapshot::read_snapshot("index.json")?.index);
//! let index = load_with_fallback(&config)?;
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod snapshot;
pub mod tiers;

pub use config::{user_policy_dir, LoaderConfig, POLICY_DIR};
pub use error::{LoaderError, Result};
pub use loader::PolicyLoader;
pub use snapshot::{read_snapshot, write_snapshot, IndexSnapshot};
pub use tiers::load_with_fallback;
