//! Parsing and caching of tor's reference manual.
//!
//! This crate turns the man-page output of `man tor` into a structured
//! [`Manual`] value, overlays curated metadata on it, and persists it through
//! two interchangeable backends (a flat key-value text format and a
//! relational database) with an ad-hoc [`query`] interface over the latter.
//! A fresh copy of the manual can be fetched and rendered through
//! [`download_man_page`].
//!
//! # Example
//!
//! ```
//! use torman_core::{Manual, is_important};
//!
//! let manual = Manual::from_man_output("NAME\n    tor - The onion router\n");
//! assert_eq!("tor - The onion router", manual.name);
//!
//! assert!(is_important("ExitPolicy"));
//! assert!(!is_important("ConstrainedSockSize"));
//! ```

/// Fetching and rendering fresh man-page text.
pub mod bridge;
/// Curated summaries and importance data.
pub mod curated;
/// Relational persistence backend and query access.
pub mod database;
/// Error types and handling.
pub mod error;
/// Man-page text parsing.
pub mod parser;
/// Backend-dispatching persistence.
pub mod storage;
/// The manual document model.
pub mod types;

pub use bridge::{
    A2xRenderer, DEFAULT_MANUAL_URL, DownloadRequest, ManRenderer, ManualSource,
    download_man_page,
};
pub use curated::{Importance, Summaries, is_important};
pub use database::{QueryRows, default_database_path, query};
pub use error::{Error, Result};
pub use parser::ManParser;
pub use storage::{load, save};
pub use types::{Category, ConfigOption, Manual};
