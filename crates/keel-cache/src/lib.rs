//! # Keel Cache
//!
//! A small cache capability surface with pluggable backends.
//!
//! ```rust
//! use keel_cache::Cache;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let cache = keel_cache::get("memory").unwrap();
//! cache.set("greeting", json!("hello"), Duration::from_secs(30));
//! assert!(cache.exists("greeting"));
//! ```
//!
//! Backends register under a name with [`register`]; [`get`] returns the
//! one shared instance for that name and [`open`] additionally starts its
//! sweeper.

#![doc(html_root_url = "https://docs.rs/keel-cache/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod error;
mod memory;
mod registry;

pub use cache::{Cache, CacheExt, Item};
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use registry::{backends, get, open, register, MEMORY};
