//! # walkv Storage
//!
//! Append-only log backends for walkv.
//!
//! This crate provides the lowest-level storage abstraction for the
//! engine's write-ahead log. Backends are **opaque byte stores**: they
//! append bytes, read bytes back at an offset, and make appended bytes
//! durable. They have no knowledge of log records or transactions - the
//! engine core owns all format interpretation.
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing and crash simulation
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use walkv_storage::{LogBackend, MemoryBackend};
//!
//! let mut backend = MemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::LogBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
