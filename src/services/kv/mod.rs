//! Record storage with pluggable backends and sliding expiry.
//!
//! Records are stored under their download key. Supports two backends:
//!
//! - **RedbBackend**: Persistent storage with ACID guarantees (default for the server)
//! - **MemoryBackend**: Fast, non-persistent storage (tests, `--in-memory`)
//!
//! # Example
//!
//! ```ignore
//! use ephemeral_store::services::kv::KvStore;
//! use std::time::Duration;
//!
//! // In-memory (testing)
//! let store = KvStore::memory(Duration::from_secs(60));
//!
//! // Persistent (production)
//! let store = KvStore::file("./data/values.redb", Duration::from_secs(86_400))?;
//! ```

mod backend;
mod memory;
mod redb;
mod store;
mod types;


pub use backend::KvBackend;
pub use memory::MemoryBackend;
pub use self::redb::RedbBackend;
pub use store::KvStore;
