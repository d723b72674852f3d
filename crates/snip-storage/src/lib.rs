//! Storage backends for the snip URL shortener.
//!
//! Three interchangeable implementations of [`Storage`]:
//! [`InMemoryStorage`] for a single process lifetime, [`FileStorage`] for an
//! append-only NDJSON log and [`PostgresStorage`] for a relational database.

pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;

pub use error::{Result, StorageError};
pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use postgres::{PostgresOptions, PostgresStorage};
pub use snip_core::{BatchRequest, BatchResponse, ShortToken, Storage, UserUrl};
