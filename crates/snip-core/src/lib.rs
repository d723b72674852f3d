//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the token encoder, the error types and the
//! [`Storage`] contract shared by every backend and by the HTTP gateway.

pub mod encoder;
pub mod error;
pub mod storage;
pub mod token;

pub use error::{CoreError, DecodeError, StorageError};
pub use storage::{BatchRequest, BatchResponse, Storage, UserUrl};
pub use token::ShortToken;
