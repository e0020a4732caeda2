//! Store services: record storage and the operations built on it.

pub mod data;
pub mod kv;

pub use data::{DataService, KeyPair, Written};
