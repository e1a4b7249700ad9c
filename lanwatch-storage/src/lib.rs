//! # Lanwatch Storage
//!
//! SQLite implementation of [`EventStore`](lanwatch_core::sink::EventStore).
//! One connection behind one mutex; every trait call is a single statement
//! and therefore atomic.

mod schema;
mod store;

pub use store::SqliteStore;
