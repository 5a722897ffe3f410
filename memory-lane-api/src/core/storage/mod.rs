//! Storage abstractions for the Memory Lane API
//!
//! This module defines traits for row storage backends, allowing the API to
//! run against Postgres in production and entirely in memory in tests.
//!
//! ## Available Backends
//!
//! - `memory`: In-memory storage behind a RwLock (default without `database.url`)
//! - `postgres`: Postgres via sqlx, with embedded migrations

mod memory;
mod postgres;
mod traits;

pub use memory::*;
pub use postgres::PgStore;
pub use traits::*;
