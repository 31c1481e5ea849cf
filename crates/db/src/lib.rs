//! Persistence layer for courier: SQLite via sqlx, embedded
//! migrations, and one repository per aggregate. Every repository has
//! a SQL implementation and an in-memory fake for tests.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
