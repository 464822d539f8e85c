//! SQLite persistence.
//!
//! `init_db` opens the pool and applies `schema.sql`; `Repository` and the
//! per-concern statement modules under `repo` do everything else. Money is
//! stored as canonical decimal text and times as epoch milliseconds.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
