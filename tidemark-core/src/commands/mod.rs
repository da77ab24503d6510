//! Command handlers: migrate:status, migrate, migrate:rollback, migrate:reset,
//! make:migration, plus the table that names them.
//!
//! Each handler resolves nothing itself; it receives the engine for an
//! already resolved connection and reports through a [`crate::console::Console`].

pub mod make;
pub mod migrate;
pub mod registry;
pub mod reset;
pub mod rollback;
pub mod status;
