//! Mailflow Storage - Database access layer
//!
//! This crate provides the PostgreSQL persistence layer for Mailflow:
//! the connection pool, row models, and repositories.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
