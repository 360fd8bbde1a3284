//! Mailflow API - REST server
//!
//! This crate provides the HTTP surface of Mailflow: session
//! authentication, CRUD handlers for clients, messages, and mailings,
//! the send trigger, and the statistics screen.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
