//! Stride lead dashboard service.
//!
//! A public intake endpoint that stores leads submitted from the marketing
//! site, plus session-gated pages and a JSON API for operators to list,
//! filter, update and delete them.
//!
//! # Modules
//!
//! - `auth`: Auth provider client (password sign-in, session lookup, sign-out).
//! - `board`: Operator's local lead view with optimistic updates and rollback.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: Shared state, health check and the internal JSON API.
//! - `ingest`: Public lead intake endpoint.
//! - `lead_store`: Lead persistence (Postgres and in-memory).
//! - `models`: Lead data model, filters and stats.
//! - `pages`: Server-rendered operator pages.
//! - `routes`: Router assembly.
//! - `session`: Session gate middleware and cookie helpers.

pub mod auth;
pub mod board;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod ingest;
pub mod lead_store;
pub mod models;
pub mod pages;
pub mod routes;
pub mod session;
