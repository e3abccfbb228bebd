//! Camino Quotation API Library
//!
//! Backend for a Camino de Santiago trip-planning site: pilgrims browse a
//! static route catalog and request trip quotations; staff review, price and
//! move those quotations through their lifecycle.
//!
//! # Modules
//!
//! - `app`: HTTP router assembly (rate limiting, body limits, site gate).
//! - `auth`: Caller resolution from bearer tokens and stored roles.
//! - `catalog`: Static route catalog.
//! - `circuit_breaker`: Circuit breaker for the notification channel.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres-backed quotation store.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `lifecycle`: Quotation status machine and lifecycle operations.
//! - `memory_storage`: In-memory quotation store.
//! - `models`: Core data models.
//! - `notification_handler`: In-process `send-quotation-email` endpoint.
//! - `notifications`: Notification hook and its implementations.
//! - `site_gate`: Shared-password site perimeter.
//! - `stages`: Cached route stage reads.
//! - `storage`: Storage trait the lifecycle is written against.
//! - `validation`: Submission validation.

pub mod app;
pub mod auth;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod memory_storage;
pub mod models;
pub mod notification_handler;
pub mod notifications;
pub mod site_gate;
pub mod stages;
pub mod storage;
pub mod validation;
