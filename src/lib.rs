//! Business-Insights Gateway Library
//!
//! This library provides the core functionality for the insights gateway:
//! proxying the Syntage business-insights API behind a durable TTL cache,
//! authenticating callers via Firebase ID tokens, and normalizing raw
//! financial/credit-bureau payloads into the evaluation schema consumed by
//! the downstream risk model.
//!
//! # Modules
//!
//! - `auth`: Bearer-token verification middleware and key caching.
//! - `bureau`: Credit-history mapping over bureau report trees.
//! - `cache`: Durable file-backed TTL cache.
//! - `circuit_breaker`: Circuit breaker for upstream calls.
//! - `coerce`: Shared numeric/date coercion helpers.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `mapping`: Normalization engine (fin/ch/comp/geo).
//! - `models`: Evaluation document models.
//! - `router`: Route table and middleware stack.
//! - `services`: Syntage API client.

pub mod auth;
pub mod bureau;
pub mod cache;
pub mod circuit_breaker;
pub mod coerce;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod mapping;
pub mod models;
pub mod router;
pub mod services;
