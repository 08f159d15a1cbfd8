//! Arogya Mitra core - session-aware client for the Arogya Mitra
//! health-services backend.
//!
//! This crate contains everything that is not user interface: the
//! credential-refreshing API client, session persistence, request and
//! response models, configuration and form validation.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod validation;

pub use api::{ApiError, RequestOptions, SessionClient};
pub use auth::{AuthContext, LoginOutcome, SessionStore, StoreKey};
pub use config::Config;
