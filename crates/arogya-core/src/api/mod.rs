//! REST API client module for the Arogya Mitra backend.
//!
//! This module provides the `SessionClient` for communicating with the
//! backend's auth, scheme, report and subscription endpoints.
//!
//! The API uses JWT bearer token authentication with a refresh token;
//! expired access tokens are refreshed transparently and the failed
//! request is retried once.

pub mod client;
pub mod endpoints;
pub mod error;
mod resources;
pub mod transport;

pub use client::{RequestOptions, SessionClient};
pub use error::ApiError;
pub use transport::{HttpRequest, HttpResponse, MultipartForm, RequestBody, ReqwestTransport, Transport};
