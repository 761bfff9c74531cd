//! API client module for the case-management backend.
//!
//! Provides the authenticated HTTP client, its transport seam, the error
//! shape every call surfaces, and typed helpers for the resource routes.

pub mod client;
pub mod error;
pub mod resources;
pub mod transport;
pub mod types;

pub use client::{ApiClient, DEFAULT_TOKEN_KEY};
pub use error::ApiError;
pub use resources::{Resource, Resources};
pub use transport::{OutgoingRequest, RawResponse, ReqwestTransport, Transport, TransportError};
pub use types::{ApiRequest, ApiResponse, FormPart, Method, MultipartForm, RequestBody};
