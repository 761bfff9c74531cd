//! Authenticated client for the forensic case-management REST backend.
//!
//! Every request goes through [`ApiClient`], which reads the session token
//! from an injected [`CredentialStore`] right before dispatch and attaches it
//! as a bearer token. Backend errors reach the caller as [`ApiError`] with
//! status and body intact.

pub mod api;
pub mod config;
pub mod session;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiResponse, Method, MultipartForm, RequestBody, Resource};
pub use config::ClientConfig;
pub use session::{SessionError, SessionManager, TokenClaims};
pub use storage::{AnyStore, CredentialStore, FileStore, KeychainStore, MemoryStore, StoreKind};
