//! Typed paths and CRUD helpers for the backend's resource collections.
//!
//! Each collection supports the standard verbs on its root path plus a
//! `/:id` sub-resource. Payloads stay opaque JSON.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use super::client::ApiClient;
use super::error::ApiError;
use super::transport::Transport;
use super::types::{Method, MultipartForm, RequestBody};
use crate::storage::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cases,
    Victims,
    Users,
    Evidences,
    DentalRecords,
    Reports,
    GenRecords,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Cases,
        Resource::Victims,
        Resource::Users,
        Resource::Evidences,
        Resource::DentalRecords,
        Resource::Reports,
        Resource::GenRecords,
    ];

    /// Collection route on the backend.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Cases => "/api/cases",
            Resource::Victims => "/api/victims",
            Resource::Users => "/api/users",
            Resource::Evidences => "/api/evidences",
            Resource::DentalRecords => "/api/dentalRecord",
            Resource::Reports => "/api/reports",
            Resource::GenRecords => "/api/genRecord",
        }
    }

    /// Route of a single item. The id is percent-encoded.
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path(), urlencoding::encode(id))
    }

    /// Short name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Cases => "cases",
            Resource::Victims => "victims",
            Resource::Users => "users",
            Resource::Evidences => "evidences",
            Resource::DentalRecords => "dental-records",
            Resource::Reports => "reports",
            Resource::GenRecords => "gen-records",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = String;

    /// Accepts the short name or the last segment of the route, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('/').to_ascii_lowercase();
        Resource::ALL
            .into_iter()
            .find(|r| {
                let segment = r.path().rsplit('/').next().unwrap_or_default();
                r.name() == wanted || segment.to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| {
                let known: Vec<&str> = Resource::ALL.iter().map(|r| r.name()).collect();
                format!("unknown resource '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// CRUD handle for one collection, borrowed from an [`ApiClient`].
pub struct Resources<'a, S, T> {
    client: &'a ApiClient<S, T>,
    resource: Resource,
}

impl<S: CredentialStore, T: Transport> ApiClient<S, T> {
    pub fn resource(&self, resource: Resource) -> Resources<'_, S, T> {
        Resources {
            client: self,
            resource,
        }
    }
}

impl<S: CredentialStore, T: Transport> Resources<'_, S, T> {
    pub async fn list(&self) -> Result<Value, ApiError> {
        Ok(self.client.get(self.resource.path()).await?.into_body())
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        Ok(self.client.get(&self.resource.item_path(id)).await?.into_body())
    }

    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value, ApiError> {
        Ok(self.client.post(self.resource.path(), body).await?.into_body())
    }

    /// Full replacement (PUT).
    pub async fn update<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<Value, ApiError> {
        Ok(self
            .client
            .put(&self.resource.item_path(id), body)
            .await?
            .into_body())
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<Value, ApiError> {
        Ok(self
            .client
            .patch(&self.resource.item_path(id), body)
            .await?
            .into_body())
    }

    pub async fn delete(&self, id: &str) -> Result<Value, ApiError> {
        Ok(self
            .client
            .delete(&self.resource.item_path(id))
            .await?
            .into_body())
    }

    /// Create an item from a file-bearing form (e.g. evidence with photos).
    pub async fn create_multipart(&self, form: MultipartForm) -> Result<Value, ApiError> {
        let resp = self
            .client
            .request(
                Method::Post,
                self.resource.path(),
                Some(RequestBody::Multipart(form)),
                None,
            )
            .await?;
        Ok(resp.into_body())
    }
}
