//! Client-side mirror of the tracker: the API seam, the optimistic state cache
//! and the drag-and-drop adapter that drives stage transitions.
//!
//! `PipelineStore` talks to the backend only through `ApplicationApi`, so the
//! same cache runs against the HTTP surface (`HttpApplicationApi`) or directly
//! against an in-process `ApplicationService`.

pub mod drag;
pub mod http;
pub mod store;

use async_trait::async_trait;
use thiserror::Error;

use crate::applications::service::ApplicationService;
use crate::errors::AppError;
use crate::models::application::{
    Communication, CreateCommunicationRequest, CreateJobApplicationRequest, CreateNoteRequest,
    JobApplication, Note, UpdateJobApplicationRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The record is not in the local cache; no request was issued.
    #[error("Job application {0} not found")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base URL {0}")]
    InvalidBaseUrl(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        ClientError::Api {
            status: err.status().as_u16(),
            message: err.public_message(),
        }
    }
}

/// Backend operations the client cache depends on.
#[async_trait]
pub trait ApplicationApi: Send + Sync {
    async fn list(&self) -> Result<Vec<JobApplication>, ClientError>;

    async fn create(
        &self,
        req: CreateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError>;

    async fn update(
        &self,
        id: &str,
        req: UpdateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError>;

    async fn delete(&self, id: &str) -> Result<JobApplication, ClientError>;

    async fn add_note(&self, id: &str, req: CreateNoteRequest) -> Result<Note, ClientError>;

    async fn add_communication(
        &self,
        id: &str,
        req: CreateCommunicationRequest,
    ) -> Result<Communication, ClientError>;
}

#[async_trait]
impl ApplicationApi for ApplicationService {
    async fn list(&self) -> Result<Vec<JobApplication>, ClientError> {
        Ok(ApplicationService::list(self).await)
    }

    async fn create(
        &self,
        req: CreateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        Ok(ApplicationService::create(self, req).await?)
    }

    async fn update(
        &self,
        id: &str,
        req: UpdateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        Ok(ApplicationService::update(self, id, req).await?)
    }

    async fn delete(&self, id: &str) -> Result<JobApplication, ClientError> {
        Ok(ApplicationService::delete(self, id).await?)
    }

    async fn add_note(&self, id: &str, req: CreateNoteRequest) -> Result<Note, ClientError> {
        Ok(self.append_note(id, req).await?)
    }

    async fn add_communication(
        &self,
        id: &str,
        req: CreateCommunicationRequest,
    ) -> Result<Communication, ClientError> {
        Ok(self.append_communication(id, req).await?)
    }
}
