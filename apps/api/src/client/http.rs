use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::client::{ApplicationApi, ClientError};
use crate::models::application::{
    Communication, CreateCommunicationRequest, CreateJobApplicationRequest, CreateNoteRequest,
    DeleteJobApplicationResponse, JobApplication, JobApplicationListResponse, Note,
    UpdateJobApplicationRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Page size used when walking the list endpoint.
const FETCH_PAGE_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// `ApplicationApi` over the tracker's HTTP surface.
#[derive(Clone)]
pub struct HttpApplicationApi {
    client: Client,
    base_url: Url,
}

impl HttpApplicationApi {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        let raw = base_url.as_ref();
        let base_url = Url::parse(raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::InvalidBaseUrl(raw.to_string()))?;
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url,
        })
    }

    /// `{base}/api/job-applications/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "job-applications"])
                .extend(segments);
        }
        url
    }

    /// Decodes a success body, or turns the error envelope into `ClientError::Api`.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ApplicationApi for HttpApplicationApi {
    /// Walks every page so the cache mirrors the full list.
    async fn list(&self) -> Result<Vec<JobApplication>, ClientError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .client
                .get(self.url(&[]))
                .query(&[("page", page), ("limit", FETCH_PAGE_LIMIT)])
                .send()
                .await?;
            let body: JobApplicationListResponse = Self::decode(response).await?;
            let received = body.data.len();
            all.extend(body.data);
            debug!("Fetched page {page}: {received} of {} total", body.total);

            if received == 0 || all.len() >= body.total {
                return Ok(all);
            }
            page += 1;
        }
    }

    async fn create(
        &self,
        req: CreateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        let response = self.client.post(self.url(&[])).json(&req).send().await?;
        Self::decode(response).await
    }

    async fn update(
        &self,
        id: &str,
        req: UpdateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        let response = self
            .client
            .patch(self.url(&[id]))
            .json(&req)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &str) -> Result<JobApplication, ClientError> {
        let response = self
            .client
            .delete(self.url(&[id]))
            .send()
            .await?;
        let body: DeleteJobApplicationResponse = Self::decode(response).await?;
        Ok(body.deleted_job_application)
    }

    async fn add_note(&self, id: &str, req: CreateNoteRequest) -> Result<Note, ClientError> {
        let response = self
            .client
            .post(self.url(&[id, "notes"]))
            .json(&req)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn add_communication(
        &self,
        id: &str,
        req: CreateCommunicationRequest,
    ) -> Result<Communication, ClientError> {
        let response = self
            .client
            .post(self.url(&[id, "communications"]))
            .json(&req)
            .send()
            .await?;
        Self::decode(response).await
    }
}
