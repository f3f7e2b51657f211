use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    Handle, PopCount,
    payloads::{
        BatchRequest, ErrorResponse, HandleRequest, HandleResponse, LeaderboardEntry,
        LeaderboardResponse, PopResponse, ResetRequest, ResetResponse, TotalResponse,
    },
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Rejected { status: u16, message: String },
}

/// What a claiming session needs from the backend.
#[async_trait]
pub trait PopApi: Send + Sync {
    async fn register(&self, handle: &Handle) -> Result<HandleResponse, ApiError>;

    async fn total(&self, handle: &Handle) -> Result<u64, ApiError>;

    async fn submit(
        &self,
        handle: &Handle,
        count: PopCount,
        claim_id: Option<Uuid>,
    ) -> Result<PopResponse, ApiError>;
}

#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Single, rate-limited pop straight to the leaderboard.
    pub async fn pop(&self, handle: &Handle) -> Result<PopResponse, ApiError> {
        let request = HandleRequest {
            handle: Some(handle.to_string()),
        };
        let response = self.client.post(self.url("/pop")).json(&request).send().await?;

        read(response).await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let response = self
            .client
            .get(self.url("/leaderboard"))
            .query(&[("limit", limit)])
            .send()
            .await?;

        Ok(read::<LeaderboardResponse>(response).await?.leaderboard)
    }

    pub async fn reset(&self, secret: &str) -> Result<ResetResponse, ApiError> {
        let request = ResetRequest {
            secret: Some(secret.to_string()),
        };
        let response = self
            .client
            .post(self.url("/admin/reset"))
            .json(&request)
            .send()
            .await?;

        read(response).await
    }
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PopApi for HttpApi {
    async fn register(&self, handle: &Handle) -> Result<HandleResponse, ApiError> {
        let request = HandleRequest {
            handle: Some(handle.to_string()),
        };
        let response = self
            .client
            .post(self.url("/register"))
            .json(&request)
            .send()
            .await?;

        read(response).await
    }

    async fn total(&self, handle: &Handle) -> Result<u64, ApiError> {
        let response = self
            .client
            .get(self.url("/me"))
            .query(&[("handle", handle.as_str())])
            .send()
            .await?;

        Ok(read::<TotalResponse>(response).await?.total)
    }

    async fn submit(
        &self,
        handle: &Handle,
        count: PopCount,
        claim_id: Option<Uuid>,
    ) -> Result<PopResponse, ApiError> {
        let request = BatchRequest {
            handle: Some(handle.to_string()),
            count: Some(count.get().into()),
            claim_id,
        };
        let response = self
            .client
            .post(self.url("/pop/batch"))
            .json(&request)
            .send()
            .await?;

        read(response).await
    }
}
