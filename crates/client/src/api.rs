//! REST client for the layout persistence and region ACL endpoints.
//!
//! Wraps the HTTP API using [`reqwest`]. Error responses carry a JSON body
//! of the form `{"error": "...", "code": "..."}`; the `error` text is
//! surfaced in [`ClientError::Api`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fieldboard_core::acl::{AclEntry, AclGrant};
use fieldboard_core::group::{Group, GroupPatch};
use fieldboard_core::mutation::LayoutMutation;

use crate::backend::{AclBackend, LayoutBackend, PublishedVersion};
use crate::error::ClientError;

/// HTTP client for one layout API deployment.
#[derive(Debug, Clone)]
pub struct LayoutApiClient {
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl LayoutApiClient {
    /// Create a client for the API at `base_url`, e.g. `http://host:3000`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url: parsed,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ---- layout endpoints ----

    /// `PUT /layout/cards/{id}` with a partial or full card body. The
    /// server creates the card when the id is unknown.
    pub async fn put_card<B>(&self, card_id: &str, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(&["layout", "cards", card_id])?;
        let response = self.request(Method::PUT, url).json(body).send().await?;
        Self::check_status(response).await
    }

    /// `POST /layout/groups`. The server creates the group or replaces an
    /// existing one with the same id.
    pub async fn create_group(&self, group: &Group) -> Result<(), ClientError> {
        let url = self.url(&["layout", "groups"])?;
        let response = self.request(Method::POST, url).json(group).send().await?;
        Self::check_status(response).await
    }

    /// `PATCH /layout/groups/{id}`.
    pub async fn update_group(&self, group_id: &str, patch: &GroupPatch) -> Result<(), ClientError> {
        let url = self.url(&["layout", "groups", group_id])?;
        let response = self.request(Method::PATCH, url).json(patch).send().await?;
        Self::check_status(response).await
    }

    /// `DELETE /layout/groups/{id}?cascade=<bool>`.
    pub async fn delete_group(&self, group_id: &str, cascade: bool) -> Result<(), ClientError> {
        let url = self.url(&["layout", "groups", group_id])?;
        let response = self
            .request(Method::DELETE, url)
            .query(&[("cascade", cascade)])
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Ensure the response has a success status code, turning an error
    /// body into [`ClientError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl LayoutBackend for LayoutApiClient {
    async fn apply(&self, mutation: &LayoutMutation) -> Result<(), ClientError> {
        tracing::debug!(
            kind = mutation.kind().as_str(),
            resource = %mutation.resource(),
            "Sending layout mutation"
        );
        match mutation {
            LayoutMutation::SetCardPosition { card_id, x, y } => {
                self.put_card(card_id, &serde_json::json!({ "x": x, "y": y }))
                    .await
            }
            LayoutMutation::SetCardSize {
                card_id,
                width,
                height,
            } => {
                self.put_card(card_id, &serde_json::json!({ "width": width, "height": height }))
                    .await
            }
            LayoutMutation::SetCardMinimized { card_id, minimized } => {
                self.put_card(card_id, &serde_json::json!({ "minimized": minimized }))
                    .await
            }
            LayoutMutation::PutCard { card } => self.put_card(&card.id, card).await,
            LayoutMutation::CreateGroup { group } => self.create_group(group).await,
            LayoutMutation::UpdateGroup { group_id, patch } => {
                self.update_group(group_id, patch).await
            }
            LayoutMutation::DeleteGroup { group_id, cascade } => {
                self.delete_group(group_id, *cascade).await
            }
        }
    }

    async fn publish_version(
        &self,
        version_id: Uuid,
        notes: Option<&str>,
    ) -> Result<PublishedVersion, ClientError> {
        let id = version_id.to_string();
        let url = self.url(&["layout", "versions", id.as_str(), "publish"])?;
        let response = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "notes": notes }))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn health(&self) -> Result<(), ClientError> {
        let url = self.url(&["health"])?;
        let response = self.request(Method::GET, url).send().await?;
        Self::check_status(response).await
    }
}

#[async_trait]
impl AclBackend for LayoutApiClient {
    async fn get_acl(&self, region_id: &str) -> Result<Vec<AclEntry>, ClientError> {
        let url = self.url(&["regions", region_id, "acl"])?;
        let response = self.request(Method::GET, url).send().await?;
        Self::parse_response(response).await
    }

    async fn put_acl(&self, region_id: &str, grant: &AclGrant) -> Result<AclEntry, ClientError> {
        let url = self.url(&["regions", region_id, "acl"])?;
        let response = self.request(Method::PUT, url).json(grant).send().await?;
        Self::parse_response(response).await
    }

    async fn delete_acl(&self, region_id: &str, acl_id: &str) -> Result<(), ClientError> {
        let url = self.url(&["regions", region_id, "acl", acl_id])?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check_status(response).await
    }
}
