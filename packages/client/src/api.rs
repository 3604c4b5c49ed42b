//! HTTP collaborator: the portal's REST API.
//!
//! Only the calls the messaging core depends on. Failures leave client state
//! untouched; callers decide whether to surface them.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::domain::User;
use crate::error::ClientError;

/// One entry of the persisted notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Users whose name matches `term`; an empty term returns the roster.
    async fn search_users(&self, term: &str) -> Result<Vec<User>, ClientError>;

    /// Server-computed unread counts per sender.
    async fn unread_counts(&self, user_id: &str) -> Result<HashMap<String, u32>, ClientError>;

    async fn notifications(&self, user_id: &str, limit: usize) -> Result<NotificationFeed, ClientError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError>;

    async fn delete_notification(&self, notification_id: &str) -> Result<(), ClientError>;

    /// Upload an attachment and return its public URL.
    async fn upload_file(&self, upload: FileUpload) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpPortalApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPortalApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map non-2xx responses to [`ClientError::Api`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn search_users(&self, term: &str) -> Result<Vec<User>, ClientError> {
        let response = self
            .client
            .get(self.url("/users"))
            .query(&[("search", term)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn unread_counts(&self, user_id: &str) -> Result<HashMap<String, u32>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/chat/unread-counts/{user_id}")))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn notifications(&self, user_id: &str, limit: usize) -> Result<NotificationFeed, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/notifications/{user_id}")))
            .query(&[("limit", limit)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .patch(self.url(&format!("/notifications/{notification_id}/read")))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/notifications/{notification_id}")))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<String, ClientError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let response = self
            .client
            .post(self.url("/chat/upload"))
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let body: UploadResponse = check(response).await?.json().await?;
        Ok(body.file_url)
    }
}
