// src/services/inventory.rs

//! Backend inventory service.
//!
//! The backend owns the published records. [`HttpInventoryService`] talks to
//! its admin API, a handful of PHP endpoints exchanging JSON, each call
//! authenticated by the admin password.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{BackendConfig, PublishedRecord, RecordId, RegisterReceipt, UploadReceipt};

/// The managed backend holding published records.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Every record currently published.
    async fn list(&self) -> Result<Vec<PublishedRecord>>;

    /// Store attachment bytes under `name`, returning the public locator.
    async fn upload_attachment(&self, bytes: &[u8], name: &str) -> Result<UploadReceipt>;

    /// Create a record pointing at an uploaded attachment.
    async fn register_record(
        &self,
        title: &str,
        url: &str,
        source_ref: &str,
    ) -> Result<RegisterReceipt>;

    async fn delete_record(&self, id: RecordId) -> Result<()>;

    /// Broadcast a message to subscribers.
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Envelope shared by all admin API responses.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    added: Option<bool>,
    #[serde(default)]
    items: Option<Vec<PublishedRecord>>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiResponse {
    fn ensure_ok(self, operation: &str) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            let message = self.error.unwrap_or_else(|| "ok=false".to_string());
            Err(AppError::backend(operation, message))
        }
    }
}

/// Admin API client.
pub struct HttpInventoryService {
    client: Client,
    base_url: String,
    password: String,
}

impl HttpInventoryService {
    pub fn new(config: &BackendConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            password: config.password.clone(),
        }
    }

    fn endpoint(&self, script: &str) -> String {
        format!("{}/{}", self.base_url, script)
    }

    async fn post<T: DeserializeOwned>(&self, script: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(script))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    async fn list(&self) -> Result<Vec<PublishedRecord>> {
        let response: ApiResponse = self
            .client
            .get(self.endpoint("admin_change_list.php"))
            .query(&[("pass", self.password.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.items {
            Some(items) => Ok(items),
            None => Err(AppError::backend(
                "list",
                response
                    .error
                    .unwrap_or_else(|| "response has no items".to_string()),
            )),
        }
    }

    async fn upload_attachment(&self, bytes: &[u8], name: &str) -> Result<UploadReceipt> {
        let body = json!({
            "pass": self.password,
            "data": BASE64.encode(bytes),
            "name": name,
        });
        let response: ApiResponse = self.post("admin_upload_pdf.php", body).await?;
        let response = response.ensure_ok("upload")?;
        let url = response
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::backend("upload", "response has no url"))?;
        Ok(UploadReceipt { url })
    }

    async fn register_record(
        &self,
        title: &str,
        url: &str,
        source_ref: &str,
    ) -> Result<RegisterReceipt> {
        let body = json!({
            "pass": self.password,
            "title": title,
            "url": url,
            "source": source_ref,
        });
        let response: ApiResponse = self.post("admin_change_add.php", body).await?;
        let response = response.ensure_ok("register")?;
        Ok(RegisterReceipt {
            added: response.added.unwrap_or(false),
        })
    }

    async fn delete_record(&self, id: RecordId) -> Result<()> {
        let body = json!({ "pass": self.password, "id": id.0 });
        let response: ApiResponse = self.post("admin_change_delete.php", body).await?;
        response.ensure_ok("delete").map(|_| ())
    }

    async fn notify(&self, text: &str) -> Result<()> {
        let body = json!({ "pass": self.password, "text": text });
        let response: ApiResponse = self.post("admin_broadcast.php", body).await?;
        response.ensure_ok("notify").map(|_| ())
    }
}
