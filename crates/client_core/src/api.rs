//! Backend boundary: the operations the controllers depend on and their HTTP rendition.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{InvoiceId, MatchId, PurchaseOrderId},
    error::ApiError,
    protocol::{
        ErrorBody, HealthStatus, MatchOutcome, MatchResponse, PendingMatch, PurchaseOrderDetail,
        PurchaseOrderSummary, SyncReport, UploadResult,
    },
};
use tracing::debug;
use url::Url;

/// An invoice document as picked by the user. Nothing about it is validated
/// locally; the backend decides whether it can be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl InvoiceFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_raw()
            .map(str::to_string);
        Self {
            file_name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read invoice file '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invoice".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[async_trait]
pub trait ReconciliationApi: Send + Sync {
    async fn upload_invoice(&self, file: InvoiceFile) -> Result<UploadResult, ApiError>;
    async fn match_invoice(&self, invoice_id: &InvoiceId) -> Result<MatchOutcome, ApiError>;
    async fn list_pending_matches(&self) -> Result<Vec<PendingMatch>, ApiError>;
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrderSummary>, ApiError>;
    async fn approve_match(&self, match_id: &MatchId) -> Result<(), ApiError>;
    async fn purchase_order(
        &self,
        po_id: &PurchaseOrderId,
    ) -> Result<PurchaseOrderDetail, ApiError>;
    async fn sync_purchase_orders(&self) -> Result<SyncReport, ApiError>;
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

pub struct HttpReconciliationApi {
    http: Client,
    base_url: String,
}

impl HttpReconciliationApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/');
        let parsed =
            Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(format!(
                "{base_url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Health lives next to the API mount point rather than under it.
    fn server_root(&self) -> &str {
        self.base_url
            .strip_suffix("/api")
            .unwrap_or(self.base_url.as_str())
    }
}

#[async_trait]
impl ReconciliationApi for HttpReconciliationApi {
    async fn upload_invoice(&self, file: InvoiceFile) -> Result<UploadResult, ApiError> {
        debug!(file_name = %file.file_name, size = file.bytes.len(), "uploading invoice");
        let mut part = multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(mime_type) = file.mime_type.as_deref() {
            part = part.mime_str(mime_type).map_err(transport)?;
        }
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("invoices/upload"))
            .multipart(form)
            .send()
            .await;
        read_json(response).await
    }

    async fn match_invoice(&self, invoice_id: &InvoiceId) -> Result<MatchOutcome, ApiError> {
        debug!(%invoice_id, "requesting invoice match");
        let response = self
            .http
            .post(self.endpoint(&format!("invoices/match/{invoice_id}")))
            .send()
            .await;
        let body: MatchResponse = read_json(response).await?;
        MatchOutcome::try_from(body)
    }

    async fn list_pending_matches(&self) -> Result<Vec<PendingMatch>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("invoices/pending-matches"))
            .send()
            .await;
        read_json(response).await
    }

    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrderSummary>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("purchase-orders/"))
            .send()
            .await;
        read_json(response).await
    }

    async fn approve_match(&self, match_id: &MatchId) -> Result<(), ApiError> {
        debug!(%match_id, "approving match");
        let response = self
            .http
            .post(self.endpoint(&format!("invoices/approve-match/{match_id}")))
            .send()
            .await;
        ensure_success(response).await?;
        Ok(())
    }

    async fn purchase_order(
        &self,
        po_id: &PurchaseOrderId,
    ) -> Result<PurchaseOrderDetail, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&format!("purchase-orders/{po_id}")))
            .send()
            .await;
        read_json(response).await
    }

    async fn sync_purchase_orders(&self) -> Result<SyncReport, ApiError> {
        let response = self
            .http
            .get(self.endpoint("purchase-orders/sync-from-epicor"))
            .send()
            .await;
        read_json(response).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .http
            .get(format!("{}/health", self.server_root()))
            .send()
            .await;
        read_json(response).await
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

async fn ensure_success(response: reqwest::Result<Response>) -> Result<Response, ApiError> {
    let response = response.map_err(transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.detail_text());
    Err(ApiError::from_status(status.as_u16(), detail))
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Result<Response>,
) -> Result<T, ApiError> {
    ensure_success(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
