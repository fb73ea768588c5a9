// src/scan/remote.rs
//! The scan station's view of the dispatch backend.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{ScanError, ScanResult};
use crate::models::{
    BinRecord, CreateBinRequest, Invoice, InvoiceProgress, ScanProgressUpdate, StatisticsSnapshot,
};

/// Outcome of creating a bin record.
#[derive(Debug, Clone)]
pub enum BinCreation {
    Created(BinRecord),
    /// The backend already had this bin (409).
    AlreadyExists,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn find_invoice(&self, invoice_number: &str) -> ScanResult<Option<Invoice>>;

    async fn find_bin(&self, bin_no: &str) -> ScanResult<Option<BinRecord>>;

    async fn create_bin(&self, request: &CreateBinRequest) -> ScanResult<BinCreation>;

    async fn record_scan_progress(&self, update: &ScanProgressUpdate) -> ScanResult<()>;

    async fn save_statistics(&self, snapshot: &StatisticsSnapshot) -> ScanResult<()>;

    async fn load_statistics(
        &self,
        invoice_number: &str,
        session_id: Option<&str>,
    ) -> ScanResult<Option<StatisticsSnapshot>>;

    async fn save_invoice_progress(&self, progress: &InvoiceProgress) -> ScanResult<()>;

    async fn load_invoice_progress(&self, invoice_number: &str)
        -> ScanResult<Option<InvoiceProgress>>;
}

/// Response envelope used by every backend endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

/// [`RemoteStore`] over the backend's JSON API.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ScanResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Exchange credentials for a bearer token used on every later call.
    pub async fn login(&self, username: &str, password: &str) -> ScanResult<()> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginBody { username, password })
            .send()
            .await?;

        let data: LoginData = Self::read_envelope(response, "POST /auth/login")
            .await?
            .ok_or_else(|| ScanError::network("Login response carried no token"))?;
        self.set_token(Some(data.token));
        log::info!("Scan station authenticated as {}", username);
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: Response,
        call: &str,
    ) -> ScanResult<Option<T>> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiEnvelope<serde_json::Value>>()
                .await
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_default();
            return Err(ScanError::network(format!(
                "{} returned {} {}",
                call, status, detail
            )));
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Err(ScanError::network(format!(
                "{} failed: {}",
                call,
                envelope.message.unwrap_or_default()
            )));
        }
        Ok(envelope.data)
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ScanResult<Option<T>> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_envelope(response, &format!("GET {}", path)).await
    }

    /// POST where a conflict means the write already happened.
    async fn post_idempotent<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ScanResult<()> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        if response.status() == StatusCode::CONFLICT {
            log::debug!("POST {} already recorded", path);
            return Ok(());
        }
        Self::read_envelope::<serde_json::Value>(response, &format!("POST {}", path))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn find_invoice(&self, invoice_number: &str) -> ScanResult<Option<Invoice>> {
        self.get_optional(&format!("/api/invoices/{}", invoice_number), &[])
            .await
    }

    async fn find_bin(&self, bin_no: &str) -> ScanResult<Option<BinRecord>> {
        self.get_optional(&format!("/api/bindata/bin/{}", bin_no), &[])
            .await
    }

    async fn create_bin(&self, request: &CreateBinRequest) -> ScanResult<BinCreation> {
        let response = self
            .request(Method::POST, "/api/bindata/qr")
            .json(request)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(BinCreation::AlreadyExists);
        }
        let record: Option<BinRecord> =
            Self::read_envelope(response, "POST /api/bindata/qr").await?;
        record
            .map(BinCreation::Created)
            .ok_or_else(|| ScanError::network("Bin create response carried no record"))
    }

    async fn record_scan_progress(&self, update: &ScanProgressUpdate) -> ScanResult<()> {
        self.post_idempotent("/api/bindata/scan-progress", update).await
    }

    async fn save_statistics(&self, snapshot: &StatisticsSnapshot) -> ScanResult<()> {
        self.post_idempotent("/api/statistics", snapshot).await
    }

    async fn load_statistics(
        &self,
        invoice_number: &str,
        session_id: Option<&str>,
    ) -> ScanResult<Option<StatisticsSnapshot>> {
        let query: Vec<(&str, &str)> = session_id.map(|id| ("sessionId", id)).into_iter().collect();
        self.get_optional(&format!("/api/statistics/{}", invoice_number), &query)
            .await
    }

    async fn save_invoice_progress(&self, progress: &InvoiceProgress) -> ScanResult<()> {
        self.post_idempotent("/api/invoice-progress", progress).await
    }

    async fn load_invoice_progress(
        &self,
        invoice_number: &str,
    ) -> ScanResult<Option<InvoiceProgress>> {
        self.get_optional(&format!("/api/invoice-progress/{}", invoice_number), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::session::BinStatus;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> HttpRemoteStore {
        HttpRemoteStore::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_token("test-token")
    }

    fn bin_json() -> serde_json::Value {
        json!({
            "id": "b-1",
            "binNo": "1000000000001",
            "invoiceNumber": "INV2600123",
            "partNumber": "31100M55T04",
            "description": "Bracket",
            "quantity": 4,
            "scannedQuantity": 2,
            "status": "processing",
            "createdAt": "2026-10-18T08:00:00Z",
            "updatedAt": "2026-10-18T08:05:00Z"
        })
    }

    #[tokio::test]
    async fn test_find_bin_maps_not_found_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/bindata/bin/1000000000009"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"success": false, "message": "Not Found"})),
            )
            .mount(&server)
            .await;

        let found = store(&server).find_bin("1000000000009").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_bin_sends_bearer_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/bindata/bin/1000000000001"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": bin_json(), "message": null})),
            )
            .mount(&server)
            .await;

        let bin = store(&server).find_bin("1000000000001").await.unwrap().unwrap();
        assert_eq!(bin.scanned_quantity, 2);
        assert_eq!(bin.status, BinStatus::Processing);
        assert!(bin.qr_code_data.is_none());
    }

    #[tokio::test]
    async fn test_create_bin_conflict_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bindata/qr"))
            .and(body_partial_json(json!({"binNumber": "1000000000001"})))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let request = CreateBinRequest {
            qr_code_data: "raw".to_string(),
            invoice_number: "INV2600123".to_string(),
            bin_number: "1000000000001".to_string(),
            part_number: "31100M55T04".to_string(),
            total_quantity: 4,
            description: None,
            session_id: "s-1".to_string(),
            timestamp: Utc::now(),
        };
        let created = store(&server).create_bin(&request).await.unwrap();
        assert!(matches!(created, BinCreation::AlreadyExists));
    }

    #[tokio::test]
    async fn test_write_conflict_is_success_and_server_error_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/invoice-progress"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/bindata/scan-progress"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"success": false, "message": "disk full"})),
            )
            .mount(&server)
            .await;

        let remote = store(&server);
        let progress = InvoiceProgress {
            invoice_number: "INV2600123".to_string(),
            scanned_quantity: 1,
            completed_bins: 0,
            total_bins: 2,
            remaining_quantity: 7,
            status: crate::scan::session::InvoiceStatus::InProgress,
            session_id: None,
            updated_at: Utc::now(),
        };
        assert!(remote.save_invoice_progress(&progress).await.is_ok());

        let update = ScanProgressUpdate {
            bin_no: "1000000000001".to_string(),
            scanned_quantity: 1,
            is_valid: true,
            mismatch_reason: None,
            session_id: "s-1".to_string(),
        };
        let err = remote.record_scan_progress(&update).await.unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_load_statistics_passes_session_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/INV2600123"))
            .and(query_param("sessionId", "s-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "invoiceNumber": "INV2600123",
                    "sessionId": "s-1",
                    "partNumber": "31100M55T04",
                    "originalQuantity": 8,
                    "scannedPartsCount": 4,
                    "remainingQuantity": 4,
                    "totalBinCount": 2,
                    "completedBinCount": 1,
                    "currentBinNo": null,
                    "currentBinScanned": 0,
                    "currentBinTotal": 0,
                    "timestamp": "2026-10-18T08:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let snapshot = store(&server)
            .load_statistics("INV2600123", Some("s-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.scanned_parts_count, 4);
        assert_eq!(snapshot.completed_bin_count, 1);
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"token": "fresh-token", "expires_in": 86400, "user": {}},
                "message": "Login successful"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoice-progress/INV2600123"))
            .and(header("Authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let remote = HttpRemoteStore::new(server.uri(), Duration::from_secs(5)).unwrap();
        remote.login("operator", "Secret123").await.unwrap();
        assert!(remote
            .load_invoice_progress("INV2600123")
            .await
            .unwrap()
            .is_none());
    }
}
