// src/monitoring.rs
use actix_web::{HttpResponse, web};
use serde::Serialize;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::time::Instant;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::time::{interval, sleep, Duration};

use crate::AppState;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub response_times: Arc<std::sync::Mutex<Vec<u64>>>,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            response_times: Arc::new(std::sync::Mutex::new(Vec::new())),
            started_at: Instant::now(),
        }
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, time_ms: u64) {
        if let Ok(mut times) = self.response_times.lock() {
            times.push(time_ms);
            if times.len() > 1000 {
                times.remove(0);
            }
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    fn avg_response_time(&self) -> f64 {
        match self.response_times.lock() {
            Ok(times) if !times.is_empty() => times.iter().sum::<u64>() as f64 / times.len() as f64,
            _ => 0.0,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_response_time_ms: f64,
    pub database_connections: u32,
}

pub async fn health_check(
    app_state: web::Data<Arc<AppState>>,
    metrics: web::Data<Arc<Metrics>>,
) -> HttpResponse {
    let database_ok = sqlx::query("SELECT 1")
        .fetch_one(&app_state.db_pool)
        .await
        .is_ok();

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: metrics.uptime_seconds(),
    };

    if database_ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub async fn metrics_endpoint(
    app_state: web::Data<Arc<AppState>>,
    metrics: web::Data<Arc<Metrics>>,
) -> HttpResponse {
    let response = MetricsResponse {
        requests_total: metrics.request_count.load(Ordering::Relaxed),
        errors_total: metrics.error_count.load(Ordering::Relaxed),
        avg_response_time_ms: metrics.avg_response_time(),
        database_connections: app_state.db_pool.size(),
    };

    HttpResponse::Ok().json(response)
}

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> actix_web::dev::Transform<S, actix_web::dev::ServiceRequest> for RequestLogger
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> actix_web::dev::Service<actix_web::dev::ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: actix_web::dev::ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let metrics = self.metrics.clone();
        let path = req.path().to_string();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.increment_requests();
            let res = fut.await;
            let elapsed = start_time.elapsed().as_millis() as u64;
            metrics.record_response_time(elapsed);

            match &res {
                Ok(response) if response.status().is_server_error() => {
                    metrics.increment_errors();
                    log::error!("{} -> {} in {} ms", path, response.status(), elapsed);
                }
                Ok(response) if response.status().is_client_error() => {
                    metrics.increment_errors();
                    log::debug!("{} -> {} in {} ms", path, response.status(), elapsed);
                }
                Ok(_) => {}
                // Middleware errors (e.g. rejected bearer tokens) never produce a response here
                Err(_) => metrics.increment_errors(),
            }
            res
        })
    }
}

// ==================== MAINTENANCE ====================

const STATISTICS_RETENTION_DAYS: i64 = 90;

pub fn start_maintenance_tasks(pool: SqlitePool) {
    tokio::spawn(async move {
        prune_statistics_daily(pool).await;
    });
}

/// Drop statistics snapshots of finished invoices once they are older than `days`.
pub async fn prune_statistics(pool: &SqlitePool, days: i64) -> Result<u64, sqlx::Error> {
    let mut total_deleted = 0;

    loop {
        // Delete in chunks of 1000
        let result = sqlx::query(
            r#"DELETE FROM statistics
               WHERE rowid IN (
                   SELECT s.rowid FROM statistics s
                   JOIN invoice_progress p ON p.invoice_number = s.invoice_number
                   WHERE p.status = 'complete'
                   AND s.timestamp < datetime('now', ?)
                   LIMIT 1000
               )"#
        )
        .bind(format!("-{} days", days))
        .execute(pool)
        .await?;

        let count = result.rows_affected();
        total_deleted += count;
        if count < 1000 {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    Ok(total_deleted)
}

async fn prune_statistics_daily(pool: SqlitePool) {
    let mut interval = interval(Duration::from_secs(24 * 3600));

    loop {
        interval.tick().await;
        match prune_statistics(&pool, STATISTICS_RETENTION_DAYS).await {
            Ok(0) => {}
            Ok(deleted) => log::info!("Pruned {} old statistics snapshots", deleted),
            Err(e) => log::error!("Failed to prune statistics: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;
    use actix_web::test::{call_and_read_body_json, try_call_service, TestRequest};

    #[test]
    fn test_response_time_window_is_bounded() {
        let metrics = Metrics::new();
        for i in 0..1100 {
            metrics.record_response_time(i);
        }
        assert_eq!(metrics.response_times.lock().unwrap().len(), 1000);
        assert!(metrics.avg_response_time() > 100.0);
    }

    #[actix_rt::test]
    async fn test_health_and_metrics() {
        let ctx = TestContext::new().await;
        let app = init_app!(ctx);

        let req = TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");

        let req = TestRequest::get().uri("/api/parts").to_request();
        let resp = try_call_service(&app, req).await;
        assert!(resp.map(|r| r.status().is_client_error()).unwrap_or(true));

        let req = TestRequest::get().uri("/health/metrics").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["requests_total"], 3);
        assert_eq!(body["errors_total"], 1);
    }

    #[actix_rt::test]
    async fn test_prune_keeps_recent_and_unfinished() {
        let ctx = TestContext::new().await;
        let pool = &ctx.state.db_pool;
        for (invoice, session, age) in [
            ("INV2600001", "old", "-120 days"),
            ("INV2600001", "new", "-1 days"),
            ("INV2600002", "old", "-120 days"),
        ] {
            sqlx::query(
                r#"INSERT INTO statistics (invoice_number, session_id, part_number, original_quantity,
                   scanned_parts_count, remaining_quantity, total_bin_count, completed_bin_count, timestamp)
                   VALUES (?, ?, '31100M55T04', 8, 8, 0, 2, 2, datetime('now', ?))"#,
            )
            .bind(invoice)
            .bind(session)
            .bind(age)
            .execute(pool)
            .await
            .unwrap();
        }
        sqlx::query(
            r#"INSERT INTO invoice_progress (invoice_number, scanned_quantity, completed_bins, total_bins,
               remaining_quantity, status, updated_at) VALUES ('INV2600001', 8, 2, 2, 0, 'complete', datetime('now'))"#,
        )
        .execute(pool)
        .await
        .unwrap();

        assert_eq!(prune_statistics(pool, 90).await.unwrap(), 1);
        let left: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM statistics")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(left.0, 2);
    }
}
