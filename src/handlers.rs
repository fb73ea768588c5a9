// src/handlers.rs
use actix_web::{web, HttpResponse, HttpRequest};
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use crate::AppState;
use crate::auth::{require_capability, Capability};
use crate::error::ApiResult;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        Self {
            data,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

impl PaginationQuery {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }

    /// `%term%` for LIKE filters, `%` when no search was given.
    pub fn like_pattern(&self) -> String {
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => format!("%{}%", term),
            _ => "%".to_string(),
        }
    }
}

// ==================== DASHBOARD ====================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_invoices: i64,
    pub invoices_in_progress: i64,
    pub invoices_complete: i64,
    pub open_bins: i64,
    pub scans_today: i64,
    pub mismatches_today: i64,
}

pub async fn get_dashboard_stats(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_capability(&http_request, Capability::ViewReports)?;
    let pool = &app_state.db_pool;

    let total_invoices: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invoices")
        .fetch_one(pool)
        .await?;

    let invoices_in_progress: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invoice_progress WHERE status = 'in_progress'"
    )
        .fetch_one(pool)
        .await?;

    let invoices_complete: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invoice_progress WHERE status = 'complete'"
    )
        .fetch_one(pool)
        .await?;

    let open_bins: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bins WHERE status = 'processing'")
        .fetch_one(pool)
        .await?;

    let scans_today: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM scan_progress WHERE is_valid = 1 AND date(created_at) = date('now')"
    )
        .fetch_one(pool)
        .await?;

    let mismatches_today: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM scan_progress WHERE is_valid = 0 AND date(created_at) = date('now')"
    )
        .fetch_one(pool)
        .await?;

    let stats = DashboardStats {
        total_invoices: total_invoices.0,
        invoices_in_progress: invoices_in_progress.0,
        invoices_complete: invoices_complete.0,
        open_bins: open_bins.0,
        scans_today: scans_today.0,
        mismatches_today: mismatches_today.0,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}
