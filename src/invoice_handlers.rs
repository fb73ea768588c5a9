// src/invoice_handlers.rs
//! Invoice master data and per-invoice dispatch progress.

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;
use log::info;

use crate::AppState;
use crate::auth::{require_capability, Capability};
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::models::{CreateInvoiceRequest, Invoice, InvoiceProgress};
use crate::part_handlers::find_part;

// ==================== INVOICES ====================

pub async fn get_invoices(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let (page, per_page, offset) = query.normalize();
    let pattern = query.like_pattern();

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM invoices WHERE invoice_number LIKE ? OR part_number LIKE ?"
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(&app_state.db_pool)
    .await?;

    let invoices: Vec<Invoice> = sqlx::query_as(
        r#"SELECT * FROM invoices
           WHERE invoice_number LIKE ? OR part_number LIKE ?
           ORDER BY created_at DESC
           LIMIT ? OFFSET ?"#
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(&app_state.db_pool)
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        PaginatedResponse::new(invoices, total.0, page, per_page),
    )))
}

pub async fn find_invoice(app_state: &AppState, invoice_number: &str) -> ApiResult<Option<Invoice>> {
    Ok(sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE invoice_number = ?")
        .bind(invoice_number)
        .fetch_optional(&app_state.db_pool)
        .await?)
}

pub async fn get_invoice(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let invoice_number = path.into_inner();
    let invoice = find_invoice(&app_state, &invoice_number)
        .await?
        .ok_or_else(|| ApiError::invoice_not_found(&invoice_number))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(invoice)))
}

pub async fn create_invoice(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateInvoiceRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::ManageInvoices)?;
    request.validate()?;

    let part = find_part(&app_state, &request.part_number).await
        .map_err(|_| ApiError::BadRequest(format!(
            "Unknown part '{}': register it before invoicing",
            request.part_number
        )))?;

    let now = Utc::now();
    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        invoice_number: request.invoice_number.clone(),
        part_number: part.part_number,
        part_name: part.part_name,
        quantity: request.quantity,
        customer: request.customer.clone(),
        created_by: Some(claims.sub.clone()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"INSERT INTO invoices (id, invoice_number, part_number, part_name, quantity, customer, created_by, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&invoice.id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.part_number)
    .bind(&invoice.part_name)
    .bind(invoice.quantity)
    .bind(&invoice.customer)
    .bind(&invoice.created_by)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&app_state.db_pool)
    .await
    .map_err(|e| conflict_on_unique(e, || ApiError::invoice_already_exists(&invoice.invoice_number)))?;

    info!(
        "Created invoice {} for {} x {} by {}",
        invoice.invoice_number, invoice.quantity, invoice.part_number, claims.username
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(invoice)))
}

// ==================== INVOICE PROGRESS ====================

pub async fn save_invoice_progress(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<InvoiceProgress>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_capability(&http_request, Capability::Dispatch)?;
    request.validate()?;
    let progress = request.into_inner();

    if progress.completed_bins > progress.total_bins {
        return Err(ApiError::BadRequest(format!(
            "Completed bins ({}) cannot exceed total bins ({})",
            progress.completed_bins, progress.total_bins
        )));
    }
    if let Some(invoice) = find_invoice(&app_state, &progress.invoice_number).await? {
        if progress.scanned_quantity + progress.remaining_quantity != invoice.quantity {
            return Err(ApiError::BadRequest(format!(
                "Scanned ({}) and remaining ({}) must add up to the invoice quantity ({})",
                progress.scanned_quantity, progress.remaining_quantity, invoice.quantity
            )));
        }
    }

    sqlx::query(
        r#"INSERT INTO invoice_progress
               (invoice_number, scanned_quantity, completed_bins, total_bins, remaining_quantity, status, session_id, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(invoice_number) DO UPDATE SET
               scanned_quantity = excluded.scanned_quantity,
               completed_bins = excluded.completed_bins,
               total_bins = excluded.total_bins,
               remaining_quantity = excluded.remaining_quantity,
               status = excluded.status,
               session_id = excluded.session_id,
               updated_at = excluded.updated_at"#
    )
    .bind(&progress.invoice_number)
    .bind(progress.scanned_quantity)
    .bind(progress.completed_bins)
    .bind(progress.total_bins)
    .bind(progress.remaining_quantity)
    .bind(progress.status)
    .bind(&progress.session_id)
    .bind(progress.updated_at)
    .execute(&app_state.db_pool)
    .await?;

    log::debug!(
        "Invoice {} progress: {} scanned, {}/{} bins ({})",
        progress.invoice_number, progress.scanned_quantity,
        progress.completed_bins, progress.total_bins, progress.status
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success(progress)))
}

pub async fn get_invoice_progress(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let invoice_number = path.into_inner();

    let progress: InvoiceProgress = sqlx::query_as(
        "SELECT * FROM invoice_progress WHERE invoice_number = ?"
    )
    .bind(&invoice_number)
    .fetch_optional(&app_state.db_pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("No progress recorded for invoice '{}'", invoice_number)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(progress)))
}
