// src/bin_handlers.rs
//! Bin lookup, creation from scanned QR labels and per-scan progress.

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;
use log::{info, warn};

use crate::AppState;
use crate::auth::{require_capability, Capability};
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::invoice_handlers::find_invoice;
use crate::models::{BinRecord, CreateBinRequest, ScanProgressUpdate};
use crate::scan::session::BinStatus;

async fn find_bin(app_state: &AppState, bin_no: &str) -> ApiResult<BinRecord> {
    sqlx::query_as::<_, BinRecord>("SELECT * FROM bins WHERE bin_no = ?")
        .bind(bin_no)
        .fetch_optional(&app_state.db_pool)
        .await?
        .ok_or_else(|| ApiError::bin_not_found(bin_no))
}

// ==================== GET BIN ====================

pub async fn get_bin(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let bin = find_bin(&app_state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(bin)))
}

// ==================== CREATE FROM QR ====================

pub async fn create_bin_from_qr(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateBinRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::Dispatch)?;
    request.validate()?;

    let invoice = find_invoice(&app_state, &request.invoice_number)
        .await?
        .ok_or_else(|| ApiError::invoice_not_found(&request.invoice_number))?;
    if invoice.part_number != request.part_number {
        return Err(ApiError::BadRequest(format!(
            "Bin {} holds part {} but invoice {} ships {}",
            request.bin_number, request.part_number, invoice.invoice_number, invoice.part_number
        )));
    }

    let now = Utc::now();
    let bin = BinRecord {
        id: Uuid::new_v4().to_string(),
        bin_no: request.bin_number.clone(),
        invoice_number: request.invoice_number.clone(),
        part_number: request.part_number.clone(),
        description: request.description.clone(),
        quantity: request.total_quantity,
        scanned_quantity: 0,
        status: BinStatus::Processing,
        qr_code_data: Some(request.qr_code_data.clone()),
        session_id: Some(request.session_id.clone()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"INSERT INTO bins (id, bin_no, invoice_number, part_number, description, quantity,
               scanned_quantity, status, qr_code_data, session_id, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&bin.id)
    .bind(&bin.bin_no)
    .bind(&bin.invoice_number)
    .bind(&bin.part_number)
    .bind(&bin.description)
    .bind(bin.quantity)
    .bind(bin.scanned_quantity)
    .bind(bin.status)
    .bind(&bin.qr_code_data)
    .bind(&bin.session_id)
    .bind(bin.created_at)
    .bind(bin.updated_at)
    .execute(&app_state.db_pool)
    .await
    .map_err(|e| conflict_on_unique(e, || ApiError::bin_already_exists(&bin.bin_no)))?;

    info!(
        "Bin {} registered for invoice {} ({} x {}) by {}",
        bin.bin_no, bin.invoice_number, bin.quantity, bin.part_number, claims.username
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(bin)))
}

// ==================== SCAN PROGRESS ====================

/// Appends to the scan log; valid scans also advance the bin's counter.
/// The counter never moves backwards, so late or reordered reports are harmless.
pub async fn record_scan_progress(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<ScanProgressUpdate>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::Dispatch)?;
    request.validate()?;
    let update = request.into_inner();

    let bin = find_bin(&app_state, &update.bin_no).await?;
    if update.is_valid && update.scanned_quantity > bin.quantity {
        return Err(ApiError::bin_quantity_exceeded(&bin.bin_no, bin.quantity, update.scanned_quantity));
    }

    let now = Utc::now();
    let mut tx = app_state.db_pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO scan_progress (bin_no, scanned_quantity, is_valid, mismatch_reason, session_id, recorded_by, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&update.bin_no)
    .bind(update.scanned_quantity)
    .bind(update.is_valid)
    .bind(&update.mismatch_reason)
    .bind(&update.session_id)
    .bind(&claims.sub)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if update.is_valid {
        sqlx::query(
            r#"UPDATE bins SET
                   scanned_quantity = MAX(scanned_quantity, ?1),
                   status = CASE WHEN MAX(scanned_quantity, ?1) >= quantity THEN 'completed' ELSE status END,
                   updated_at = ?2
               WHERE bin_no = ?3"#
        )
        .bind(update.scanned_quantity)
        .bind(now)
        .bind(&update.bin_no)
        .execute(&mut *tx)
        .await?;
    } else {
        warn!(
            "Mismatch reported on bin {} by {}: {}",
            update.bin_no,
            claims.username,
            update.mismatch_reason.as_deref().unwrap_or("no reason given")
        );
    }

    tx.commit().await?;

    let bin = find_bin(&app_state, &update.bin_no).await?;
    if bin.status == BinStatus::Completed && update.is_valid && update.scanned_quantity == bin.quantity {
        info!("Bin {} completed ({}/{})", bin.bin_no, bin.scanned_quantity, bin.quantity);
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(bin)))
}
