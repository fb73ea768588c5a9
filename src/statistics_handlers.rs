// src/statistics_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::auth::{require_capability, Capability};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::{StatisticsQuery, StatisticsSnapshot};

/// One row per invoice and session; a newer snapshot replaces the older one.
pub async fn save_statistics(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<StatisticsSnapshot>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_capability(&http_request, Capability::Dispatch)?;
    request.validate()?;
    let snapshot = request.into_inner();

    if snapshot.scanned_parts_count + snapshot.remaining_quantity != snapshot.original_quantity {
        return Err(ApiError::BadRequest(format!(
            "Scanned ({}) and remaining ({}) must add up to the original quantity ({})",
            snapshot.scanned_parts_count, snapshot.remaining_quantity, snapshot.original_quantity
        )));
    }
    if snapshot.completed_bin_count > snapshot.total_bin_count {
        return Err(ApiError::BadRequest(format!(
            "Completed bins ({}) cannot exceed total bins ({})",
            snapshot.completed_bin_count, snapshot.total_bin_count
        )));
    }

    sqlx::query(
        r#"INSERT INTO statistics
               (invoice_number, session_id, part_number, original_quantity, scanned_parts_count,
                remaining_quantity, total_bin_count, completed_bin_count, current_bin_no,
                current_bin_scanned, current_bin_total, timestamp)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(invoice_number, session_id) DO UPDATE SET
               part_number = excluded.part_number,
               original_quantity = excluded.original_quantity,
               scanned_parts_count = excluded.scanned_parts_count,
               remaining_quantity = excluded.remaining_quantity,
               total_bin_count = excluded.total_bin_count,
               completed_bin_count = excluded.completed_bin_count,
               current_bin_no = excluded.current_bin_no,
               current_bin_scanned = excluded.current_bin_scanned,
               current_bin_total = excluded.current_bin_total,
               timestamp = excluded.timestamp
           WHERE excluded.timestamp >= statistics.timestamp"#
    )
    .bind(&snapshot.invoice_number)
    .bind(&snapshot.session_id)
    .bind(&snapshot.part_number)
    .bind(snapshot.original_quantity)
    .bind(snapshot.scanned_parts_count)
    .bind(snapshot.remaining_quantity)
    .bind(snapshot.total_bin_count)
    .bind(snapshot.completed_bin_count)
    .bind(&snapshot.current_bin_no)
    .bind(snapshot.current_bin_scanned)
    .bind(snapshot.current_bin_total)
    .bind(snapshot.timestamp)
    .execute(&app_state.db_pool)
    .await?;

    log::debug!(
        "Statistics for invoice {} session {}: {}/{}",
        snapshot.invoice_number, snapshot.session_id,
        snapshot.scanned_parts_count, snapshot.original_quantity
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot)))
}

/// The caller's own session if it has a row, otherwise the latest snapshot for the invoice.
pub async fn get_statistics(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<StatisticsQuery>,
) -> ApiResult<HttpResponse> {
    let invoice_number = path.into_inner();

    let mut snapshot: Option<StatisticsSnapshot> = None;
    if let Some(session_id) = &query.session_id {
        snapshot = sqlx::query_as(
            "SELECT * FROM statistics WHERE invoice_number = ? AND session_id = ?"
        )
        .bind(&invoice_number)
        .bind(session_id)
        .fetch_optional(&app_state.db_pool)
        .await?;
    }

    if snapshot.is_none() {
        snapshot = sqlx::query_as(
            "SELECT * FROM statistics WHERE invoice_number = ? ORDER BY timestamp DESC LIMIT 1"
        )
        .bind(&invoice_number)
        .fetch_optional(&app_state.db_pool)
        .await?;
    }

    let snapshot = snapshot.ok_or_else(|| {
        ApiError::NotFound(format!("No statistics recorded for invoice '{}'", invoice_number))
    })?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot)))
}
