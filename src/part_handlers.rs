// src/part_handlers.rs
//! Part master data.

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
use crate::models::{CreatePartRequest, Part};

// ==================== LIST PARTS ====================

pub async fn get_parts(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<PaginationQuery>,
) -> ApiResult<HttpResponse> {
    let (page, per_page, offset) = query.normalize();
    let pattern = query.like_pattern();

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM parts WHERE part_number LIKE ? OR part_name LIKE ?"
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(&app_state.db_pool)
    .await?;

    let parts: Vec<Part> = sqlx::query_as(
        r#"SELECT * FROM parts
           WHERE part_number LIKE ? OR part_name LIKE ?
           ORDER BY part_number ASC
           LIMIT ? OFFSET ?"#
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(&app_state.db_pool)
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        PaginatedResponse::new(parts, total.0, page, per_page),
    )))
}

// ==================== GET PART ====================

pub async fn find_part(app_state: &AppState, part_number: &str) -> ApiResult<Part> {
    sqlx::query_as::<_, Part>("SELECT * FROM parts WHERE part_number = ?")
        .bind(part_number)
        .fetch_optional(&app_state.db_pool)
        .await?
        .ok_or_else(|| ApiError::part_not_found(part_number))
}

pub async fn get_part(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let part = find_part(&app_state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(part)))
}

// ==================== CREATE PART ====================

pub async fn create_part(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreatePartRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::ManageParts)?;
    request.validate()?;

    let now = Utc::now();
    let part = Part {
        id: Uuid::new_v4().to_string(),
        part_number: request.part_number.clone(),
        part_name: request.part_name.trim().to_string(),
        description: request.description.clone(),
        created_by: Some(claims.sub.clone()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"INSERT INTO parts (id, part_number, part_name, description, created_by, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&part.id)
    .bind(&part.part_number)
    .bind(&part.part_name)
    .bind(&part.description)
    .bind(&part.created_by)
    .bind(part.created_at)
    .bind(part.updated_at)
    .execute(&app_state.db_pool)
    .await
    .map_err(|e| conflict_on_unique(e, || ApiError::part_already_exists(&part.part_number)))?;

    info!("Created part {} by {}", part.part_number, claims.username);
    Ok(HttpResponse::Created().json(ApiResponse::success(part)))
}
