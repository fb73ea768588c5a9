// src/auth_handlers.rs - Authentication and user management handlers

use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;
use std::sync::Arc;
use chrono::Duration;
use serde::Serialize;

use crate::handlers::ApiResponse;
use crate::auth::{
    AuthService, Capability, CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest,
    User, UserInfo, UserRole, get_current_user, parse_role, require_capability,
};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

// ======== AUTH HANDLERS ========

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let auth_config = &app_state.config.auth;

    // Unknown users get the same answer as wrong passwords
    let mut user = User::find_by_username(&app_state.db_pool, &request.username).await
        .map_err(|_| ApiError::BadRequest("Invalid username or password".to_string()))?;

    if !user.is_active {
        return Err(ApiError::AuthError("Account is disabled".to_string()));
    }

    if user.is_locked() {
        return Err(ApiError::AuthError("Account is temporarily locked. Try again later.".to_string()));
    }

    if !auth_service.verify_password(&request.password, &user.password_hash)
        .map_err(|_| ApiError::InternalServerError("Password verification failed".to_string()))? {

        user.increment_failed_attempts(&app_state.db_pool).await?;

        if user.failed_login_attempts >= auth_config.max_login_attempts {
            user.lock_for_duration(
                &app_state.db_pool,
                Duration::minutes(auth_config.lockout_duration_minutes),
            ).await?;
            log::warn!("User {} locked after {} failed logins", user.username, user.failed_login_attempts);
            return Err(ApiError::AuthError(format!(
                "Account locked due to too many failed attempts. Try again in {} minutes.",
                auth_config.lockout_duration_minutes
            )));
        }

        return Err(ApiError::BadRequest("Invalid username or password".to_string()));
    }

    user.reset_failed_attempts(&app_state.db_pool).await?;
    user.update_last_login(&app_state.db_pool).await?;

    let token = auth_service.generate_token(&user)?;

    let response = LoginResponse {
        token,
        expires_in: auth_service.token_lifetime_secs(),
        user: user.clone().into(),
    };

    log::info!("User {} logged in", user.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

#[derive(Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    user: UserInfo,
    capabilities: Vec<Capability>,
}

pub async fn get_profile(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let user = User::find_by_id(&app_state.db_pool, &claims.sub).await?;
    let capabilities = user.get_role().capabilities();

    Ok(HttpResponse::Ok().json(ApiResponse::success(ProfileResponse {
        user: user.into(),
        capabilities,
    })))
}

#[derive(Serialize)]
struct RoleCapabilities {
    role: UserRole,
    display_name: &'static str,
    capabilities: Vec<Capability>,
}

/// Capabilities of the caller plus the full role matrix.
pub async fn get_capabilities(http_request: HttpRequest) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;

    #[derive(Serialize)]
    struct CapabilitiesResponse {
        role: UserRole,
        capabilities: Vec<Capability>,
        roles: Vec<RoleCapabilities>,
    }

    let roles = UserRole::all_roles()
        .into_iter()
        .map(|role| RoleCapabilities {
            role,
            display_name: role.display_name(),
            capabilities: role.capabilities(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(CapabilitiesResponse {
        role: claims.role,
        capabilities: claims.role.capabilities(),
        roles,
    })))
}

// ======== USER MANAGEMENT (ADMIN) ========

pub async fn get_users(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    require_capability(&http_request, Capability::ManageUsers)?;

    let user_infos: Vec<UserInfo> = User::list(&app_state.db_pool)
        .await?
        .into_iter()
        .map(UserInfo::from)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(user_infos)))
}

pub async fn create_user(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<CreateUserRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::ManageUsers)?;
    request.validate()?;

    let role = match request.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => UserRole::Operator,
    };

    let user = User::create(&app_state.db_pool, request.into_inner(), role, &auth_service).await?;
    log::info!("User {} created with role {} by {}", user.username, role, claims.username);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        UserInfo::from(user),
        "User created successfully".to_string(),
    )))
}

pub async fn update_user(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    path: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = require_capability(&http_request, Capability::ManageUsers)?;
    request.validate()?;
    let user_id = path.into_inner();

    // An admin cannot lock themselves out
    if user_id == claims.sub {
        let demotes = request.role.as_deref()
            .map(|r| parse_role(r).map(|role| role != UserRole::Admin).unwrap_or(true))
            .unwrap_or(false);
        if demotes || request.is_active == Some(false) {
            return Err(ApiError::BadRequest(
                "Cannot demote or deactivate your own account".to_string(),
            ));
        }
    }

    let mut user = User::find_by_id(&app_state.db_pool, &user_id).await?;
    user.update(&app_state.db_pool, request.into_inner(), &auth_service).await?;
    log::info!("User {} updated by {}", user.username, claims.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        UserInfo::from(user),
        "User updated successfully".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer, TestContext, TEST_PASSWORD};
    use actix_web::{http::StatusCode, test};

    fn login_request(username: &str, password: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({ "username": username, "password": password }))
    }

    #[actix_rt::test]
    async fn test_login_returns_token() {
        let ctx = TestContext::new().await;
        ctx.seed_user("dock1", UserRole::Operator).await;
        let app = init_app!(ctx);

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, login_request("dock1", TEST_PASSWORD).to_request()).await;
        assert_eq!(body["success"], true);
        let token = body["data"]["token"].as_str().unwrap();
        let claims = ctx.auth.verify_token(token).unwrap();
        assert_eq!(claims.role, UserRole::Operator);
        assert_eq!(body["data"]["user"]["role"], "operator");
    }

    #[actix_rt::test]
    async fn test_login_locks_after_repeated_failures() {
        let ctx = TestContext::new().await;
        ctx.seed_user("dock1", UserRole::Operator).await;
        let app = init_app!(ctx);

        for _ in 0..4 {
            let resp = test::call_service(&app, login_request("dock1", "Wrong12345").to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        let resp = test::call_service(&app, login_request("dock1", "Wrong12345").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Locked even with the right password
        let resp = test::call_service(&app, login_request("dock1", TEST_PASSWORD).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_profile_lists_capabilities() {
        let ctx = TestContext::new().await;
        let token = ctx.token_for(UserRole::Supervisor).await;
        let app = init_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/auth/profile")
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["role"], "supervisor");
        let caps = body["data"]["capabilities"].as_array().unwrap();
        assert!(caps.contains(&serde_json::json!("manage_invoices")));
        assert!(!caps.contains(&serde_json::json!("manage_users")));

        let req = test::TestRequest::get()
            .uri("/api/auth/capabilities")
            .insert_header(bearer(&token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["roles"].as_array().unwrap().len(), 3);
    }

    #[actix_rt::test]
    async fn test_user_management_requires_admin() {
        let ctx = TestContext::new().await;
        let operator = ctx.token_for(UserRole::Operator).await;
        let admin = ctx.token_for(UserRole::Admin).await;
        let app = init_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/users")
            .insert_header(bearer(&operator))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/users")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({
                "username": "dock2",
                "email": "dock2@example.com",
                "password": "Operator42",
                "role": "supervisor"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/users/{}", id))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "is_active": false }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_active"], false);

        let resp = test::call_service(&app, login_request("dock2", "Operator42").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_duplicate_username_conflicts() {
        let ctx = TestContext::new().await;
        ctx.seed_user("dock1", UserRole::Operator).await;
        let admin = ctx.token_for(UserRole::Admin).await;
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/users")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({
                "username": "dock1",
                "email": "other@example.com",
                "password": "Operator42"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
    }
}
