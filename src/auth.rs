// src/auth.rs
use bcrypt::{hash, verify};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;
use actix_web::web;
use actix_web::HttpMessage;
use validator::Validate;
use actix_web::{HttpRequest, dev::ServiceRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};

// ======== USER MODEL ========

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

// ======== USER ROLE ========

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Supervisor,
    Operator,
}

/// Everything a role may be allowed to do. Closed set; checked by `require_capability`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ManageParts,
    ManageInvoices,
    Dispatch,
    ViewReports,
}

impl UserRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::Admin => "Administrator",
            UserRole::Supervisor => "Supervisor",
            UserRole::Operator => "Operator",
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageUsers => matches!(self, UserRole::Admin),
            Capability::ManageParts | Capability::ManageInvoices => {
                matches!(self, UserRole::Admin | UserRole::Supervisor)
            }
            Capability::Dispatch | Capability::ViewReports => true,
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::iter().filter(|c| self.can(*c)).collect()
    }

    pub fn all_roles() -> Vec<Self> {
        UserRole::iter().collect()
    }
}

// ======== REQUEST/RESPONSE STRUCTS ========

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        let role = user.get_role();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            is_active: user.is_active,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

// ======== AUTH SERVICE ========

pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_hours: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self::from_config(&AuthConfig {
            jwt_secret: jwt_secret.to_string(),
            ..AuthConfig::default()
        })
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_hours: config.token_expiration_hours,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub fn token_lifetime_secs(&self) -> i64 {
        self.token_hours * 3600
    }

    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        match validate_password_strength(password) {
            Ok(_) => hash(password, self.bcrypt_cost),
            Err(e) => Err(bcrypt::BcryptError::InvalidHash(e.to_string())),
        }
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, hash)
    }

    pub fn generate_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.token_hours);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.get_role(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| ApiError::AuthError("Failed to generate token".to_string()))
    }

    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature =>
                        ApiError::AuthError("Token expired".to_string()),
                    jsonwebtoken::errors::ErrorKind::InvalidToken =>
                        ApiError::AuthError("Invalid token".to_string()),
                    _ =>
                        ApiError::AuthError("Token verification failed".to_string()),
                }
            })
    }
}

// ======== PASSWORD VALIDATION ========

pub fn validate_password_strength(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::ValidationError("Password must be at least 8 characters".to_string()));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::ValidationError("Password must contain at least one uppercase letter".to_string()));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ApiError::ValidationError("Password must contain at least one lowercase letter".to_string()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::ValidationError("Password must contain at least one digit".to_string()));
    }
    Ok(())
}

pub fn parse_role(role: &str) -> ApiResult<UserRole> {
    role.parse::<UserRole>()
        .map_err(|_| ApiError::BadRequest(format!("Unknown role '{}'", role)))
}

// ======== USER METHODS ========

impl User {
    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(|_| ApiError::NotFound("User not found".to_string()))
    }

    pub async fn list(pool: &SqlitePool) -> ApiResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(pool)
            .await?)
    }

    pub async fn create(
        pool: &SqlitePool,
        request: CreateUserRequest,
        role: UserRole,
        auth_service: &AuthService,
    ) -> ApiResult<User> {
        validate_password_strength(&request.password)?;

        let now = Utc::now();
        let password_hash = auth_service.hash_password(&request.password)
            .map_err(|_| ApiError::InternalServerError("Failed to hash password".to_string()))?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: request.username,
            email: request.email,
            password_hash,
            role: role.as_ref().to_string(),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            failed_login_attempts: 0,
            locked_until: None,
        };

        sqlx::query(
            r#"INSERT INTO users (
                id, username, email, password_hash, role, is_active,
                created_at, updated_at, failed_login_attempts, locked_until
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(user.is_active as i32)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.failed_login_attempts)
            .bind(user.locked_until)
            .execute(pool)
            .await
            .map_err(|e| crate::error::conflict_on_unique(e, || {
                ApiError::Conflict("Username or email already exists".to_string())
            }))?;

        Ok(user)
    }

    pub async fn update(
        &mut self,
        pool: &SqlitePool,
        request: UpdateUserRequest,
        auth_service: &AuthService,
    ) -> ApiResult<()> {
        if let Some(email) = request.email {
            self.email = email;
        }
        if let Some(role) = request.role {
            self.role = parse_role(&role)?.as_ref().to_string();
        }
        if let Some(is_active) = request.is_active {
            self.is_active = is_active;
        }
        if let Some(password) = request.password {
            validate_password_strength(&password)?;
            self.password_hash = auth_service.hash_password(&password)
                .map_err(|_| ApiError::InternalServerError("Failed to hash password".to_string()))?;
        }
        self.updated_at = Utc::now();

        sqlx::query(
            "UPDATE users SET email = ?, role = ?, is_active = ?, password_hash = ?, updated_at = ? WHERE id = ?"
        )
            .bind(&self.email)
            .bind(&self.role)
            .bind(self.is_active as i32)
            .bind(&self.password_hash)
            .bind(self.updated_at)
            .bind(&self.id)
            .execute(pool)
            .await
            .map_err(|e| crate::error::conflict_on_unique(e, || {
                ApiError::Conflict("Email already in use".to_string())
            }))?;
        Ok(())
    }

    pub async fn update_last_login(&self, pool: &SqlitePool) -> ApiResult<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    // Methods for lock management
    pub fn is_locked(&self) -> bool {
        if let Some(locked_until) = self.locked_until {
            Utc::now() < locked_until
        } else {
            false
        }
    }

    pub async fn increment_failed_attempts(&mut self, pool: &SqlitePool) -> ApiResult<()> {
        self.failed_login_attempts += 1;
        sqlx::query("UPDATE users SET failed_login_attempts = ? WHERE id = ?")
            .bind(self.failed_login_attempts)
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn lock_for_duration(&mut self, pool: &SqlitePool, duration: Duration) -> ApiResult<()> {
        self.locked_until = Some(Utc::now() + duration);
        sqlx::query("UPDATE users SET locked_until = ? WHERE id = ?")
            .bind(self.locked_until)
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn reset_failed_attempts(&mut self, pool: &SqlitePool) -> ApiResult<()> {
        self.failed_login_attempts = 0;
        self.locked_until = None;
        sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, locked_until = NULL WHERE id = ?"
        )
            .bind(&self.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Unknown role strings degrade to the least privileged role.
    pub fn get_role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Operator)
    }
}

// ======== HELPER FUNCTIONS ========

pub fn get_current_user(req: &HttpRequest) -> ApiResult<Claims> {
    req.extensions()
        .get::<Claims>().cloned()
        .ok_or_else(|| ApiError::Unauthorized("No user information found".to_string()))
}

pub fn check_capability(claims: &Claims, capability: Capability) -> ApiResult<()> {
    if claims.role.can(capability) {
        Ok(())
    } else {
        log::warn!("User {} lacks capability {}", claims.username, capability);
        Err(ApiError::Forbidden("Insufficient permissions".to_string()))
    }
}

pub fn require_capability(req: &HttpRequest, capability: Capability) -> ApiResult<Claims> {
    let claims = get_current_user(req)?;
    check_capability(&claims, capability)?;
    Ok(claims)
}

// ======== JWT MIDDLEWARE ========

pub async fn jwt_middleware(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let token = credentials.token();

    let auth_service = match req.app_data::<web::Data<std::sync::Arc<AuthService>>>() {
        Some(svc) => svc,
        None => {
            log::error!("AuthService not found in app data");
            return Err((
                ApiError::InternalServerError("Auth service not available".to_string()).into(),
                req,
            ));
        }
    };

    match auth_service.verify_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => {
            log::warn!("JWT verification failed: {}", err);
            Err((err.into(), req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        let now = Utc::now();
        User {
            id: "u-1".to_string(),
            username: "dock1".to_string(),
            email: "dock1@example.com".to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            failed_login_attempts: 0,
            locked_until: None,
        }
    }

    #[test]
    fn test_role_capabilities() {
        assert!(UserRole::Admin.can(Capability::ManageUsers));
        assert!(!UserRole::Supervisor.can(Capability::ManageUsers));
        assert!(UserRole::Supervisor.can(Capability::ManageInvoices));
        assert!(!UserRole::Operator.can(Capability::ManageParts));
        assert_eq!(
            UserRole::Operator.capabilities(),
            vec![Capability::Dispatch, Capability::ViewReports]
        );
        assert_eq!(UserRole::Admin.capabilities().len(), 5);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Supervisor".parse::<UserRole>().unwrap(), UserRole::Supervisor);
        assert!(parse_role("viewer").is_err());
        assert_eq!(user("mystery").get_role(), UserRole::Operator);
    }

    #[test]
    fn test_token_round_trip_carries_role() {
        let service = AuthService::new("test_secret_that_is_at_least_32_chars_long");
        let token = service.generate_token(&user("supervisor")).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.username, "dock1");
        assert_eq!(claims.role, UserRole::Supervisor);

        let other = AuthService::new("another_secret_that_is_at_least_32_chars");
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Operator1").is_ok());
        assert!(validate_password_strength("operator1").is_err());
        assert!(validate_password_strength("Short1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
    }
}
