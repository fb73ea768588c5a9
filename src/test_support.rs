// src/test_support.rs
//! Shared fixtures for handler tests: in-memory database, seeded users and an app builder.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthService, CreateUserRequest, User, UserRole};
use crate::config::Config;
use crate::monitoring::Metrics;
use crate::AppState;

/// Builds the full route tree over a [`TestContext`] and initialises it as a test service.
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(crate::monitoring::RequestLogger::new($ctx.metrics.clone()))
                .app_data(actix_web::web::Data::new($ctx.state.clone()))
                .app_data(actix_web::web::Data::new($ctx.auth.clone()))
                .app_data(actix_web::web::Data::new($ctx.metrics.clone()))
                .configure(crate::routes::configure),
        )
        .await
    };
}

pub struct TestContext {
    pub state: Arc<AppState>,
    pub auth: Arc<AuthService>,
    pub metrics: Arc<Metrics>,
}

pub const TEST_PASSWORD: &str = "Dispatch123";

impl TestContext {
    pub async fn new() -> Self {
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        let auth = Arc::new(AuthService::from_config(&config.auth));
        let state = Arc::new(AppState {
            db_pool: crate::db::test_pool().await,
            config,
        });
        Self {
            state,
            auth,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub async fn seed_user(&self, username: &str, role: UserRole) -> User {
        let request = CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: TEST_PASSWORD.to_string(),
            role: None,
        };
        User::create(&self.state.db_pool, request, role, &self.auth)
            .await
            .expect("seed user")
    }

    /// Token for a fresh user holding `role`.
    pub async fn token_for(&self, role: UserRole) -> String {
        let username = format!("{}-{}", role, &Uuid::new_v4().simple().to_string()[..8]);
        let user = self.seed_user(&username, role).await;
        self.auth.generate_token(&user).expect("token")
    }

    pub async fn seed_part(&self, part_number: &str) {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO parts (id, part_number, part_name, created_at, updated_at) VALUES (?, ?, 'Bracket', ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(part_number)
        .bind(now)
        .bind(now)
        .execute(&self.state.db_pool)
        .await
        .expect("seed part");
    }

    pub async fn seed_invoice(&self, invoice_number: &str, part_number: &str, quantity: u32) {
        self.seed_part(part_number).await;
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO invoices (id, invoice_number, part_number, part_name, quantity, created_at, updated_at)
               VALUES (?, ?, ?, 'Bracket', ?, ?, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(invoice_number)
        .bind(part_number)
        .bind(quantity)
        .bind(now)
        .bind(now)
        .execute(&self.state.db_pool)
        .await
        .expect("seed invoice");
    }

    pub async fn seed_bin(&self, bin_no: &str, invoice_number: &str, part_number: &str, quantity: u32) {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO bins (id, bin_no, invoice_number, part_number, quantity, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(bin_no)
        .bind(invoice_number)
        .bind(part_number)
        .bind(quantity)
        .bind(now)
        .bind(now)
        .execute(&self.state.db_pool)
        .await
        .expect("seed bin");
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
