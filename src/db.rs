// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE CHECK(length(username) >= 3 AND length(username) <= 50),
            email TEXT NOT NULL UNIQUE CHECK(length(email) >= 5 AND length(email) <= 255),
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'operator' CHECK(
                role IN ('admin', 'supervisor', 'operator')
            ),
            is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
            last_login DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== MASTER DATA ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parts (
            id TEXT PRIMARY KEY,
            part_number TEXT NOT NULL UNIQUE CHECK(length(part_number) = 11),
            part_name TEXT NOT NULL CHECK(length(part_name) > 0 AND length(part_name) <= 255),
            description TEXT CHECK(description IS NULL OR length(description) <= 1000),
            created_by TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (created_by) REFERENCES users (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            invoice_number TEXT NOT NULL UNIQUE CHECK(length(invoice_number) = 10),
            part_number TEXT NOT NULL,
            part_name TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity >= 1),
            customer TEXT CHECK(customer IS NULL OR length(customer) <= 255),
            created_by TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (part_number) REFERENCES parts (part_number),
            FOREIGN KEY (created_by) REFERENCES users (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== BIN DATA ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bins (
            id TEXT PRIMARY KEY,
            bin_no TEXT NOT NULL UNIQUE CHECK(length(bin_no) = 13),
            invoice_number TEXT NOT NULL,
            part_number TEXT NOT NULL,
            description TEXT,
            quantity INTEGER NOT NULL CHECK(quantity >= 1),
            scanned_quantity INTEGER NOT NULL DEFAULT 0 CHECK(scanned_quantity >= 0),
            status TEXT NOT NULL DEFAULT 'processing' CHECK(
                status IN ('processing', 'completed')
            ),
            qr_code_data TEXT,
            session_id TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            CHECK(scanned_quantity <= quantity),
            FOREIGN KEY (invoice_number) REFERENCES invoices (invoice_number)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Append-only log of per-scan reports
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bin_no TEXT NOT NULL,
            scanned_quantity INTEGER NOT NULL CHECK(scanned_quantity >= 0),
            is_valid INTEGER NOT NULL CHECK(is_valid IN (0, 1)),
            mismatch_reason TEXT,
            session_id TEXT NOT NULL,
            recorded_by TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (bin_no) REFERENCES bins (bin_no)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== PROGRESS ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statistics (
            invoice_number TEXT NOT NULL,
            session_id TEXT NOT NULL,
            part_number TEXT NOT NULL,
            original_quantity INTEGER NOT NULL,
            scanned_parts_count INTEGER NOT NULL,
            remaining_quantity INTEGER NOT NULL,
            total_bin_count INTEGER NOT NULL,
            completed_bin_count INTEGER NOT NULL,
            current_bin_no TEXT,
            current_bin_scanned INTEGER NOT NULL DEFAULT 0,
            current_bin_total INTEGER NOT NULL DEFAULT 0,
            timestamp DATETIME NOT NULL,
            PRIMARY KEY (invoice_number, session_id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoice_progress (
            invoice_number TEXT PRIMARY KEY,
            scanned_quantity INTEGER NOT NULL,
            completed_bins INTEGER NOT NULL,
            total_bins INTEGER NOT NULL,
            remaining_quantity INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(
                status IN ('not_started', 'in_progress', 'complete')
            ),
            session_id TEXT,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== CREATE INDEXES ====================

    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_invoices_part ON invoices(part_number)")
        .execute(pool).await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_bins_invoice ON bins(invoice_number)")
        .execute(pool).await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_bins_status ON bins(status)")
        .execute(pool).await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_scan_progress_bin ON scan_progress(bin_no)")
        .execute(pool).await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_statistics_invoice_time ON statistics(invoice_number, timestamp)")
        .execute(pool).await;

    log::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}
