use sqlx::PgPool;
use tracing::warn;

use crate::error::MigrateError;
use crate::migrate::repo_types::{NewUser, UpsertOutcome, UserRecord};

/// Every table owned by the target store, children first so the reset drop
/// order never trips a foreign key. `_sqlx_migrations` goes too so the
/// schema can be re-applied from scratch.
const TARGET_TABLES: &[&str] = &["payrolls", "holidays", "users", "_sqlx_migrations"];

/// Find a target user by email.
pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, password_hash, name, department, role, employee_id,
               joining_date, is_active, base_salary, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

/// Create or fully overwrite the record for `user.email`.
///
/// A constraint violation on either path (for example a duplicate sparse
/// `employee_id`) surfaces as a `RecordError` for the reconciler to count;
/// it never corrupts existing rows.
pub async fn upsert(db: &PgPool, user: &NewUser) -> Result<UpsertOutcome, MigrateError> {
    let existing = find_by_email(db, &user.email)
        .await
        .map_err(|e| MigrateError::record(&user.email, e))?;
    match existing {
        Some(_) => {
            update(db, user)
                .await
                .map_err(|e| MigrateError::record(&user.email, e))?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            insert(db, user)
                .await
                .map_err(|e| MigrateError::record(&user.email, e))?;
            Ok(UpsertOutcome::Created)
        }
    }
}

async fn insert(db: &PgPool, user: &NewUser) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, name, department, role, employee_id,
                           joining_date, is_active, base_salary, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.department)
    .bind(user.role.as_str())
    .bind(&user.employee_id)
    .bind(user.joining_date)
    .bind(user.is_active)
    .bind(user.base_salary)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

async fn update(db: &PgPool, user: &NewUser) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2, name = $3, department = $4, role = $5,
            employee_id = $6, joining_date = $7, is_active = $8,
            base_salary = $9, created_at = $10, updated_at = $11
        WHERE email = $1
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.department)
    .bind(user.role.as_str())
    .bind(&user.employee_id)
    .bind(user.joining_date)
    .bind(user.is_active)
    .bind(user.base_salary)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Count admin accounts currently in the target store.
pub async fn count_admins(db: &PgPool) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Drop every target table, best-effort per table. A table that is already
/// missing is not an error; anything else is logged and skipped so the
/// remaining tables still get dropped.
pub async fn drop_all_tables(db: &PgPool) {
    for table in TARGET_TABLES.iter().copied() {
        let stmt = format!("DROP TABLE IF EXISTS {table} CASCADE");
        if let Err(e) = sqlx::query(&stmt).execute(db).await {
            warn!(table, error = %e, "drop failed, continuing");
        }
    }
}
