use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::error::ApiError;
use crate::user::model::{AccountStatus, CreateUserRequest, KycStatus, UpdateUserRequest, User};

const ENTITY: &str = "User";

/// Fetch a user that has not been deleted
pub(crate) async fn fetch_live_user<'e, E>(executor: E, id: Uuid) -> Result<User, ApiError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_deleted = FALSE")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found(ENTITY, id))
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::InternalError(format!("Password hashing failed: {}", e)))
}

fn email_conflict(err: sqlx::Error, email: &str) -> ApiError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            ApiError::Conflict(format!("Email {} is already registered", email))
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct UserService {
    db_pool: PgPool,
    default_apr: Decimal,
}

impl UserService {
    pub fn new(db_pool: PgPool, default_apr: Decimal) -> Self {
        Self { db_pool, default_apr }
    }

    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        client_ip: Option<&str>,
    ) -> Result<User, ApiError> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let hashed_password = hash_password(request.password).await?;
        let now = Utc::now();

        let mut tx = self.db_pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, name, email, phone, kyc_status, account_status,
                apr, hashed_password, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&email)
        .bind(&request.phone)
        .bind(request.kyc_status.unwrap_or(KycStatus::Pending))
        .bind(request.account_status.unwrap_or(AccountStatus::Active))
        .bind(request.apr.unwrap_or(self.default_apr))
        .bind(hashed_password)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| email_conflict(e, &email))?;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::UserCreate, ENTITY, user.id)
                .user(user.id)
                .ip(client_ip),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User created");

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, ApiError> {
        fetch_live_user(&self.db_pool, id).await
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
        client_ip: Option<&str>,
    ) -> Result<User, ApiError> {
        request.validate()?;

        let hashed_password = match request.password {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };
        let email = request.email.map(|e| e.trim().to_lowercase());

        let mut tx = self.db_pool.begin().await?;

        // held until commit
        sqlx::query("SELECT id FROM users WHERE id = $1 AND is_deleted = FALSE FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found(ENTITY, id))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                kyc_status = COALESCE($5, kyc_status),
                account_status = COALESCE($6, account_status),
                apr = COALESCE($7, apr),
                hashed_password = COALESCE($8, hashed_password),
                updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&email)
        .bind(&request.phone)
        .bind(request.kyc_status)
        .bind(request.account_status)
        .bind(request.apr)
        .bind(hashed_password)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| email_conflict(e, email.as_deref().unwrap_or_default()))?;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::UserUpdate, ENTITY, id)
                .user(id)
                .ip(client_ip),
        )
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Soft delete: anonymise personal data and flag the row
    pub async fn delete_user(&self, id: Uuid, client_ip: Option<&str>) -> Result<(), ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = $2,
                email = $3,
                phone = NULL,
                account_status = $4,
                is_deleted = TRUE,
                updated_at = $5
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(format!("Deleted User {}", id))
        .bind(format!("deleted_{}@example.com", id))
        .bind(AccountStatus::Closed)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(ENTITY, id));
        }

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::UserDelete, ENTITY, id)
                .user(id)
                .ip(client_ip)
                .details("Personal data anonymised"),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, "User soft-deleted");

        Ok(())
    }
}
