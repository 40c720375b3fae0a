use crate::config::DatabaseConfig;
use crate::models::{NewPatient, Patient, PatientSummary, Provider, ProviderSummary};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything the handlers need from the patient/provider tables.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;

    /// Returns the new patient's id. A second insert with the same email
    /// yields [`StoreError::DuplicateEmail`].
    async fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StoreError>;

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, StoreError>;

    async fn patients_by_first_name(&self, first_name: &str) -> Result<Vec<Patient>, StoreError>;

    async fn list_providers(&self) -> Result<Vec<ProviderSummary>, StoreError>;

    async fn providers_by_specialty(&self, specialty: &str) -> Result<Vec<Provider>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(patient)
    }

    async fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO patients (first_name, last_name, email, password_hash, phone, date_of_birth, gender, address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"
        )
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(&patient.email)
        .bind(&patient.password_hash)
        .bind(&patient.phone)
        .bind(patient.date_of_birth)
        .bind(&patient.gender)
        .bind(&patient.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, StoreError> {
        let rows = sqlx::query_as::<_, PatientSummary>(
            "SELECT id, first_name, last_name, date_of_birth FROM patients"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn patients_by_first_name(&self, first_name: &str) -> Result<Vec<Patient>, StoreError> {
        let rows = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE first_name = $1")
            .bind(first_name)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_providers(&self) -> Result<Vec<ProviderSummary>, StoreError> {
        let rows = sqlx::query_as::<_, ProviderSummary>(
            "SELECT first_name, last_name, provider_specialty FROM providers"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn providers_by_specialty(&self, specialty: &str) -> Result<Vec<Provider>, StoreError> {
        let rows = sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE provider_specialty = $1")
            .bind(specialty)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
