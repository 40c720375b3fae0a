#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemedicine_backend::{
    auth::SessionCookie,
    config::{SessionBackend, SessionConfig},
    database::{Repository, StoreError},
    handlers::AppState,
    models::{NewPatient, Patient, PatientSummary, Provider, ProviderSummary},
    session::{MemorySessionStore, SessionData, SessionError, SessionStore},
};
use actix_web::web;

pub const TEST_SESSION_SECRET: &str = "test_secret_key_minimum_32_chars_long_for_sessions";
pub const COOKIE_NAME: &str = "telemed.sid";

pub fn session_config() -> SessionConfig {
    SessionConfig {
        secret: TEST_SESSION_SECRET.to_string(),
        cookie_name: COOKIE_NAME.to_string(),
        ttl_seconds: 3600,
        secure: false,
        store: SessionBackend::Memory,
        redis_url: None,
    }
}

pub fn app_state(
    repository: Arc<dyn Repository>,
    sessions: Arc<dyn SessionStore>,
) -> web::Data<AppState> {
    web::Data::new(AppState {
        repository,
        sessions,
        session_cookie: SessionCookie::new(&session_config()).expect("valid test secret"),
    })
}

pub fn memory_sessions() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new(Duration::from_secs(3600)))
}

/// In-process stand-in for the Postgres tables, with the same unique-email rule.
#[derive(Default)]
pub struct MemoryRepository {
    patients: Mutex<Vec<Patient>>,
    providers: Mutex<Vec<Provider>>,
}

impl MemoryRepository {
    pub fn with_providers(providers: Vec<Provider>) -> Self {
        Self {
            patients: Mutex::new(Vec::new()),
            providers: Mutex::new(providers),
        }
    }

    pub fn patients_with_email(&self, email: &str) -> Vec<Patient> {
        self.patients
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.email == email)
            .cloned()
            .collect()
    }

    pub fn patient_count(&self) -> usize {
        self.patients.lock().unwrap().len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self.patients_with_email(email).into_iter().next())
    }

    async fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StoreError> {
        let mut patients = self.patients.lock().unwrap();
        if patients.iter().any(|p| p.email == patient.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = patients.len() as i64 + 1;
        patients.push(Patient {
            id,
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            email: patient.email.clone(),
            password_hash: patient.password_hash.clone(),
            phone: patient.phone.clone(),
            date_of_birth: patient.date_of_birth,
            gender: patient.gender.clone(),
            address: patient.address.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, StoreError> {
        Ok(self.patients.lock().unwrap().iter().map(PatientSummary::from).collect())
    }

    async fn patients_by_first_name(&self, first_name: &str) -> Result<Vec<Patient>, StoreError> {
        Ok(self
            .patients
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.first_name == first_name)
            .cloned()
            .collect())
    }

    async fn list_providers(&self) -> Result<Vec<ProviderSummary>, StoreError> {
        Ok(self.providers.lock().unwrap().iter().map(ProviderSummary::from).collect())
    }

    async fn providers_by_specialty(&self, specialty: &str) -> Result<Vec<Provider>, StoreError> {
        Ok(self
            .providers
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.provider_specialty == specialty)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Every call fails as if the pool had been shut down.
pub struct FailingRepository;

#[async_trait]
impl Repository for FailingRepository {
    async fn find_patient_by_email(&self, _email: &str) -> Result<Option<Patient>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn insert_patient(&self, _patient: &NewPatient) -> Result<i64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn patients_by_first_name(&self, _first_name: &str) -> Result<Vec<Patient>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn list_providers(&self) -> Result<Vec<ProviderSummary>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn providers_by_specialty(&self, _specialty: &str) -> Result<Vec<Provider>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
}

/// Accepts sessions but cannot destroy them.
pub struct BrokenDestroySessions {
    inner: MemorySessionStore,
}

impl BrokenDestroySessions {
    pub fn new() -> Self {
        Self {
            inner: MemorySessionStore::new(Duration::from_secs(3600)),
        }
    }
}

#[async_trait]
impl SessionStore for BrokenDestroySessions {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        self.inner.set(id, data).await
    }

    async fn destroy(&self, _id: &str) -> Result<(), SessionError> {
        Err(connection_refused())
    }
}

pub fn provider(id: i64, first_name: &str, last_name: &str, specialty: &str) -> Provider {
    Provider {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        provider_specialty: specialty.to_string(),
        email: None,
        phone: None,
        years_of_experience: Some(10),
        created_at: Utc::now(),
    }
}

/// A session backend that has gone away: every call fails, including ping.
pub struct UnreachableSessions;

fn connection_refused() -> SessionError {
    SessionError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

#[async_trait]
impl SessionStore for UnreachableSessions {
    async fn get(&self, _id: &str) -> Result<Option<SessionData>, SessionError> {
        Err(connection_refused())
    }

    async fn set(&self, _id: &str, _data: &SessionData) -> Result<(), SessionError> {
        Err(connection_refused())
    }

    async fn destroy(&self, _id: &str) -> Result<(), SessionError> {
        Err(connection_refused())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Err(connection_refused())
    }
}
