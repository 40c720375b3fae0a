use crate::auth::{hash_password, verify_password, SessionCookie};
use crate::database::{Repository, StoreError};
use crate::error::AppError;
use crate::metrics::{self, record_auth, record_store_error};
use crate::models::*;
use crate::session::{SessionData, SessionStore};
use actix_web::dev::Payload;
use actix_web::http::header::ContentType;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_cookie: SessionCookie,
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// JSON extractor config: unparseable bodies get the same 400 shape as
/// field validation failures.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| AppError::MalformedBody(err.to_string()).into())
}

/// Form extractor config, same 400 shape as [`json_config`].
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(|err, _req| AppError::MalformedBody(err.to_string()).into())
}

/// Request body sent either as an urlencoded form or as JSON. Form bodies are
/// recognised by content type; everything else goes through the JSON extractor.
pub struct JsonOrForm<T>(pub T);

impl<T> JsonOrForm<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned + 'static> FromRequest for JsonOrForm<T> {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        if req.content_type() == FORM_CONTENT_TYPE {
            let form = web::Form::<T>::from_request(req, payload);
            Box::pin(async move { form.await.map(|form| JsonOrForm(form.into_inner())) })
        } else {
            let json = web::Json::<T>::from_request(req, payload);
            Box::pin(async move { json.await.map(|json| JsonOrForm(json.into_inner())) })
        }
    }
}

/// Register every route. `/patients/logout` must stay ahead of
/// `/patients/{first_name}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(form_config())
        .route("/", web::get().to(welcome))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics::metrics_handler))
        // Authentication routes
        .route("/patients/register", web::post().to(register))
        .route("/patients/login", web::post().to(login))
        .route("/patients/logout", web::get().to(logout))
        // Read-only listings
        .route("/patients", web::get().to(list_patients))
        .route("/patients/{first_name}", web::get().to(patients_by_first_name))
        .route("/providers", web::get().to(list_providers))
        .route("/providers/specialty/{specialty}", web::get().to(providers_by_specialty));
}

pub async fn welcome() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Welcome to the Telemedicine Application API!")
}

// ============ Health Check ============

pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_ok = state.repository.ping().await.is_ok();
    let sessions_ok = state.sessions.ping().await.is_ok();

    let status = |ok: bool| if ok { "connected" } else { "disconnected" };

    if db_ok && sessions_ok {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": status(db_ok),
            "sessions": status(sessions_ok),
            "timestamp": Utc::now().to_rfc3339()
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "database": status(db_ok),
            "sessions": status(sessions_ok)
        }))
    }
}

// ============ Authentication Handlers ============

pub async fn register(
    state: web::Data<AppState>,
    body: JsonOrForm<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    if let Err(e) = request.validate() {
        record_auth("register", "invalid");
        return Err(e.into());
    }

    // Check if patient already exists
    let existing = state
        .repository
        .find_patient_by_email(&request.email)
        .await
        .inspect_err(|_| record_store_error("find_patient_by_email"))?;
    if existing.is_some() {
        record_auth("register", "duplicate");
        return Err(AppError::EmailTaken);
    }

    let password_hash = hash_password(request.password.clone()).await?;
    let new_patient = request.into_new_patient(password_hash);

    // The unique index catches registrations that race past the check above.
    let patient_id = match state.repository.insert_patient(&new_patient).await {
        Ok(id) => id,
        Err(StoreError::DuplicateEmail) => {
            record_auth("register", "duplicate");
            return Err(AppError::EmailTaken);
        }
        Err(e) => {
            record_store_error("insert_patient");
            return Err(e.into());
        }
    };

    record_auth("register", "created");
    info!(patient_id, "patient registered");

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Patient registered successfully!".to_string(),
        patient_id,
    }))
}

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: JsonOrForm<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    request.validate()?;

    let patient = state
        .repository
        .find_patient_by_email(&request.email)
        .await
        .inspect_err(|_| record_store_error("find_patient_by_email"))?;
    let patient = match patient {
        Some(p) => p,
        None => {
            record_auth("login", "unknown_account");
            return Err(AppError::PatientNotFound);
        }
    };

    if !verify_password(request.password, patient.password_hash).await? {
        record_auth("login", "invalid_password");
        warn!(patient_id = patient.id, "login rejected: invalid password");
        return Err(AppError::InvalidPassword);
    }

    // Rotate: a session carried in from before login is dropped.
    if let Some(previous) = state.session_cookie.session_id(&req) {
        if let Err(e) = state.sessions.destroy(&previous).await {
            warn!(error = %e, "could not destroy previous session");
        }
    }

    let session_id = SessionCookie::generate_id();
    state
        .sessions
        .set(&session_id, &SessionData::for_patient(patient.id))
        .await
        .inspect_err(|_| record_store_error("session_set"))?;

    record_auth("login", "success");
    info!(patient_id = patient.id, "patient logged in");

    Ok(HttpResponse::Ok()
        .cookie(state.session_cookie.issue(&session_id))
        .content_type(ContentType::plaintext())
        .body("Logged in successfully"))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Some(session_id) = state.session_cookie.session_id(&req) {
        match state.sessions.get(&session_id).await {
            Ok(Some(SessionData { patient_id: Some(patient_id) })) => {
                info!(patient_id, "patient logged out");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not read session before logout"),
        }

        if let Err(e) = state.sessions.destroy(&session_id).await {
            record_store_error("session_destroy");
            return Err(AppError::Logout(e));
        }
    }

    record_auth("logout", "success");

    Ok(HttpResponse::Ok()
        .cookie(state.session_cookie.expire())
        .content_type(ContentType::plaintext())
        .body("Logged out successfully"))
}

// ============ Read-only Listings ============

fn listing_failed(operation: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |e| {
        record_store_error(operation);
        AppError::Listing(e)
    }
}

pub async fn list_patients(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = state
        .repository
        .list_patients()
        .await
        .map_err(listing_failed("list_patients"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn patients_by_first_name(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let rows = state
        .repository
        .patients_by_first_name(&path)
        .await
        .map_err(listing_failed("patients_by_first_name"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn list_providers(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = state
        .repository
        .list_providers()
        .await
        .map_err(listing_failed("list_providers"))?;

    Ok(HttpResponse::Ok().json(rows))
}

pub async fn providers_by_specialty(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let rows = state
        .repository
        .providers_by_specialty(&path)
        .await
        .map_err(listing_failed("providers_by_specialty"))?;

    Ok(HttpResponse::Ok().json(rows))
}
