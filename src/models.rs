use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt::Display;
use std::str::FromStr;
use validator::Validate;

/// Optional form fields arrive as `""` from most clients; treat blank as absent.
/// The trim only decides blankness; the stored value is kept as sent.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid value {:?}: {}", value, e))),
    }
}

/// `null` on a required text field reads as empty, so validation reports it by name.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============ Patient Models ============

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of `GET /patients`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            date_of_birth: patient.date_of_birth,
        }
    }
}

/// A validated registration, with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub last_name: String,
    #[validate(email(message = "Valid email is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub password: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(deserialize_with = "blank_as_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(deserialize_with = "blank_as_none")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "blank_as_none")]
    pub address: Option<String>,
}

impl RegisterRequest {
    pub fn into_new_patient(self, password_hash: String) -> NewPatient {
        NewPatient {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    #[serde(rename = "patientId")]
    pub patient_id: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[serde(deserialize_with = "null_as_empty")]
    pub password: String,
}

// ============ Provider Models ============

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub provider_specialty: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub years_of_experience: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of `GET /providers`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub first_name: String,
    pub last_name: String,
    pub provider_specialty: String,
}

impl From<&Provider> for ProviderSummary {
    fn from(provider: &Provider) -> Self {
        Self {
            first_name: provider.first_name.clone(),
            last_name: provider.last_name.clone(),
            provider_specialty: provider.provider_specialty.clone(),
        }
    }
}
