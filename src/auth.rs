use crate::config::SessionConfig;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::error::BlockingError;
use actix_web::{web, HttpRequest};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// bcrypt work factor for new password hashes.
pub const BCRYPT_COST: u32 = 12;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("hashing task did not complete: {0}")]
    Cancelled(#[from] BlockingError),
}

/// Salted bcrypt hash, computed off the request executor.
pub async fn hash_password(password: String) -> Result<String, PasswordError> {
    let hashed = web::block(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hashed)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, PasswordError> {
    let matches = web::block(move || bcrypt::verify(password, &password_hash)).await??;
    Ok(matches)
}

/// Issues and checks the session cookie. The value is `<id>.<signature>`,
/// where the signature is an HMAC-SHA256 of the id under the session secret.
#[derive(Clone)]
pub struct SessionCookie {
    mac: HmacSha256,
    name: String,
    secure: bool,
}

impl SessionCookie {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(config.secret.as_bytes())
            .map_err(|e| anyhow!("Invalid session secret: {}", e))?;

        Ok(Self {
            mac,
            name: config.cookie_name.clone(),
            secure: config.secure,
        })
    }

    /// Fresh opaque session id: 32 random bytes, base64url.
    pub fn generate_id() -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", id, signature)
    }

    /// Returns the session id if the signature checks out.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(id.to_string())
    }

    /// Session id carried by the request, if present and authentic.
    pub fn session_id(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.name)
            .and_then(|cookie| self.verify(cookie.value()))
    }

    pub fn issue(&self, id: &str) -> Cookie<'static> {
        Cookie::build(self.name.clone(), self.sign(id))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .finish()
    }

    /// Removal cookie that clears the session on the client.
    pub fn expire(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}
