//! Anonymous owner identification through a signed `auth` cookie.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const AUTH_COOKIE: &str = "auth";

/// The value of the caller's `auth` cookie, inserted into the request
/// extensions by [`authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("auth secret must not be empty")]
    EmptySecret,
    #[error("auth secret rejected: {0}")]
    InvalidKey(String),
}

/// Issues and verifies `<id>.<hex hmac-sha256(id)>` cookie values.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: impl AsRef<str>) -> Result<Self, SignerError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }

        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|err| SignerError::InvalidKey(err.to_string()))?;
        Ok(Self { mac })
    }

    /// Creates a value for a new owner.
    pub fn issue(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let signature = hex::encode(self.keyed(&id).finalize().into_bytes());
        format!("{id}.{signature}")
    }

    /// Returns true when `value` was issued with this secret. The signature
    /// is compared in constant time.
    pub fn verify(&self, value: &str) -> bool {
        let Some((id, signature)) = value.split_once('.') else {
            return false;
        };
        if id.is_empty() {
            return false;
        }

        match hex::decode(signature) {
            Ok(signature) => self.keyed(id).verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }

    fn keyed(&self, id: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// Middleware that attaches an [`OwnerId`] to every request.
///
/// A missing or forged cookie is replaced with a freshly issued one. The
/// response always carries the cookie back in `Set-Cookie`.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let presented = cookie_value(request.headers(), AUTH_COOKIE).map(str::to_owned);

    let value = match presented {
        Some(value) if state.signer().verify(&value) => value,
        Some(_) => {
            debug!("replacing auth cookie with invalid signature");
            state.signer().issue()
        }
        None => state.signer().issue(),
    };

    request.extensions_mut().insert(OwnerId(value.clone()));
    let mut response = next.run(request).await;

    match HeaderValue::from_str(&format!("{AUTH_COOKIE}={value}; Path=/; HttpOnly")) {
        Ok(header) => {
            response.headers_mut().append(SET_COOKIE, header);
        }
        Err(err) => warn!(error = %err, "auth cookie is not a valid header value"),
    }

    response
}

/// Finds a cookie by name across every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
