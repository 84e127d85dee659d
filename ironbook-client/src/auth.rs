//! Request signing for the exchange REST API and the private feed login.

use crate::error::AuthError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key.
pub const KEY_HEADER: &str = "FTX-KEY";
/// Header carrying the hex signature.
pub const SIGN_HEADER: &str = "FTX-SIGN";
/// Header carrying the millisecond timestamp.
pub const TS_HEADER: &str = "FTX-TS";

/// API credentials.
#[derive(Clone)]
pub struct FeedAuth {
    api_key: String,
    secret: String,
}

impl std::fmt::Debug for FeedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedAuth")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl FeedAuth {
    /// Creates credentials from an API key and its secret.
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// HMAC-SHA256 of `payload` under the secret, lowercase hex.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidKey`] if the MAC rejects the secret.
    pub fn sign(&self, payload: &str) -> Result<String, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signed headers for a REST request.
    ///
    /// The signature covers `{ts_ms}{METHOD}{path}{body}`; pass an empty body
    /// for requests without one.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn rest_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
        ts_ms: u64,
    ) -> Result<[(&'static str, String); 3], AuthError> {
        let payload = format!("{ts_ms}{}{path}{body}", method.to_ascii_uppercase());
        let sign = self.sign(&payload)?;
        Ok([
            (KEY_HEADER, self.api_key.clone()),
            (SIGN_HEADER, sign),
            (TS_HEADER, ts_ms.to_string()),
        ])
    }

    /// Login frame for the private feed.
    ///
    /// # Errors
    /// Returns an error if signing or serialization fails.
    pub fn websocket_login(&self, ts_ms: u64) -> Result<String, AuthError> {
        let sign = self.sign(&format!("{ts_ms}websocket_login"))?;
        let frame = serde_json::json!({
            "op": "login",
            "args": {
                "key": self.api_key,
                "sign": sign,
                "time": ts_ms,
            },
        });
        Ok(serde_json::to_string(&frame)?)
    }
}
