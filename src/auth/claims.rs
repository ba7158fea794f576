use serde::{Deserialize, Serialize};

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,                // user ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,      // present for registered accounts
    pub iat: usize,                 // issued at (unix timestamp)
    pub exp: usize,                 // expires at (unix timestamp)
    pub iss: String,                // issuer
    pub aud: String,                // audience
}
