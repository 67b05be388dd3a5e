use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,       // user ID
    pub email: String,
    pub sid: Uuid,      // session the token was minted under
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
}
