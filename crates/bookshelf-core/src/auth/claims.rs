use serde::{Deserialize, Serialize};

/// Label shown when the provider does not supply a preferred username.
pub const DEFAULT_USERNAME: &str = "User";

/// Claims as they appear in the provider's token payload.
/// Every field is optional; the provider decides what it includes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Identity attributes of the signed-in user, resolved once when the
/// session becomes authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserClaims {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl UserClaims {
    pub fn from_token(claims: &TokenClaims) -> Self {
        let username = non_empty(&claims.preferred_username)
            .unwrap_or(DEFAULT_USERNAME)
            .to_string();
        let display_name = non_empty(&claims.name)
            .map(str::to_string)
            .unwrap_or_else(|| username.clone());

        Self {
            username,
            display_name,
            email: non_empty(&claims.email).map(str::to_string),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
