use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

/// Authentication state attached to each request by the pre-validation chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    /// A credential was presented and verified
    pub authenticated: bool,
    /// The verified credential is accepted by this service (audience check)
    pub authorized: bool,
    /// Decoded identity claims, addressable by field name
    pub user: Option<Map<String, Value>>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|user| user.get(name))
    }

    pub fn roles(&self) -> Vec<&str> {
        self.claim("roles").map(string_list).unwrap_or_default()
    }

    /// `permissions` claim, falling back to an OAuth style `scope` string
    pub fn permissions(&self) -> Vec<&str> {
        self.claim("permissions")
            .or_else(|| self.claim("scope"))
            .map(string_list)
            .unwrap_or_default()
    }
}

/// Accepts `["a", "b"]` or `"a b"` / `"a,b"`
fn string_list(value: &Value) -> Vec<&str> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,
}

/// Populates the auth context for a request from its (lowercased) headers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &Map<String, Value>) -> AuthContext;
}

/// Treats every request as anonymous
pub struct AnonymousAuth;

#[async_trait]
impl AuthProvider for AnonymousAuth {
    async fn authenticate(&self, _headers: &Map<String, Value>) -> AuthContext {
        AuthContext::anonymous()
    }
}

/// HS256 bearer-token verification
pub struct JwtAuthProvider {
    key: DecodingKey,
    validation: Validation,
    audiences: Vec<String>,
}

impl JwtAuthProvider {
    pub fn new(secret: &str, audiences: Vec<String>) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        // Audience is checked separately so a foreign token still counts as authenticated
        let mut validation = Validation::default();
        validation.validate_aud = false;

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            audiences,
        })
    }

    fn audience_accepted(&self, claims: &Map<String, Value>) -> bool {
        if self.audiences.is_empty() {
            return true;
        }
        claims
            .get("aud")
            .map(string_list)
            .unwrap_or_default()
            .iter()
            .any(|aud| self.audiences.iter().any(|a| a == aud))
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, headers: &Map<String, Value>) -> AuthContext {
        let token = match extract_bearer(headers) {
            Ok(Some(token)) => token,
            Ok(None) => return AuthContext::anonymous(),
            Err(msg) => {
                tracing::debug!("Ignoring authorization header: {}", msg);
                return AuthContext::anonymous();
            }
        };

        match decode::<Map<String, Value>>(token, &self.key, &self.validation) {
            Ok(data) => AuthContext {
                authenticated: true,
                authorized: self.audience_accepted(&data.claims),
                user: Some(data.claims),
            },
            Err(e) => {
                tracing::debug!("Invalid JWT token: {}", e);
                AuthContext::anonymous()
            }
        }
    }
}

/// Extract JWT token from Authorization header
fn extract_bearer(headers: &Map<String, Value>) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .as_str()
        .ok_or("Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token.trim().is_empty() => Err("Empty JWT token"),
        Some(token) => Ok(Some(token.trim())),
        None => Err("Authorization header must use Bearer token format"),
    }
}
