/// Authentication extractors and utilities
///
/// Bearer tokens are HS256 JWTs minted by the barangay identity service
/// with the shared `JWT_SECRET`. Revoked tokens are rejected even before
/// their `exp`.
use crate::{api::middleware::extract_bearer_token, context::AppContext, error::AppError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Caller role carried in the `role` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Resident,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    fn level(&self) -> u8 {
        match self {
            Role::Resident => 0,
            Role::Staff => 1,
            Role::Admin => 2,
        }
    }

    /// Check if this role has at least the permissions of `required`
    pub fn can_act_as(&self, required: Role) -> bool {
        self.level() >= required.level()
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub role: Role,
    /// Raw bearer token, kept for logout
    pub token: String,
    pub expires_at: i64,
}

impl AuthContext {
    fn require(self, required: Role) -> Result<Self, AppError> {
        if !self.role.can_act_as(required) {
            tracing::warn!(
                subject = %self.subject,
                role = self.role.as_str(),
                required = required.as_str(),
                "insufficient role"
            );
            return Err(AppError::Authorization(format!(
                "Requires {} role or higher",
                required.as_str()
            )));
        }
        Ok(self)
    }
}

async fn authenticate(token: String, state: &AppContext) -> Result<AuthContext, AppError> {
    let claims = verify_jwt_token(&token, &state.config.authentication.jwt_secret)?;

    if state.revocations.is_revoked(&token).await? {
        return Err(AppError::Authentication("Token has been revoked".to_string()));
    }

    Ok(AuthContext {
        subject: claims.sub,
        role: claims.role,
        token,
        expires_at: claims.exp,
    })
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        authenticate(token, state).await
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match extract_bearer_token(&parts.headers) {
            Some(token) => authenticate(token, state).await.ok(),
            None => None,
        };

        Ok(OptionalAuthContext { auth })
    }
}

/// Staff or admin caller
#[derive(Debug, Clone)]
pub struct StaffAuthContext(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppContext> for StaffAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        Ok(StaffAuthContext(auth.require(Role::Staff)?))
    }
}

/// Admin caller
#[derive(Debug, Clone)]
pub struct AdminAuthContext(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        Ok(AdminAuthContext(auth.require(Role::Admin)?))
    }
}

/// Verify a JWT: signature, expiry and claim shape
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew
    validation.leeway = 60;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Authentication("Invalid token signature".to_string())
                }
                _ => AppError::Authentication(format!("Invalid token: {}", e)),
            }
        })
}

/// Mint a token the way the identity service does
#[cfg(test)]
pub fn issue_token(jwt_secret: &str, subject: &str, role: Role, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        role,
        exp: now + ttl_secs,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .unwrap()
}
