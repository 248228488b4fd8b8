use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::user::{is_valid_username, NewUser, User};
use crate::infra::store::{SharedStore, StoreError};

const TOKEN_ISSUER: &str = "yatube";
const TOKEN_AUDIENCE: &str = "yatube";

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const DUPLICATE_USERNAME_MESSAGE: &str = "a user with that username already exists";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Key material and lifetimes for issued tokens.
#[derive(Clone, Copy)]
pub struct TokenSettings {
    pub access_key: [u8; 32],
    pub refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    tokens: TokenSettings,
}

impl AuthService {
    pub fn new(store: SharedStore, tokens: TokenSettings) -> Self {
        Self { store, tokens }
    }

    pub async fn signup(&self, registration: Registration) -> ServiceResult<User> {
        let username = registration.username.trim().to_string();
        if !is_valid_username(&username) {
            return Err(ServiceError::validation(
                "username must be 1-150 characters of letters, digits and @/./+/-/_",
            ));
        }
        let password_len = registration.password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password_len) {
            return Err(ServiceError::validation(format!(
                "password must be between {} and {} characters",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            )));
        }
        let email = registration
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(ServiceError::validation("enter a valid email address"));
            }
        }

        let password_hash = hash_password(&registration.password)?;
        match self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::UniqueViolation(_)) => {
                Err(ServiceError::validation(DUPLICATE_USERNAME_MESSAGE))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<Option<TokenPair>> {
        let credentials = match self.store.find_credentials(username).await? {
            Some(credentials) => credentials,
            None => return Ok(None),
        };
        if credentials.password_hash.is_empty() {
            return Ok(None);
        }
        if !verify_password(password, &credentials.password_hash)? {
            return Ok(None);
        }

        Ok(Some(self.issue_token_pair(credentials.user.id)?))
    }

    /// Exchanges a refresh token for a new access token. Refresh tokens are
    /// not stored, so they stay valid until they expire.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<Option<String>> {
        let user_id = match self.verify_refresh_token(refresh_token)? {
            Some(user_id) => user_id,
            None => return Ok(None),
        };
        if self.store.get_user(user_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.issue_access_token(user_id)?))
    }

    /// True for any unexpired access or refresh token issued by this service.
    pub fn verify(&self, token: &str) -> Result<bool> {
        if self.authenticate_access_token(token)?.is_some() {
            return Ok(true);
        }
        Ok(self.verify_refresh_token(token)?.is_some())
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token, self.tokens.access_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        Ok(claim_user_id(&claims).map(|user_id| AuthSession { user_id }))
    }

    pub async fn get_current_user(&self, user_id: i64) -> ServiceResult<Option<User>> {
        Ok(self.store.get_user(user_id).await?)
    }

    pub fn issue_token_pair(&self, user_id: i64) -> Result<TokenPair> {
        let access_token = self.issue_access_token(user_id)?;

        let claims = self.build_refresh_claims(user_id, Uuid::new_v4())?;
        let refresh_key = SymmetricKey::<V4>::from(&self.tokens.refresh_key)?;
        let refresh_token = local::encrypt(&refresh_key, &claims, None, None)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn issue_access_token(&self, user_id: i64) -> Result<String> {
        let claims = self.build_access_claims(user_id)?;
        let access_key = SymmetricKey::<V4>::from(&self.tokens.access_key)?;
        Ok(local::encrypt(&access_key, &claims, None, None)?)
    }

    fn decrypt_claims(&self, token: &str, key_bytes: [u8; 32]) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&key_bytes)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_AUDIENCE);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_access_claims(&self, user_id: i64) -> Result<Claims> {
        let duration = std::time::Duration::from_secs(self.tokens.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_AUDIENCE)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;
        Ok(claims)
    }

    fn build_refresh_claims(&self, user_id: i64, refresh_id: Uuid) -> Result<Claims> {
        let duration = std::time::Duration::from_secs(self.tokens.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_AUDIENCE)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", "refresh")?;
        Ok(claims)
    }

    fn verify_refresh_token(&self, token: &str) -> Result<Option<i64>> {
        let claims = match self.decrypt_claims(token, self.tokens.refresh_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "refresh") {
            return Ok(None);
        }
        Ok(claim_user_id(&claims))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_user_id(claims: &Claims) -> Option<i64> {
    claims
        .get_claim("sub")
        .and_then(|value| value.as_str())
        .and_then(|value| value.parse().ok())
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryStore;
    use std::sync::Arc;

    fn service() -> AuthService {
        let store: SharedStore = Arc::new(MemoryStore::new());
        AuthService::new(
            store,
            TokenSettings {
                access_key: [7; 32],
                refresh_key: [9; 32],
                access_ttl_minutes: 15,
                refresh_ttl_days: 30,
            },
        )
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: None,
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn token_lifecycle() {
        let auth = service();
        let user = auth
            .signup(registration("alice", "correct horse"))
            .await
            .unwrap();

        assert!(auth.login("alice", "wrong password").await.unwrap().is_none());
        assert!(auth.login("nobody", "correct horse").await.unwrap().is_none());

        let pair = auth.login("alice", "correct horse").await.unwrap().unwrap();
        let session = auth
            .authenticate_access_token(&pair.access_token)
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user.id);

        // Keys and token types are not interchangeable.
        assert!(auth
            .authenticate_access_token(&pair.refresh_token)
            .unwrap()
            .is_none());
        assert!(auth.refresh(&pair.access_token).await.unwrap().is_none());

        assert!(auth.verify(&pair.access_token).unwrap());
        assert!(auth.verify(&pair.refresh_token).unwrap());
        assert!(!auth.verify("v4.local.garbage").unwrap());

        let access = auth.refresh(&pair.refresh_token).await.unwrap().unwrap();
        assert!(auth.authenticate_access_token(&access).unwrap().is_some());
    }

    #[tokio::test]
    async fn signup_validation() {
        let auth = service();
        assert!(matches!(
            auth.signup(registration("bad name", "long enough")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            auth.signup(registration("alice", "short")).await,
            Err(ServiceError::Validation(_))
        ));

        auth.signup(registration("alice", "long enough")).await.unwrap();
        match auth.signup(registration("alice", "long enough")).await {
            Err(ServiceError::Validation(message)) => {
                assert_eq!(message, DUPLICATE_USERNAME_MESSAGE)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
