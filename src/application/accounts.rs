//! Registration, password login and cookie sessions.
//!
//! Session tokens look like `ytb_<prefix>_<secret>`: the prefix locates the
//! row and only a SHA-256 digest of the secret is stored, compared in
//! constant time.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::{
        forms::{FormErrors, NON_FIELD},
        repos::{CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo},
    },
    domain::{
        entities::{SessionRecord, UserRecord},
        error::DomainError,
        users::{validate_email, validate_name, validate_new_password, validate_username},
    },
};

const TOKEN_PREFIX: &str = "ytb";
const MIN_SECRET_LEN: usize = 32;
const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const WRONG_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid account form: {0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token")]
    Invalid,
    #[error("expired session")]
    Expired,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Session bound to the request that presented it.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: UserRecord,
    pub session_id: Uuid,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(&self, form: SignupForm) -> Result<UserRecord, AccountError> {
        let mut errors = FormErrors::new();

        let username = collect(&mut errors, validate_username(&form.username))?;
        let first_name = collect(&mut errors, validate_name("first_name", &form.first_name))?;
        let last_name = collect(&mut errors, validate_name("last_name", &form.last_name))?;
        let email = collect(&mut errors, validate_email(&form.email))?;
        collect(
            &mut errors,
            validate_new_password("password2", &form.password1, &form.password2, &form.username),
        )?;

        if let Some(username) = username.as_deref()
            && self.users.find_by_username(username).await?.is_some()
        {
            errors.push("username", USERNAME_TAKEN);
        }

        let (Some(username), Some(first_name), Some(last_name), Some(email), true) =
            (username, first_name, last_name, email, errors.is_empty())
        else {
            return Err(AccountError::Invalid(errors));
        };

        let password_hash = hash_password(&form.password1)?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AccountError::Invalid(FormErrors::single(
                    "username",
                    USERNAME_TAKEN,
                )));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::application::accounts",
            user_id = user.id,
            username = %user.username,
            "user registered"
        );
        Ok(user)
    }

    pub async fn login(&self, form: LoginForm) -> Result<IssuedSession, AccountError> {
        let user = match self.users.find_by_username(form.username.trim()).await? {
            Some(user) if verify_password(&form.password, &user.password_hash) => user,
            _ => {
                warn!(
                    target = "yatube::application::accounts",
                    username = %form.username,
                    "login rejected"
                );
                return Err(AccountError::Invalid(FormErrors::single(
                    NON_FIELD,
                    INVALID_LOGIN,
                )));
            }
        };

        self.issue_session(user).await
    }

    pub async fn issue_session(&self, user: UserRecord) -> Result<IssuedSession, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                prefix,
                hashed_secret: hash_secret(&secret),
                user_id: user.id,
                expires_at,
            })
            .await?;

        info!(
            target = "yatube::application::accounts",
            user_id = user.id,
            "session issued"
        );
        Ok(IssuedSession {
            user,
            token,
            expires_at,
        })
    }

    /// Resolve a cookie token to the signed-in user.
    pub async fn authenticate(&self, token: &str) -> Result<Authenticated, SessionError> {
        let session = self.lookup(token).await?;
        if session.expires_at <= OffsetDateTime::now_utc() {
            return Err(SessionError::Expired);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(SessionError::Invalid)?;

        Ok(Authenticated {
            user,
            session_id: session.id,
        })
    }

    /// End the session behind `token`; unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        match self.lookup(token).await {
            Ok(session) => {
                self.sessions.delete_session(session.id).await?;
                info!(
                    target = "yatube::application::accounts",
                    user_id = session.user_id,
                    "session ended"
                );
                Ok(())
            }
            Err(SessionError::Repo(err)) => Err(err.into()),
            Err(_) => Ok(()),
        }
    }

    /// Change the password and end every other session of the user.
    pub async fn change_password(
        &self,
        current: &Authenticated,
        form: PasswordChangeForm,
    ) -> Result<(), AccountError> {
        let user = &current.user;
        let mut errors = FormErrors::new();

        if !verify_password(&form.old_password, &user.password_hash) {
            errors.push("old_password", WRONG_OLD_PASSWORD);
        }
        collect(
            &mut errors,
            validate_new_password(
                "new_password2",
                &form.new_password1,
                &form.new_password2,
                &user.username,
            ),
        )?;
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }

        let password_hash = hash_password(&form.new_password1)?;
        self.users.update_password(user.id, &password_hash).await?;
        let dropped = self
            .sessions
            .delete_other_sessions(user.id, current.session_id)
            .await?;

        info!(
            target = "yatube::application::accounts",
            user_id = user.id,
            dropped_sessions = dropped,
            "password changed"
        );
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<SessionRecord, SessionError> {
        let parsed = parse_token(token).ok_or(SessionError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await?
            .ok_or(SessionError::Invalid)?;

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionError::Invalid);
        }
        Ok(session)
    }
}

fn collect<T>(
    errors: &mut FormErrors,
    result: Result<T, DomainError>,
) -> Result<Option<T>, DomainError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => errors.absorb(err).map(|()| None),
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::PasswordHash(err.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
