// src/auth.rs
use std::collections::HashMap;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, rngs::OsRng, thread_rng, Rng};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::store::{JsonStore, UserRecord, UserTable};

pub const SESSION_COOKIE: &str = "session_id";
const SESSION_ID_LENGTH: usize = 64;

// --- Password Hashing ---

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

// --- Credential Store ---

/// Registered users, loaded once and written back after every change.
#[derive(Debug)]
pub struct UserStore {
    store: JsonStore,
    users: UserTable,
}

impl UserStore {
    pub fn load(store: JsonStore) -> Result<Self, AppError> {
        let users = store.load_users()?;
        info!("Loaded {} registered users", users.len());
        Ok(Self { store, users })
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn register(&mut self, name: &str, user_id: &str, password: &str) -> Result<(), AppError> {
        if user_id.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "User ID and password are required.".to_string(),
            ));
        }
        if self.contains(user_id) {
            return Err(AppError::AlreadyExists("User ID already exists.".to_string()));
        }

        let record = UserRecord {
            name: name.to_string(),
            password: hash_password(password)?,
        };
        self.users.insert(user_id.to_string(), record);
        if let Err(e) = self.store.save_users(&self.users) {
            // Keep memory and disk in step.
            self.users.remove(user_id);
            return Err(e);
        }
        info!("Registered user '{}'", user_id);
        Ok(())
    }

    pub fn authenticate(&self, user_id: &str, password: &str) -> Result<&UserRecord, AppError> {
        match self.users.get(user_id) {
            Some(record) if verify_password(password, &record.password) => Ok(record),
            _ => {
                warn!("Failed login attempt for '{}'", user_id);
                Err(AppError::InvalidCredentials)
            }
        }
    }
}

// --- Sessions ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(user_id: &str, lifetime: Duration) -> Self {
        Self {
            id: generate_session_id(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + lifetime,
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// In-memory session table. Sessions do not survive a restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime_secs: i64) -> Self {
        Self {
            sessions: HashMap::new(),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    pub fn create(&mut self, user_id: &str) -> Session {
        self.cleanup_expired();
        let session = Session::new(user_id, self.lifetime);
        self.sessions.insert(session.id.clone(), session.clone());
        debug!("Session created for '{}'", user_id);
        session
    }

    /// Returns the session if it exists and has not expired.
    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id).filter(|s| s.is_valid())
    }

    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_valid());
        before - self.sessions.len()
    }
}

// --- Cookies ---

pub fn session_cookie(session_id: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_secs
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Finds the session id among all `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// --- Session Guard ---

/// The logged-in caller. Rejects the request with 401 when no valid session is presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub session_id: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let unauthorized = || AppError::Unauthorized("Please log in first.".to_string());

        let session_id = session_id_from_headers(&parts.headers).ok_or_else(unauthorized)?;
        let sessions = state.sessions.lock().await;
        let session = sessions.get(&session_id).ok_or_else(unauthorized)?;

        Ok(AuthUser {
            user_id: session.user_id.clone(),
            session_id,
        })
    }
}
