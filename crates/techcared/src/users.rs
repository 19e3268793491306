//! User accounts: registration, password verification, roles, preferences.
//!
//! Stored in `<data_dir>/users.json`. Passwords are salted SHA-256 digests
//! stored as `salt$hex` and compared in constant time.

use crate::store::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use techcare_shared::api::{Preferences, UserView};
use techcare_shared::error::Result;
use techcare_shared::{Role, TechcareError};
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            created_at: self.created_at,
            last_login: self.last_login,
            preferences: self.preferences,
        }
    }
}

/// `salt$sha256(salt || password)`, both hex
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    constant_time_eq(digest(&salt, password).as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(TechcareError::validation(
            "username must be 3 to 32 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(TechcareError::validation(
            "username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(TechcareError::validation("email address is not valid")),
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(TechcareError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn find_mut<'a>(users: &'a mut [UserRecord], id: &str) -> Result<&'a mut UserRecord> {
    users
        .iter_mut()
        .find(|u| u.id == id)
        .ok_or_else(|| TechcareError::not_found(format!("user {}", id)))
}

fn active_admins(users: &[UserRecord]) -> usize {
    users
        .iter()
        .filter(|u| u.active && u.role == Role::AdminMaster)
        .count()
}

pub struct UserStore {
    path: PathBuf,
    users: Vec<UserRecord>,
}

impl UserStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("users.json");
        let users: Vec<UserRecord> = read_json(&path)?.unwrap_or_default();
        info!("  Loaded {} users", users.len());
        Ok(Self { path, users })
    }

    /// Apply a change to a copy, persist the copy, then swap it in.
    /// A failed write leaves the in-memory users untouched.
    fn commit<T>(&mut self, change: impl FnOnce(&mut Vec<UserRecord>) -> Result<T>) -> Result<T> {
        let mut users = self.users.clone();
        let out = change(&mut users)?;
        write_json_atomic(&self.path, &users)?;
        self.users = users;
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserView> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        validate_username(username)?;
        validate_email(&email)?;
        validate_password(password)?;

        if self
            .users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username))
        {
            return Err(TechcareError::Conflict(format!(
                "username {} is taken",
                username
            )));
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(TechcareError::Conflict(
                "email is already registered".to_string(),
            ));
        }

        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email,
            password_hash: hash_password(password),
            role,
            active: true,
            created_at: Utc::now(),
            last_login: None,
            preferences: Preferences::default(),
        };
        let view = record.view();
        self.commit(|users| {
            users.push(record);
            Ok(())
        })?;
        info!("  Registered user {} as {}", view.username, view.role);
        Ok(view)
    }

    /// Check credentials and record the login
    pub fn verify(&mut self, username: &str, password: &str) -> Result<UserView> {
        let user = self
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username.trim()))
            .ok_or(TechcareError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(TechcareError::InvalidCredentials);
        }
        if !user.active {
            return Err(TechcareError::Forbidden("account is disabled".to_string()));
        }
        let id = user.id.clone();
        self.commit(|users| {
            let user = find_mut(users, &id)?;
            user.last_login = Some(Utc::now());
            Ok(user.view())
        })
    }

    pub fn get(&self, id: &str) -> Result<UserView> {
        self.record(id).map(UserRecord::view)
    }

    fn record(&self, id: &str) -> Result<&UserRecord> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| TechcareError::not_found(format!("user {}", id)))
    }

    pub fn list(&self) -> Vec<UserView> {
        let mut users: Vec<UserView> = self.users.iter().map(UserRecord::view).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Change role and/or active flag together; both apply or neither does.
    /// Refuses a result with no active admin left.
    pub fn update(&mut self, id: &str, role: Option<Role>, active: Option<bool>) -> Result<UserView> {
        let view = self.commit(|users| {
            let had_admin = active_admins(users) > 0;
            let user = find_mut(users, id)?;
            if let Some(role) = role {
                user.role = role;
            }
            if let Some(active) = active {
                user.active = active;
            }
            let view = user.view();
            if had_admin && active_admins(users) == 0 {
                return Err(TechcareError::InvalidState(
                    "cannot demote or disable the last administrator".to_string(),
                ));
            }
            Ok(view)
        })?;
        info!(
            "  User {} is now {} ({})",
            view.username,
            view.role,
            if view.active { "active" } else { "disabled" }
        );
        Ok(view)
    }

    pub fn update_role(&mut self, id: &str, role: Role) -> Result<UserView> {
        self.update(id, Some(role), None)
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<UserView> {
        self.update(id, None, Some(active))
    }

    pub fn set_preferences(&mut self, id: &str, preferences: Preferences) -> Result<Preferences> {
        self.commit(|users| {
            let user = find_mut(users, id)?;
            user.preferences = Preferences {
                theme: preferences.theme,
                font_scale: preferences.effective_font_scale(),
            };
            Ok(user.preferences)
        })
    }

    /// Create the first admin when the store is empty.
    /// Returns the generated password when none was configured.
    pub fn bootstrap_admin(
        &mut self,
        username: &str,
        email: &str,
        password: Option<&str>,
    ) -> Result<Option<String>> {
        if !self.users.is_empty() {
            return Ok(None);
        }
        let generated = match password {
            Some(_) => None,
            None => Some(
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(20)
                    .map(char::from)
                    .collect::<String>(),
            ),
        };
        let secret = password.or(generated.as_deref()).unwrap_or_default();
        self.register(username, email, secret, Role::AdminMaster)?;
        if generated.is_some() {
            warn!(
                "Created administrator '{}' with a generated password; set auth.bootstrap_password to choose one",
                username
            );
        }
        Ok(generated)
    }
}
