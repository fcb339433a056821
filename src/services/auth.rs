//! Registration, login and bearer-token sessions.

use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::required;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{LoginInput, LoginResponse, RegisterInput, User};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| anyhow!("Failed to build password salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn register(db: &Database, input: RegisterInput) -> Result<User> {
    let email = normalize_email(&required(&input.email, "email")?);
    if input.password.trim().is_empty() {
        tracing::warn!("Rejected registration without password");
        return Err(Error::validation("password is required"));
    }

    if db.get_user_by_email(&email)?.is_some() {
        tracing::warn!("Registration for existing email {}", email);
        return Err(Error::validation("Email already registered"));
    }

    let name = input
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let Some(user) = db.create_user(&email, &hash_password(&input.password)?, name)? else {
        tracing::warn!("Concurrent registration for email {}", email);
        return Err(Error::validation("Email already registered"));
    };
    tracing::info!("Registered user {}", user.id);
    Ok(user)
}

/// Check credentials and open a session lasting `ttl`.
pub fn login(db: &Database, input: LoginInput, ttl: Duration) -> Result<LoginResponse> {
    let email = normalize_email(&input.email);
    let Some((user, stored_hash)) = db.get_credentials(&email)? else {
        tracing::warn!("Login for unknown email");
        return Err(Error::Unauthorized("Invalid email or password".to_string()));
    };

    if !verify_password(&input.password, &stored_hash) {
        tracing::warn!("Failed login for user {}", user.id);
        return Err(Error::Unauthorized("Invalid email or password".to_string()));
    }

    let now = Utc::now();
    db.delete_expired_sessions(now)?;

    let token = Uuid::new_v4().simple().to_string();
    db.create_session(user.id, &token, now + ttl)?;
    tracing::info!("User {} logged in", user.id);

    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}

/// Resolve a bearer token to its user. Unknown or expired tokens are rejected.
pub fn authenticate(db: &Database, token: &str) -> Result<User> {
    let session = db
        .get_session(token)?
        .ok_or_else(|| Error::Unauthorized("Invalid session".to_string()))?;

    if session.expires_at <= Utc::now() {
        db.delete_session(token)?;
        return Err(Error::Unauthorized("Session expired".to_string()));
    }

    db.get_user(session.user_id)?
        .ok_or_else(|| Error::Unauthorized("Invalid session".to_string()))
}

pub fn logout(db: &Database, token: &str) -> Result<()> {
    db.delete_session(token)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "hunter2".to_string(),
            name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not a hash"));
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let db = db();
        register(&db, register_input("ada@example.com")).unwrap();
        let err = register(&db, register_input("  ADA@example.com ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn concurrent_registrations_of_one_email_admit_a_single_user() {
        let db = db();

        let outcomes: Vec<Result<User>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    let db = db.clone();
                    scope.spawn(move || register(&db, register_input("ada@example.com")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        for outcome in outcomes.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                outcome,
                Err(Error::Validation(msg)) if msg == "Email already registered"
            ));
        }
    }

    #[test]
    fn login_then_authenticate() {
        let db = db();
        let user = register(&db, register_input("ada@example.com")).unwrap();
        let session = login(
            &db,
            LoginInput {
                email: "Ada@Example.com".to_string(),
                password: "hunter2".to_string(),
            },
            Duration::hours(1),
        )
        .unwrap();

        assert_eq!(authenticate(&db, &session.token).unwrap().id, user.id);
        logout(&db, &session.token).unwrap();
        assert!(matches!(
            authenticate(&db, &session.token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_session_is_rejected() {
        let db = db();
        register(&db, register_input("ada@example.com")).unwrap();
        let session = login(
            &db,
            LoginInput {
                email: "ada@example.com".to_string(),
                password: "hunter2".to_string(),
            },
            Duration::seconds(-1),
        )
        .unwrap();

        assert!(matches!(
            authenticate(&db, &session.token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let db = db();
        register(&db, register_input("ada@example.com")).unwrap();
        let err = login(
            &db,
            LoginInput {
                email: "ada@example.com".to_string(),
                password: "nope".to_string(),
            },
            Duration::hours(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
