use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_uuid, Database};
use crate::models::{Session, User};

const USER_COLUMNS: &str = "id, email, name, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(row.get(3)?),
    })
}

impl Database {
    // ============================================================
    // User operations
    // ============================================================

    /// Insert a user. `email` is expected to be normalized by the caller.
    /// Insert a user. Returns `None` when the email is already registered.
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<String>,
    ) -> Result<Option<User>> {
        let conn = self.lock();
        let id = Uuid::new_v4();
        let now = Utc::now();

        let rows = conn.execute(
            "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(email) DO NOTHING",
            (id.to_string(), email, password_hash, &name, fmt_datetime(now)),
        )?;
        if rows == 0 {
            return Ok(None);
        }

        Ok(Some(User {
            id,
            email: email.to_string(),
            name,
            created_at: now,
        }))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                [email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// The user and their stored password hash, for login.
    pub fn get_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.lock();
        let found = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"),
                [email],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(4)?)),
            )
            .optional()?;
        Ok(found)
    }

    // ============================================================
    // Session operations
    // ============================================================

    pub fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
            (
                token,
                user_id.to_string(),
                fmt_datetime(Utc::now()),
                fmt_datetime(expires_at),
            ),
        )?;

        Ok(Session {
            token: token.to_string(),
            user_id,
            expires_at,
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.lock();
        let session = conn
            .query_row(
                "SELECT token, user_id, expires_at FROM sessions WHERE token = ?",
                [token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: parse_uuid(row.get(1)?),
                        expires_at: parse_datetime(row.get(2)?),
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
        Ok(rows > 0)
    }

    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            [fmt_datetime(now)],
        )?;
        Ok(rows)
    }
}
