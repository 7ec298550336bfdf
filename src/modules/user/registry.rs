use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::storage::factory::StorageFactory;
use crate::modules::user::entity::{Role, User};
use crate::modules::user::session::UserSession;
use crate::raise_error;

/// Default session lifetime.
const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// User registry and session management, backed by the shared system
/// database. Registration of the very first user requires no session at
/// all and makes that user an admin; every registration after that does.
pub struct UserRegistry {
    pool: Pool<SqliteConnectionManager>,
}

impl UserRegistry {
    pub fn new(storage: &Arc<StorageFactory>) -> Self {
        Self { pool: storage.system_pool() }
    }

    fn user_count(&self) -> AppResult<i64> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| raise_error!(format!("user_count failed: {e}"), ErrorCode::InternalError))
    }

    /// First-user bootstrap: if no user exists, `requesting_admin` may be
    /// `None` and the new user becomes `Role::Admin`. Otherwise the caller
    /// must already be an authenticated admin.
    pub fn register_user(
        &self,
        email: &str,
        display_name: Option<String>,
        requesting_admin: Option<&User>,
    ) -> AppResult<User> {
        crate::modules::utils::validate_email(email)?;
        let is_first = self.user_count()? == 0;

        if !is_first {
            match requesting_admin {
                Some(admin) if matches!(admin.role, Role::Admin) => {}
                _ => {
                    return Err(raise_error!(
                        "registering additional users requires an authenticated admin session".into(),
                        ErrorCode::PermissionDenied
                    ))
                }
            }
        }

        let role = if is_first { Role::Admin } else { Role::User };
        let user = User {
            user_id: crate::new_id!(),
            email: email.to_string(),
            display_name,
            role,
            created_at: crate::utc_now!(),
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (user_id, email, display_name, role, created_at) VALUES (?1,?2,?3,?4,?5)",
            params![
                user.user_id,
                user.email,
                user.display_name,
                match user.role { Role::Admin => "admin", Role::User => "user" },
                user.created_at,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                raise_error!(format!("user already registered: {email}"), ErrorCode::AlreadyExists)
            } else {
                raise_error!(format!("register_user failed: {e}"), ErrorCode::InternalError)
            }
        })?;

        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT user_id, email, display_name, role, created_at FROM users WHERE user_id = ?1",
            params![user_id],
            row_to_user,
        )
        .optional()
        .map_err(|e| raise_error!(format!("get_user failed: {e}"), ErrorCode::InternalError))
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare("SELECT user_id, email, display_name, role, created_at FROM users ORDER BY created_at ASC")
            .map_err(|e| raise_error!(format!("list_users prepare failed: {e}"), ErrorCode::InternalError))?;
        let rows = stmt
            .query_map([], row_to_user)
            .map_err(|e| raise_error!(format!("list_users query failed: {e}"), ErrorCode::InternalError))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| raise_error!(format!("row decode failed: {e}"), ErrorCode::InternalError))?);
        }
        Ok(out)
    }

    pub fn create_session(&self, user_id: &str, ip: Option<String>, agent: Option<String>) -> AppResult<UserSession> {
        let now = crate::utc_now!();
        let session = UserSession {
            session_id: crate::new_id!(),
            user_id: user_id.to_string(),
            created: now,
            expires: now + SESSION_TTL_MS,
            last_accessed: now,
            ip,
            agent,
        };
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO sessions (session_id, user_id, created_at, expires_at, last_accessed, ip, agent) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![session.session_id, session.user_id, session.created, session.expires, session.last_accessed, session.ip, session.agent],
        )
        .map_err(|e| raise_error!(format!("create_session failed: {e}"), ErrorCode::InternalError))?;
        Ok(session)
    }

    /// Validates and touches `last_accessed`. Expired sessions are treated
    /// as `SessionExpired`, not silently extended.
    pub fn validate_session(&self, session_id: &str) -> AppResult<UserSession> {
        let conn = self.pool.get()?;
        let session: Option<UserSession> = conn
            .query_row(
                "SELECT session_id, user_id, created_at, expires_at, last_accessed, ip, agent FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(UserSession {
                        session_id: row.get(0)?,
                        user_id: row.get(1)?,
                        created: row.get(2)?,
                        expires: row.get(3)?,
                        last_accessed: row.get(4)?,
                        ip: row.get(5)?,
                        agent: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|e| raise_error!(format!("validate_session failed: {e}"), ErrorCode::InternalError))?;

        let session = session.ok_or_else(|| raise_error!("session not found".into(), ErrorCode::Unauthenticated))?;
        let now = crate::utc_now!();
        if !session.is_valid(now) {
            return Err(raise_error!("session expired".into(), ErrorCode::SessionExpired));
        }
        conn.execute(
            "UPDATE sessions SET last_accessed = ?2 WHERE session_id = ?1",
            params![session_id, now],
        )
        .map_err(|e| raise_error!(format!("touch session failed: {e}"), ErrorCode::InternalError))?;
        Ok(session)
    }

    /// `switch_user` for an admin session operating on behalf of another
    /// user - returns a fresh session for the target user.
    pub fn switch_user(&self, admin: &User, target_user_id: &str) -> AppResult<UserSession> {
        if !matches!(admin.role, Role::Admin) {
            return Err(raise_error!("switch_user requires an admin session".into(), ErrorCode::PermissionDenied));
        }
        self.get_user(target_user_id)?
            .ok_or_else(|| raise_error!(format!("user not found: {target_user_id}"), ErrorCode::ResourceNotFound))?;
        self.create_session(target_user_id, None, None)
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        user_id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: if role == "admin" { Role::Admin } else { Role::User },
        created_at: row.get(4)?,
    })
}
