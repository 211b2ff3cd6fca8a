use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::User;
use crate::error::AppResult;
use crate::state::DbPool;

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

const USER_COLS: &str = "id, username, email, password_hash, created_at";

pub fn create(pool: &DbPool, username: &str, email: &str, password_hash: &str) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(pool: &DbPool, id: i64) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn username_taken(pool: &DbPool, username: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn email_taken(pool: &DbPool, email: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn create_and_find_roundtrip() {
        let pool = test_pool();
        let id = create(&pool, "alice", "alice@example.org", "hash").unwrap();

        let by_id = find_by_id(&pool, id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.email, "alice@example.org");
        assert_eq!(by_id.password_hash, "hash");

        let by_name = find_by_username(&pool, "alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
    }

    #[test]
    fn find_missing_user_returns_none() {
        let pool = test_pool();
        assert!(find_by_id(&pool, 42).unwrap().is_none());
        assert!(find_by_username(&pool, "nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let pool = test_pool();
        create(&pool, "alice", "a@example.org", "hash").unwrap();
        assert!(create(&pool, "alice", "b@example.org", "hash").is_err());
    }

    #[test]
    fn taken_checks() {
        let pool = test_pool();
        create(&pool, "alice", "alice@example.org", "hash").unwrap();
        assert!(username_taken(&pool, "alice").unwrap());
        assert!(!username_taken(&pool, "bob").unwrap());
        assert!(email_taken(&pool, "alice@example.org").unwrap());
        assert!(!email_taken(&pool, "bob@example.org").unwrap());
    }
}
