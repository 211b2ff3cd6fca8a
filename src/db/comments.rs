use rusqlite::params;

use crate::db::models::{Comment, PublicUser};
use crate::db::now_ts;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn item_exists(pool: &DbPool, item_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM items WHERE id = ?1",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Comments for an item, newest first. NotFound when the item itself
/// does not exist.
pub fn for_item(pool: &DbPool, item_id: i64) -> AppResult<Vec<Comment>> {
    if !item_exists(pool, item_id)? {
        return Err(AppError::NotFound);
    }

    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.text, c.created_at, u.id, u.username, u.email \
         FROM comments c JOIN users u ON u.id = c.user_id \
         WHERE c.item_id = ?1 ORDER BY c.created_at DESC, c.id DESC",
    )?;
    let comments = stmt
        .query_map(params![item_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                text: row.get(1)?,
                created_at: row.get(2)?,
                user: Some(PublicUser {
                    id: row.get(3)?,
                    username: row.get(4)?,
                    email: row.get(5)?,
                }),
            })
        })?
        .collect::<Result<Vec<Comment>, _>>()?;
    Ok(comments)
}

/// Attach a comment to an item. NotFound when the parent item is gone.
pub fn create(pool: &DbPool, item_id: i64, user_id: i64, text: &str) -> AppResult<Comment> {
    if !item_exists(pool, item_id)? {
        return Err(AppError::NotFound);
    }

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO comments (item_id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![item_id, user_id, text, now_ts()],
    )?;
    let id = conn.last_insert_rowid();

    let comment = conn.query_row(
        "SELECT c.id, c.text, c.created_at, u.id, u.username, u.email \
         FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?1",
        params![id],
        |row| {
            Ok(Comment {
                id: row.get(0)?,
                text: row.get(1)?,
                created_at: row.get(2)?,
                user: Some(PublicUser {
                    id: row.get(3)?,
                    username: row.get(4)?,
                    email: row.get(5)?,
                }),
            })
        },
    )?;
    Ok(comment)
}
