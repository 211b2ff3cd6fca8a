use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::db::models::{Item, PublicUser};
use crate::db::now_ts;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Fields accepted when creating or updating an item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub location: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub reserved: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: u32,
    pub size: u32,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: String,
    pub sort_dir: String,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            category: None,
            search: None,
            sort_by: "createdAt".to_string(),
            sort_dir: "desc".to_string(),
        }
    }
}

/// Map the caller-supplied sort field onto a real column. Anything
/// unknown falls back to created_at; never interpolate raw input.
fn sort_column(sort_by: &str) -> &'static str {
    match sort_by {
        "name" => "i.name",
        "category" => "i.category",
        "updatedAt" => "i.updated_at",
        _ => "i.created_at",
    }
}

const ITEM_COLS: &str = "i.id, i.name, i.description, i.category, i.location, i.reserved, \
     i.created_at, i.updated_at, u.id, u.username, u.email";

fn item_from_row(row: &Row) -> Result<Item, rusqlite::Error> {
    let user = match row.get::<_, Option<i64>>(8)? {
        Some(id) => Some(PublicUser {
            id,
            username: row.get(9)?,
            email: row.get(10)?,
        }),
        None => None,
    };
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        location: row.get(4)?,
        reserved: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        image_urls: Vec::new(),
        user,
    })
}

fn load_images(conn: &Connection, item_id: i64) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT image_url FROM item_images WHERE item_id = ?1 ORDER BY position",
    )?;
    let urls = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(urls)
}

fn replace_images(conn: &Connection, item_id: i64, urls: &[String]) -> Result<(), rusqlite::Error> {
    conn.execute(
        "DELETE FROM item_images WHERE item_id = ?1",
        params![item_id],
    )?;
    for (position, url) in urls.iter().enumerate() {
        conn.execute(
            "INSERT INTO item_images (item_id, image_url, position) VALUES (?1, ?2, ?3)",
            params![item_id, url, position as i64],
        )?;
    }
    Ok(())
}

/// Owner of an item, or NotFound when the item does not exist.
fn owner_of(conn: &Connection, item_id: i64) -> AppResult<Option<i64>> {
    conn.query_row(
        "SELECT user_id FROM items WHERE id = ?1",
        params![item_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Paginated listing with optional category / name-substring filters.
/// Returns the page of items plus the total matching count.
pub fn list(pool: &DbPool, params: &ListParams) -> AppResult<(Vec<Item>, i64)> {
    let conn = pool.get()?;

    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    if let Some(ref category) = params.category {
        clauses.push("i.category = ?");
        args.push(category.clone());
    }
    if let Some(ref search) = params.search {
        clauses.push("LOWER(i.name) LIKE '%' || LOWER(?) || '%'");
        args.push(search.clone());
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM items i{where_sql}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let dir = if params.sort_dir.eq_ignore_ascii_case("asc") {
        "ASC"
    } else {
        "DESC"
    };
    let sql = format!(
        "SELECT {ITEM_COLS} FROM items i LEFT JOIN users u ON u.id = i.user_id{where_sql} \
         ORDER BY {} {dir}, i.id {dir} LIMIT {} OFFSET {}",
        sort_column(&params.sort_by),
        params.size,
        params.page as i64 * params.size as i64,
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut items = stmt
        .query_map(params_from_iter(args.iter()), item_from_row)?
        .collect::<Result<Vec<Item>, _>>()?;
    for item in &mut items {
        item.image_urls = load_images(&conn, item.id)?;
    }
    Ok((items, total))
}

pub fn get(pool: &DbPool, id: i64) -> AppResult<Option<Item>> {
    let conn = pool.get()?;
    let item = conn
        .query_row(
            &format!(
                "SELECT {ITEM_COLS} FROM items i LEFT JOIN users u ON u.id = i.user_id \
                 WHERE i.id = ?1"
            ),
            params![id],
            item_from_row,
        )
        .optional()?;
    match item {
        Some(mut item) => {
            item.image_urls = load_images(&conn, item.id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Insert a new item owned by `owner_id`. Both timestamps are stamped
/// to the same instant; `reserved` defaults to false when absent.
pub fn create(pool: &DbPool, owner_id: i64, input: &ItemInput) -> AppResult<Item> {
    let mut conn = pool.get()?;
    let now = now_ts();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO items (name, description, category, location, reserved, user_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.name,
            input.description,
            input.category,
            input.location,
            input.reserved.unwrap_or(false),
            owner_id,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();
    if !input.image_urls.is_empty() {
        replace_images(&tx, id, &input.image_urls)?;
    }
    tx.commit()?;
    // Release before re-reading through the pool
    drop(conn);

    get(pool, id)?.ok_or(AppError::NotFound)
}

/// Overwrite an item's fields. The ownership check runs before any
/// mutation; images are only replaced when the incoming list is
/// non-empty.
pub fn update(pool: &DbPool, id: i64, caller_id: i64, input: &ItemInput) -> AppResult<Item> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    if let Some(owner) = owner_of(&tx, id)? {
        if owner != caller_id {
            return Err(AppError::Forbidden(
                "You don't have permission to update this item".into(),
            ));
        }
    }

    tx.execute(
        "UPDATE items SET name = ?1, description = ?2, category = ?3, location = ?4, \
         reserved = ?5, updated_at = ?6 WHERE id = ?7",
        params![
            input.name,
            input.description,
            input.category,
            input.location,
            input.reserved.unwrap_or(false),
            now_ts(),
            id,
        ],
    )?;
    if !input.image_urls.is_empty() {
        replace_images(&tx, id, &input.image_urls)?;
    }
    tx.commit()?;
    // Release before re-reading through the pool
    drop(conn);

    get(pool, id)?.ok_or(AppError::NotFound)
}

/// Delete an item and everything hanging off it. Comments and image
/// rows go in the same transaction; there is no ORM cascade to rely on.
pub fn delete(pool: &DbPool, id: i64, caller_id: i64) -> AppResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    if let Some(owner) = owner_of(&tx, id)? {
        if owner != caller_id {
            return Err(AppError::Forbidden(
                "You don't have permission to delete this item".into(),
            ));
        }
    }

    tx.execute("DELETE FROM comments WHERE item_id = ?1", params![id])?;
    tx.execute("DELETE FROM item_images WHERE item_id = ?1", params![id])?;
    tx.execute("DELETE FROM items WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(())
}

/// All items owned by a user, newest first, unpaginated.
pub fn by_owner(pool: &DbPool, user_id: i64) -> AppResult<Vec<Item>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLS} FROM items i LEFT JOIN users u ON u.id = i.user_id \
         WHERE i.user_id = ?1 ORDER BY i.created_at DESC, i.id DESC"
    ))?;
    let mut items = stmt
        .query_map(params![user_id], item_from_row)?
        .collect::<Result<Vec<Item>, _>>()?;
    for item in &mut items {
        item.image_urls = load_images(&conn, item.id)?;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{comments, test_pool, users};

    fn seed_user(pool: &DbPool, name: &str) -> i64 {
        users::create(pool, name, &format!("{name}@example.org"), "hash").unwrap()
    }

    fn input(name: &str, category: &str) -> ItemInput {
        ItemInput {
            name: name.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_sets_owner_and_defaults() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");

        let item = create(&pool, alice, &input("Bike", "sports")).unwrap();
        assert_eq!(item.name, "Bike");
        assert!(!item.reserved);
        assert_eq!(item.user.as_ref().unwrap().id, alice);
        assert_eq!(item.created_at, item.updated_at);
        assert!(item.image_urls.is_empty());
    }

    #[test]
    fn get_missing_item_returns_none() {
        let pool = test_pool();
        assert!(get(&pool, 99).unwrap().is_none());
    }

    #[test]
    fn update_advances_updated_at_strictly() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let item = create(&pool, alice, &input("Bike", "sports")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let updated = update(&pool, item.id, alice, &input("Bike", "sports")).unwrap();
        assert!(updated.updated_at > item.updated_at);
        assert_eq!(updated.created_at, item.created_at);
    }

    #[test]
    fn update_by_non_owner_is_forbidden() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let bob = seed_user(&pool, "bob");
        let item = create(&pool, alice, &input("Bike", "sports")).unwrap();

        let err = update(&pool, item.id, bob, &input("Stolen", "sports")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Untouched
        assert_eq!(get(&pool, item.id).unwrap().unwrap().name, "Bike");
    }

    #[test]
    fn update_missing_item_is_not_found() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let err = update(&pool, 42, alice, &input("x", "y")).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn empty_image_list_preserves_stored_images() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let mut with_images = input("Bike", "sports");
        with_images.image_urls = vec!["/api/upload/images/a.png".into()];
        let item = create(&pool, alice, &with_images).unwrap();
        assert_eq!(item.image_urls.len(), 1);

        let updated = update(&pool, item.id, alice, &input("Bike", "sports")).unwrap();
        assert_eq!(updated.image_urls, vec!["/api/upload/images/a.png"]);
    }

    #[test]
    fn non_empty_image_list_replaces_stored_images() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let mut first = input("Bike", "sports");
        first.image_urls = vec!["/api/upload/images/a.png".into()];
        let item = create(&pool, alice, &first).unwrap();

        let mut second = input("Bike", "sports");
        second.image_urls = vec![
            "/api/upload/images/b.png".into(),
            "/api/upload/images/c.png".into(),
        ];
        let updated = update(&pool, item.id, alice, &second).unwrap();
        assert_eq!(
            updated.image_urls,
            vec!["/api/upload/images/b.png", "/api/upload/images/c.png"]
        );
    }

    #[test]
    fn delete_cascades_to_comments_and_images() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let mut with_images = input("Bike", "sports");
        with_images.image_urls = vec!["/api/upload/images/a.png".into()];
        let item = create(&pool, alice, &with_images).unwrap();
        comments::create(&pool, item.id, alice, "nice bike").unwrap();

        delete(&pool, item.id, alice).unwrap();
        assert!(get(&pool, item.id).unwrap().is_none());

        let conn = pool.get().unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM comments WHERE item_id = ?1",
                params![item.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        let images: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM item_images WHERE item_id = ?1",
                params![item.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(images, 0);
    }

    #[test]
    fn delete_by_non_owner_is_forbidden() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let bob = seed_user(&pool, "bob");
        let item = create(&pool, alice, &input("Bike", "sports")).unwrap();

        let err = delete(&pool, item.id, bob).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(get(&pool, item.id).unwrap().is_some());
    }

    #[test]
    fn delete_missing_item_is_not_found() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        assert!(matches!(
            delete(&pool, 42, alice).unwrap_err(),
            AppError::NotFound
        ));
    }

    #[test]
    fn list_pages_and_counts() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        for n in 0..7 {
            create(&pool, alice, &input(&format!("Item {n}"), "misc")).unwrap();
        }

        let params = ListParams {
            size: 3,
            ..Default::default()
        };
        let (page0, total) = list(&pool, &params).unwrap();
        assert_eq!(total, 7);
        assert_eq!(page0.len(), 3);

        let (page2, _) = list(
            &pool,
            &ListParams {
                page: 2,
                size: 3,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[test]
    fn list_default_order_is_newest_first() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let first = create(&pool, alice, &input("Old", "misc")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = create(&pool, alice, &input("New", "misc")).unwrap();

        let (items, _) = list(&pool, &ListParams::default()).unwrap();
        assert_eq!(items[0].id, second.id);
        assert_eq!(items[1].id, first.id);

        let (asc, _) = list(
            &pool,
            &ListParams {
                sort_dir: "asc".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(asc[0].id, first.id);
    }

    #[test]
    fn category_and_search_filters_are_conjunctive() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        create(&pool, alice, &input("Mountain Bike", "sports")).unwrap();
        create(&pool, alice, &input("Racing Bike", "sports")).unwrap();
        create(&pool, alice, &input("Bike Bell", "accessories")).unwrap();
        create(&pool, alice, &input("Football", "sports")).unwrap();

        let (by_category, total) = list(
            &pool,
            &ListParams {
                category: Some("sports".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 3);
        assert!(by_category.iter().all(|i| i.category == "sports"));

        let (by_search, total) = list(
            &pool,
            &ListParams {
                search: Some("bike".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 3);
        assert!(by_search
            .iter()
            .all(|i| i.name.to_lowercase().contains("bike")));

        let (both, total) = list(
            &pool,
            &ListParams {
                category: Some("sports".into()),
                search: Some("bike".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 2);
        assert!(both
            .iter()
            .all(|i| i.category == "sports" && i.name.to_lowercase().contains("bike")));
    }

    #[test]
    fn unknown_sort_field_falls_back_to_created_at() {
        assert_eq!(sort_column("createdAt"), "i.created_at");
        assert_eq!(sort_column("name"), "i.name");
        assert_eq!(sort_column("'; DROP TABLE items; --"), "i.created_at");
    }

    #[test]
    fn by_owner_returns_only_callers_items() {
        let pool = test_pool();
        let alice = seed_user(&pool, "alice");
        let bob = seed_user(&pool, "bob");
        create(&pool, alice, &input("Bike", "sports")).unwrap();
        create(&pool, bob, &input("Chair", "furniture")).unwrap();

        let mine = by_owner(&pool, alice).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Bike");
    }
}
