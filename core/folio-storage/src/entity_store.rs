//! The entity store: durable key-value access to hierarchy records.

use crate::{StorageError, StorageResult, ROOT_INDEX_ID};
use folio_types::{
    id_list, Content, ContentStyle, EntityId, Folder, Page, RootIndex, SubscriberId, Subscription,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS folders (
    id       TEXT PRIMARY KEY,
    name     TEXT,
    page_ids TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS pages (
    id      TEXT PRIMARY KEY,
    name    TEXT,
    content TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS contents (
    id    TEXT PRIMARY KEY,
    value TEXT NOT NULL DEFAULT '',
    style TEXT NOT NULL DEFAULT 'd'
);
CREATE TABLE IF NOT EXISTS root_index (
    id         TEXT PRIMARY KEY,
    folder_ids TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS subscriptions (
    id          TEXT PRIMARY KEY,
    folders     TEXT NOT NULL DEFAULT '',
    last_active INTEGER NOT NULL DEFAULT 0
);
";

/// Durable store for folders, pages, content fragments, the root index
/// and subscription records.
///
/// Every method is synchronous from the caller's perspective: when it
/// returns `Ok`, SQLite has accepted the write. Multi-entity operations
/// are *not* transactional; the mutation engine owns that tradeoff.
pub struct EntityStore {
    conn: Mutex<Connection>,
}

impl EntityStore {
    /// Opens (or creates) the database at `path` and runs migrations.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory database. Used by tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(MIGRATIONS)
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        f(&conn)
    }

    // ── Folders ──────────────────────────────────────────────────

    /// Fetches a folder by id.
    pub fn get_folder(&self, id: &EntityId) -> StorageResult<Option<Folder>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, page_ids FROM folders WHERE id = ?1",
                params![id.to_string()],
                row_to_folder,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Fetches a folder by display name. Returns the first match.
    pub fn find_folder_by_name(&self, name: &str) -> StorageResult<Option<Folder>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, page_ids FROM folders WHERE name = ?1 LIMIT 1",
                params![name],
                row_to_folder,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Inserts or replaces a folder.
    pub fn put_folder(&self, folder: &Folder) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO folders (id, name, page_ids) VALUES (?1, ?2, ?3)",
                params![
                    folder.id.to_string(),
                    folder.name,
                    id_list::join(&folder.page_ids)
                ],
            )?;
            Ok(())
        })
    }

    /// Deletes a folder. Returns `false` when the id was already absent.
    pub fn delete_folder(&self, id: &EntityId) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM folders WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    /// Multi-get: folders in input order, absent ids skipped.
    pub fn folders_by_ids(&self, ids: &[EntityId]) -> StorageResult<Vec<Folder>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(folder) = self.get_folder(id)? {
                out.push(folder);
            }
        }
        Ok(out)
    }

    /// All folder rows. Admin surface only.
    pub fn all_folders(&self) -> StorageResult<Vec<Folder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, page_ids FROM folders")?;
            let rows = stmt.query_map([], row_to_folder)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    // ── Pages ────────────────────────────────────────────────────

    /// Fetches a page by id.
    pub fn get_page(&self, id: &EntityId) -> StorageResult<Option<Page>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, content FROM pages WHERE id = ?1",
                params![id.to_string()],
                row_to_page,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Inserts or replaces a page.
    pub fn put_page(&self, page: &Page) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pages (id, name, content) VALUES (?1, ?2, ?3)",
                params![
                    page.id.to_string(),
                    page.name,
                    id_list::join(&page.content)
                ],
            )?;
            Ok(())
        })
    }

    /// Deletes a page. Returns `false` when the id was already absent.
    pub fn delete_page(&self, id: &EntityId) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM pages WHERE id = ?1", params![id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Multi-get: pages in input order, absent ids skipped.
    pub fn pages_by_ids(&self, ids: &[EntityId]) -> StorageResult<Vec<Page>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(page) = self.get_page(id)? {
                out.push(page);
            }
        }
        Ok(out)
    }

    // ── Content fragments ────────────────────────────────────────

    /// Fetches a content fragment by id.
    pub fn get_content(&self, id: &EntityId) -> StorageResult<Option<Content>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, value, style FROM contents WHERE id = ?1",
                params![id.to_string()],
                row_to_content,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Inserts or replaces a content fragment.
    pub fn put_content(&self, content: &Content) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO contents (id, value, style) VALUES (?1, ?2, ?3)",
                params![
                    content.id.to_string(),
                    content.value,
                    content.style.as_str()
                ],
            )?;
            Ok(())
        })
    }

    /// Deletes a content fragment. Returns `false` when already absent.
    pub fn delete_content(&self, id: &EntityId) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM contents WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    /// Multi-get: content fragments in input order, absent ids skipped.
    pub fn contents_by_ids(&self, ids: &[EntityId]) -> StorageResult<Vec<Content>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(content) = self.get_content(id)? {
                out.push(content);
            }
        }
        Ok(out)
    }

    // ── Root index ───────────────────────────────────────────────

    /// Reads the singleton root index, creating an empty one on first
    /// contact.
    pub fn root_index(&self) -> StorageResult<RootIndex> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT folder_ids FROM root_index WHERE id = ?1",
                    params![ROOT_INDEX_ID],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            match existing {
                Some(encoded) => Ok(RootIndex {
                    folder_ids: parse_list(&encoded)?,
                }),
                None => {
                    debug!("creating root index on first contact");
                    conn.execute(
                        "INSERT INTO root_index (id, folder_ids) VALUES (?1, '')",
                        params![ROOT_INDEX_ID],
                    )?;
                    Ok(RootIndex::default())
                }
            }
        })
    }

    /// Replaces the root index.
    pub fn put_root_index(&self, index: &RootIndex) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO root_index (id, folder_ids) VALUES (?1, ?2)",
                params![ROOT_INDEX_ID, id_list::join(&index.folder_ids)],
            )?;
            Ok(())
        })
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Fetches a subscription record.
    pub fn get_subscription(&self, id: &SubscriberId) -> StorageResult<Option<Subscription>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, folders, last_active FROM subscriptions WHERE id = ?1",
                params![id.to_string()],
                row_to_subscription,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Inserts or replaces a subscription record.
    pub fn put_subscription(&self, sub: &Subscription) -> StorageResult<()> {
        self.with_conn(|conn| {
            let folders = sub
                .folders
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            conn.execute(
                "INSERT OR REPLACE INTO subscriptions (id, folders, last_active) \
                 VALUES (?1, ?2, ?3)",
                params![sub.id.to_string(), folders, sub.last_active],
            )?;
            Ok(())
        })
    }

    /// Refreshes a record's last-active timestamp.
    /// Returns `false` when no record exists for the id.
    pub fn touch_subscription(&self, id: &SubscriberId, now_ms: i64) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE subscriptions SET last_active = ?2 WHERE id = ?1",
                params![id.to_string(), now_ms],
            )?;
            Ok(n > 0)
        })
    }

    /// All subscription rows. Admin surface only.
    pub fn all_subscriptions(&self) -> StorageResult<Vec<Subscription>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, folders, last_active FROM subscriptions")?;
            let rows = stmt.query_map([], row_to_subscription)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Deletes records last active strictly before `cutoff_ms`.
    /// Returns the number of records removed.
    pub fn sweep_subscriptions(&self, cutoff_ms: i64) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM subscriptions WHERE last_active < ?1",
                params![cutoff_ms],
            )?;
            Ok(n)
        })
    }
}

// ── Row mapping ──────────────────────────────────────────────────

fn parse_list(encoded: &str) -> rusqlite::Result<Vec<EntityId>> {
    id_list::split(encoded).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn parse_id(raw: &str) -> rusqlite::Result<EntityId> {
    EntityId::parse(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_folder(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: parse_id(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        page_ids: parse_list(&row.get::<_, String>(2)?)?,
    })
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: parse_id(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        content: parse_list(&row.get::<_, String>(2)?)?,
    })
}

fn row_to_content(row: &Row<'_>) -> rusqlite::Result<Content> {
    let style_raw: String = row.get(2)?;
    let style: ContentStyle = style_raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{e}"))),
        )
    })?;
    Ok(Content {
        id: parse_id(&row.get::<_, String>(0)?)?,
        value: row.get(1)?,
        style,
    })
}

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let id_raw: String = row.get(0)?;
    let id = SubscriberId::parse(&id_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let folders_raw: String = row.get(1)?;
    let folders = parse_list(&folders_raw)?.into_iter().collect();
    Ok(Subscription {
        id,
        folders,
        last_active: row.get(2)?,
    })
}
