//! SQLite-backed record store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{
    CatalogEntry, CatalogEntryPatch, CatalogStatus, Document, DownloadStatus, DownloadUrl,
    DownloadUrlUpdate, LinkKind, NewCatalogEntry, NewDocument, NewTransferLog, PreviewDetail,
    RecordStore, StoreError, TransferLog, TransferLogPatch, TransferStatus,
};

const DOCUMENT_COLUMNS: &str = "id, title, description, image_refs, catalog_code, created_at";

const DOWNLOAD_URL_COLUMNS: &str = "id, document_id, url, hash, status, preview_detail, \
     linked_catalog_entry_ids, kind, submitted_at, version, updated_at";

const CATALOG_COLUMNS: &str =
    "id, code, title, status, detail, magnets, library_ref, added_at, created_at, updated_at";

const TRANSFER_LOG_COLUMNS: &str =
    "id, source_path, destination_path, status, title, code, error, created_at, completed_at";

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                image_refs TEXT NOT NULL,
                catalog_code TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS download_urls (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                position INTEGER NOT NULL,
                url TEXT NOT NULL,
                hash TEXT NOT NULL,
                status TEXT NOT NULL,
                preview_detail TEXT,
                linked_catalog_entry_ids TEXT NOT NULL,
                kind TEXT,
                submitted_at TEXT,
                version INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_download_urls_url ON download_urls(url);
            CREATE INDEX IF NOT EXISTS idx_download_urls_hash ON download_urls(hash);
            CREATE INDEX IF NOT EXISTS idx_download_urls_status ON download_urls(status);
            CREATE INDEX IF NOT EXISTS idx_download_urls_document ON download_urls(document_id, position);

            CREATE TABLE IF NOT EXISTS catalog_entries (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE COLLATE NOCASE,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                detail TEXT,
                magnets TEXT NOT NULL,
                library_ref TEXT,
                added_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transfer_logs (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                destination_path TEXT,
                status TEXT NOT NULL,
                title TEXT NOT NULL,
                code TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_transfer_logs_created_at ON transfer_logs(created_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let image_refs_json: String = row.get(3)?;
        let created_at_str: String = row.get(5)?;

        Ok(Document {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            image_refs: serde_json::from_str(&image_refs_json).unwrap_or_default(),
            catalog_code: row.get(4)?,
            download_urls: Vec::new(),
            created_at: parse_timestamp(&created_at_str),
        })
    }

    fn row_to_download_url(row: &rusqlite::Row) -> rusqlite::Result<DownloadUrl> {
        let status_str: String = row.get(4)?;
        let preview_json: Option<String> = row.get(5)?;
        let linked_json: String = row.get(6)?;
        let kind_str: Option<String> = row.get(7)?;
        let submitted_at_str: Option<String> = row.get(8)?;
        let updated_at_str: String = row.get(10)?;

        Ok(DownloadUrl {
            id: row.get(0)?,
            document_id: row.get(1)?,
            url: row.get(2)?,
            hash: row.get(3)?,
            status: DownloadStatus::parse(&status_str).unwrap_or(DownloadStatus::Error),
            preview_detail: preview_json
                .and_then(|json| serde_json::from_str::<PreviewDetail>(&json).ok()),
            linked_catalog_entry_ids: serde_json::from_str(&linked_json).unwrap_or_default(),
            kind: kind_str.as_deref().and_then(LinkKind::parse),
            submitted_at: submitted_at_str.as_deref().map(parse_timestamp),
            version: row.get(9)?,
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn row_to_catalog_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
        let status_str: String = row.get(3)?;
        let detail_json: Option<String> = row.get(4)?;
        let magnets_json: String = row.get(5)?;
        let added_at_str: Option<String> = row.get(7)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        Ok(CatalogEntry {
            id: row.get(0)?,
            code: row.get(1)?,
            title: row.get(2)?,
            status: CatalogStatus::parse(&status_str).unwrap_or(CatalogStatus::Uncheck),
            detail: detail_json.and_then(|json| serde_json::from_str(&json).ok()),
            magnets: serde_json::from_str(&magnets_json).unwrap_or_default(),
            library_ref: row.get(6)?,
            added_at: added_at_str.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn row_to_transfer_log(row: &rusqlite::Row) -> rusqlite::Result<TransferLog> {
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(7)?;
        let completed_at_str: Option<String> = row.get(8)?;

        Ok(TransferLog {
            id: row.get(0)?,
            source_path: row.get(1)?,
            destination_path: row.get(2)?,
            status: TransferStatus::parse(&status_str).unwrap_or(TransferStatus::Failure),
            title: row.get(4)?,
            code: row.get(5)?,
            error: row.get(6)?,
            created_at: parse_timestamp(&created_at_str),
            completed_at: completed_at_str.as_deref().map(parse_timestamp),
        })
    }

    fn load_download_urls(
        conn: &Connection,
        document_id: &str,
    ) -> Result<Vec<DownloadUrl>, StoreError> {
        let sql = format!(
            "SELECT {} FROM download_urls WHERE document_id = ? ORDER BY position ASC",
            DOWNLOAD_URL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![document_id], Self::row_to_download_url)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_download_url(conn: &Connection, id: &str) -> Result<Option<DownloadUrl>, StoreError> {
        let sql = format!("SELECT {} FROM download_urls WHERE id = ?", DOWNLOAD_URL_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_download_url)
            .optional()?)
    }

    fn query_catalog_entry(conn: &Connection, id: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let sql = format!("SELECT {} FROM catalog_entries WHERE id = ?", CATALOG_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_catalog_entry)
            .optional()?)
    }

    fn query_transfer_log(conn: &Connection, id: &str) -> Result<Option<TransferLog>, StoreError> {
        let sql = format!("SELECT {} FROM transfer_logs WHERE id = ?", TRANSFER_LOG_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_transfer_log)
            .optional()?)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl RecordStore for SqliteRecordStore {
    fn find_by_canonical_urls(&self, urls: &[String]) -> Result<Vec<DownloadUrl>, StoreError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM download_urls WHERE url IN ({})",
            DOWNLOAD_URL_COLUMNS,
            placeholders(urls.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(urls.iter()), Self::row_to_download_url)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        tx.execute(
            "INSERT INTO documents (id, title, description, image_refs, catalog_code, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                document_id,
                document.title,
                document.description,
                to_json(&document.image_refs)?,
                document.catalog_code,
                now.to_rfc3339(),
            ],
        )?;

        let mut download_urls = Vec::with_capacity(document.links.len());
        for (position, link) in document.links.into_iter().enumerate() {
            let id = uuid::Uuid::new_v4().to_string();
            let preview_json = link.preview_detail.as_ref().map(to_json).transpose()?;

            tx.execute(
                "INSERT INTO download_urls (id, document_id, position, url, hash, status, preview_detail, linked_catalog_entry_ids, kind, submitted_at, version, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?)",
                params![
                    id,
                    document_id,
                    position as i64,
                    link.url,
                    link.hash,
                    DownloadStatus::Undownload.as_str(),
                    preview_json,
                    to_json(&link.linked_catalog_entry_ids)?,
                    link.kind.map(|k| k.as_str()),
                    now.to_rfc3339(),
                ],
            )?;

            download_urls.push(DownloadUrl {
                id,
                document_id: document_id.clone(),
                url: link.url,
                hash: link.hash,
                status: DownloadStatus::Undownload,
                preview_detail: link.preview_detail,
                linked_catalog_entry_ids: link.linked_catalog_entry_ids,
                kind: link.kind,
                submitted_at: None,
                version: 0,
                updated_at: now,
            });
        }

        tx.commit()?;

        Ok(Document {
            id: document_id,
            title: document.title,
            description: document.description,
            image_refs: document.image_refs,
            catalog_code: document.catalog_code,
            download_urls,
            created_at: now,
        })
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;

        let sql = format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS);
        let document = conn
            .query_row(&sql, params![id], Self::row_to_document)
            .optional()?;

        match document {
            Some(mut document) => {
                document.download_urls = Self::load_download_urls(&conn, &document.id)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    fn list_documents_with_unsubmitted_links(&self, limit: i64) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM documents WHERE id IN (SELECT document_id FROM download_urls WHERE status = ? AND submitted_at IS NULL) ORDER BY created_at ASC LIMIT ?",
            DOCUMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![DownloadStatus::Undownload.as_str(), limit],
            Self::row_to_document,
        )?;
        let mut documents = rows.collect::<Result<Vec<_>, _>>()?;

        for document in &mut documents {
            document.download_urls = Self::load_download_urls(&conn, &document.id)?;
        }
        Ok(documents)
    }

    fn get_download_url(&self, id: &str) -> Result<Option<DownloadUrl>, StoreError> {
        let conn = self.lock()?;
        Self::query_download_url(&conn, id)
    }

    fn list_download_urls_by_status(
        &self,
        statuses: &[DownloadStatus],
    ) -> Result<Vec<DownloadUrl>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM download_urls WHERE status IN ({}) ORDER BY updated_at ASC",
            DOWNLOAD_URL_COLUMNS,
            placeholders(statuses.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(statuses.iter().map(|s| s.as_str())),
            Self::row_to_download_url,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_download_url_status(
        &self,
        id: &str,
        expected_version: i64,
        update: DownloadUrlUpdate,
    ) -> Result<DownloadUrl, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();

        let changed = conn.execute(
            "UPDATE download_urls SET status = ?, submitted_at = COALESCE(?, submitted_at), version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
            params![
                update.status.as_str(),
                update.submitted_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
                id,
                expected_version,
            ],
        )?;

        if changed == 0 {
            return match Self::query_download_url(&conn, id)? {
                Some(_) => Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected: expected_version,
                }),
                None => Err(StoreError::NotFound(id.to_string())),
            };
        }

        Self::query_download_url(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn create_catalog_entry(&self, entry: NewCatalogEntry) -> Result<CatalogEntry, StoreError> {
        let conn = self.lock()?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM catalog_entries WHERE code = ?",
                params![entry.code],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::AlreadyExists(entry.code));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO catalog_entries (id, code, title, status, detail, magnets, library_ref, added_at, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, '[]', NULL, NULL, ?, ?)",
            params![
                id,
                entry.code,
                entry.title,
                entry.status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(CatalogEntry {
            id,
            code: entry.code,
            title: entry.title,
            status: entry.status,
            detail: None,
            magnets: Vec::new(),
            library_ref: None,
            added_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_catalog_entry(&self, id: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let conn = self.lock()?;
        Self::query_catalog_entry(&conn, id)
    }

    fn find_catalog_entry_by_code(&self, code: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let conn = self.lock()?;

        let sql = format!("SELECT {} FROM catalog_entries WHERE code = ?", CATALOG_COLUMNS);
        Ok(conn
            .query_row(&sql, params![code.trim()], Self::row_to_catalog_entry)
            .optional()?)
    }

    fn list_catalog_entries(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM catalog_entries ORDER BY created_at ASC",
            CATALOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_catalog_entry)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_catalog_entry(
        &self,
        id: &str,
        patch: CatalogEntryPatch,
    ) -> Result<CatalogEntry, StoreError> {
        let conn = self.lock()?;

        let current = Self::query_catalog_entry(&conn, id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let now = Utc::now();
        let updated = CatalogEntry {
            status: patch.status.unwrap_or(current.status),
            library_ref: match patch.library_ref {
                Some(value) => value,
                None => current.library_ref.clone(),
            },
            added_at: patch.added_at.or(current.added_at),
            updated_at: now,
            ..current
        };

        conn.execute(
            "UPDATE catalog_entries SET status = ?, library_ref = ?, added_at = ?, updated_at = ? WHERE id = ?",
            params![
                updated.status.as_str(),
                updated.library_ref,
                updated.added_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
                id,
            ],
        )?;

        Ok(updated)
    }

    fn create_transfer_log(&self, log: NewTransferLog) -> Result<TransferLog, StoreError> {
        let conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO transfer_logs (id, source_path, destination_path, status, title, code, error, created_at, completed_at) VALUES (?, ?, NULL, ?, ?, ?, NULL, ?, NULL)",
            params![
                id,
                log.source_path,
                TransferStatus::Processing.as_str(),
                log.title,
                log.code,
                now.to_rfc3339(),
            ],
        )?;

        Ok(TransferLog {
            id,
            source_path: log.source_path,
            destination_path: None,
            status: TransferStatus::Processing,
            title: log.title,
            code: log.code,
            error: None,
            created_at: now,
            completed_at: None,
        })
    }

    fn get_transfer_log(&self, id: &str) -> Result<Option<TransferLog>, StoreError> {
        let conn = self.lock()?;
        Self::query_transfer_log(&conn, id)
    }

    fn list_transfer_logs(&self, limit: i64) -> Result<Vec<TransferLog>, StoreError> {
        let conn = self.lock()?;

        let sql = format!(
            "SELECT {} FROM transfer_logs ORDER BY created_at DESC LIMIT ?",
            TRANSFER_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], Self::row_to_transfer_log)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_transfer_log(
        &self,
        id: &str,
        patch: TransferLogPatch,
    ) -> Result<TransferLog, StoreError> {
        let conn = self.lock()?;

        let current = Self::query_transfer_log(&conn, id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if current.status.is_terminal() {
            return Err(StoreError::InvalidState {
                id: id.to_string(),
                current: current.status.as_str().to_string(),
                operation: "finalize".to_string(),
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE transfer_logs SET status = ?, destination_path = ?, error = ?, completed_at = ? WHERE id = ?",
            params![
                patch.status.as_str(),
                patch.destination_path,
                patch.error,
                now.to_rfc3339(),
                id,
            ],
        )?;

        Ok(TransferLog {
            status: patch.status,
            destination_path: patch.destination_path,
            error: patch.error,
            completed_at: Some(now),
            ..current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewDownloadUrl;

    fn create_test_store() -> SqliteRecordStore {
        SqliteRecordStore::in_memory().unwrap()
    }

    fn link(hash_char: char) -> NewDownloadUrl {
        let hash: String = std::iter::repeat(hash_char).take(40).collect();
        NewDownloadUrl {
            url: format!("magnet:?xt=urn:btih:{}", hash),
            hash,
            preview_detail: None,
            linked_catalog_entry_ids: vec![],
            kind: Some(LinkKind::Generic),
        }
    }

    fn document(links: Vec<NewDownloadUrl>) -> NewDocument {
        NewDocument {
            title: "Test batch".to_string(),
            description: None,
            image_refs: vec!["https://img.example/1.jpg".to_string()],
            catalog_code: None,
            links,
        }
    }

    #[test]
    fn test_create_document_persists_links_in_order() {
        let store = create_test_store();

        let created = store
            .create_document(document(vec![link('a'), link('b')]))
            .unwrap();
        assert_eq!(created.download_urls.len(), 2);

        let fetched = store.get_document(&created.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Test batch");
        assert_eq!(fetched.image_refs, created.image_refs);
        assert_eq!(fetched.download_urls[0].hash, "a".repeat(40));
        assert_eq!(fetched.download_urls[1].hash, "b".repeat(40));
        assert!(fetched
            .download_urls
            .iter()
            .all(|u| u.status == DownloadStatus::Undownload && u.version == 0));
    }

    #[test]
    fn test_find_by_canonical_urls() {
        let store = create_test_store();
        store.create_document(document(vec![link('a')])).unwrap();

        let hits = store
            .find_by_canonical_urls(&[
                format!("magnet:?xt=urn:btih:{}", "a".repeat(40)),
                format!("magnet:?xt=urn:btih:{}", "c".repeat(40)),
            ])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.find_by_canonical_urls(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_preview_detail_survives_storage() {
        let store = create_test_store();
        let mut with_preview = link('d');
        with_preview.preview_detail = Some(PreviewDetail {
            name: "Some.Release".to_string(),
            total_size_bytes: 1_500_000_000,
            file_count: 3,
            kind: crate::store::PreviewKind::Folder,
            screenshots: vec![],
        });

        let created = store.create_document(document(vec![with_preview])).unwrap();
        let url = store
            .get_download_url(&created.download_urls[0].id)
            .unwrap()
            .unwrap();
        assert_eq!(url.preview_detail.unwrap().file_count, 3);
    }

    #[test]
    fn test_update_download_url_bumps_version() {
        let store = create_test_store();
        let created = store.create_document(document(vec![link('a')])).unwrap();
        let url = &created.download_urls[0];

        let now = Utc::now();
        let updated = store
            .update_download_url_status(&url.id, 0, DownloadUrlUpdate::submitted(now))
            .unwrap();
        assert_eq!(updated.status, DownloadStatus::Downloading);
        assert_eq!(updated.version, 1);
        assert!(updated.submitted_at.is_some());

        let again = store
            .update_download_url_status(
                &url.id,
                1,
                DownloadUrlUpdate::status(DownloadStatus::Downloaded),
            )
            .unwrap();
        assert_eq!(again.version, 2);
        // submitted_at is kept when the update does not carry one
        assert!(again.submitted_at.is_some());
    }

    #[test]
    fn test_update_download_url_with_stale_version_conflicts() {
        let store = create_test_store();
        let created = store.create_document(document(vec![link('a')])).unwrap();
        let id = created.download_urls[0].id.clone();

        store
            .update_download_url_status(&id, 0, DownloadUrlUpdate::status(DownloadStatus::Paused))
            .unwrap();

        let result =
            store.update_download_url_status(&id, 0, DownloadUrlUpdate::status(DownloadStatus::Error));
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let result = store.update_download_url_status(
            "missing",
            0,
            DownloadUrlUpdate::status(DownloadStatus::Error),
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_documents_with_unsubmitted_links() {
        let store = create_test_store();
        let pending = store.create_document(document(vec![link('a')])).unwrap();
        let submitted = store.create_document(document(vec![link('b')])).unwrap();
        let regressed = store.create_document(document(vec![link('c')])).unwrap();

        store
            .update_download_url_status(
                &submitted.download_urls[0].id,
                0,
                DownloadUrlUpdate::submitted(Utc::now()),
            )
            .unwrap();

        // submitted, then reset by a sweep: keeps its submitted_at
        let link_id = &regressed.download_urls[0].id;
        store
            .update_download_url_status(link_id, 0, DownloadUrlUpdate::submitted(Utc::now()))
            .unwrap();
        store
            .update_download_url_status(
                link_id,
                1,
                DownloadUrlUpdate::status(DownloadStatus::Undownload),
            )
            .unwrap();

        let documents = store.list_documents_with_unsubmitted_links(10).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, pending.id);
        assert_eq!(documents[0].download_urls.len(), 1);
    }

    #[test]
    fn test_list_download_urls_by_status() {
        let store = create_test_store();
        let created = store
            .create_document(document(vec![link('a'), link('b')]))
            .unwrap();
        store
            .update_download_url_status(
                &created.download_urls[0].id,
                0,
                DownloadUrlUpdate::submitted(Utc::now()),
            )
            .unwrap();

        let tracked = store
            .list_download_urls_by_status(&DownloadStatus::TRACKED)
            .unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].hash, "a".repeat(40));
    }

    #[test]
    fn test_catalog_code_is_case_insensitive_and_unique() {
        let store = create_test_store();
        let entry = store
            .create_catalog_entry(NewCatalogEntry {
                code: "ABC-123".to_string(),
                title: "Title".to_string(),
                status: CatalogStatus::Subscribed,
            })
            .unwrap();

        let found = store.find_catalog_entry_by_code("abc-123").unwrap().unwrap();
        assert_eq!(found.id, entry.id);

        let duplicate = store.create_catalog_entry(NewCatalogEntry {
            code: "abc-123".to_string(),
            title: "Other".to_string(),
            status: CatalogStatus::Uncheck,
        });
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn test_update_catalog_entry_patch() {
        let store = create_test_store();
        let entry = store
            .create_catalog_entry(NewCatalogEntry {
                code: "XYZ-001".to_string(),
                title: "Title".to_string(),
                status: CatalogStatus::Uncheck,
            })
            .unwrap();

        let added = store
            .update_catalog_entry(
                &entry.id,
                CatalogEntryPatch {
                    status: Some(CatalogStatus::Added),
                    library_ref: Some(Some("item-9".to_string())),
                    added_at: None,
                },
            )
            .unwrap();
        assert_eq!(added.status, CatalogStatus::Added);
        assert_eq!(added.library_ref.as_deref(), Some("item-9"));

        let cleared = store
            .update_catalog_entry(
                &entry.id,
                CatalogEntryPatch {
                    status: Some(CatalogStatus::Uncheck),
                    library_ref: Some(None),
                    added_at: None,
                },
            )
            .unwrap();
        assert!(cleared.library_ref.is_none());

        let fetched = store.get_catalog_entry(&entry.id).unwrap().unwrap();
        assert_eq!(fetched.status, CatalogStatus::Uncheck);
        assert!(fetched.library_ref.is_none());

        assert!(matches!(
            store.update_catalog_entry("missing", CatalogEntryPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_transfer_log_finalized_once() {
        let store = create_test_store();
        let log = store
            .create_transfer_log(NewTransferLog {
                source_path: "/downloads/ABC-123.mp4".to_string(),
                title: "ABC-123.mp4".to_string(),
                code: Some("ABC-123".to_string()),
            })
            .unwrap();
        assert_eq!(log.status, TransferStatus::Processing);

        let done = store
            .update_transfer_log(&log.id, TransferLogPatch::success("/library/ABC-123/ABC-123.mp4"))
            .unwrap();
        assert_eq!(done.status, TransferStatus::Success);
        assert!(done.completed_at.is_some());

        let again = store.update_transfer_log(&log.id, TransferLogPatch::failure("late"));
        assert!(matches!(again, Err(StoreError::InvalidState { .. })));

        let fetched = store.get_transfer_log(&log.id).unwrap().unwrap();
        assert_eq!(
            fetched.destination_path.as_deref(),
            Some("/library/ABC-123/ABC-123.mp4")
        );
        assert_eq!(store.list_transfer_logs(10).unwrap().len(), 1);
    }
}
