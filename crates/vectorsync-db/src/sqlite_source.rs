use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vectorsync_common::{EmbeddingRecord, Error, Result};

use crate::source::{EmbeddingSource, RecordStream};

const DEFAULT_PAGE_SIZE: usize = 500;

/// Reads `(id, vector, text, path)` rows from an `embeddings` table.
///
/// Vectors are stored either as JSON text (`[0.1, 0.2]`) or as a blob of
/// little-endian `f32` values.
pub struct SqliteSource {
    db_path: PathBuf,
    page_size: usize,
}

impl SqliteSource {
    /// Check that the database opens and has an `embeddings` table.
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening embedding source at {}", db_path.display());
        let conn = open_read_only(db_path)?;

        let exists: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='embeddings'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::SourceUnavailable(format!("failed to inspect schema: {e}")))?;
        if exists == 0 {
            return Err(Error::SourceUnavailable(format!(
                "no 'embeddings' table in {}",
                db_path.display()
            )));
        }

        Ok(Self {
            db_path: db_path.to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl EmbeddingSource for SqliteSource {
    fn read(&self) -> Result<RecordStream> {
        let conn = open_read_only(&self.db_path)?;
        Ok(Box::new(SqlitePass {
            conn,
            page_size: self.page_size,
            last_rowid: i64::MIN,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }
}

fn open_read_only(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::SourceUnavailable(format!(
            "database not found: {}",
            db_path.display()
        )));
    }
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::SourceUnavailable(format!("failed to open source database: {e}")))
}

/// One pass over the table, paging by rowid so no statement outlives a page.
struct SqlitePass {
    conn: Connection,
    page_size: usize,
    last_rowid: i64,
    buffer: VecDeque<Result<EmbeddingRecord>>,
    exhausted: bool,
}

impl SqlitePass {
    fn fetch_page(&mut self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT rowid, id, vector, text, path FROM embeddings
                 WHERE rowid > ?1
                 ORDER BY rowid
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare source query: {e}")))?;

        let mut rows = stmt
            .query(params![self.last_rowid, self.page_size as i64])
            .map_err(|e| Error::Database(format!("failed to query source rows: {e}")))?;

        let mut fetched = 0usize;
        while let Some(row) = rows
            .next()
            .map_err(|e| Error::Database(format!("failed to read source row: {e}")))?
        {
            fetched += 1;
            let rowid: i64 = row
                .get(0)
                .map_err(|e| Error::Database(format!("failed to read rowid: {e}")))?;
            self.last_rowid = rowid;
            self.buffer.push_back(decode_row(rowid, row));
        }

        debug!(rows = fetched, last_rowid = self.last_rowid, "fetched source page");
        if fetched < self.page_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for SqlitePass {
    type Item = Result<EmbeddingRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front()
    }
}

fn decode_row(rowid: i64, row: &rusqlite::Row<'_>) -> Result<EmbeddingRecord> {
    let corrupt = |source_id: &str, reason: String| Error::RecordCorrupt {
        source_id: source_id.to_string(),
        reason,
    };

    let rowid_label = format!("rowid:{rowid}");
    let source_id = text_column(row, 1, "id").map_err(|reason| corrupt(&rowid_label, reason))?;
    let Some(source_id) = source_id else {
        return Err(corrupt(&rowid_label, "missing id".into()));
    };

    let vector = match row.get_ref(2) {
        Ok(value) => decode_vector(value),
        Err(e) => Err(format!("unreadable vector column: {e}")),
    }
    .map_err(|reason| corrupt(&source_id, reason))?;

    let text = text_column(row, 3, "text").map_err(|reason| corrupt(&source_id, reason))?;
    let path = text_column(row, 4, "path").map_err(|reason| corrupt(&source_id, reason))?;

    Ok(EmbeddingRecord {
        source_id,
        vector,
        text: text.unwrap_or_default(),
        path: path.unwrap_or_default(),
    })
}

/// Read a column as text. Numbers are stringified; blobs and invalid UTF-8
/// are reported as a reason so the row can be skipped.
fn text_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
    name: &str,
) -> std::result::Result<Option<String>, String> {
    let value = row
        .get_ref(idx)
        .map_err(|e| format!("unreadable {name} column: {e}"))?;
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .map(|s| Some(s.to_string()))
            .map_err(|e| format!("{name} is not utf-8: {e}")),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Blob(_) => Err(format!("{name} is a blob, expected text")),
    }
}

fn decode_vector(value: ValueRef<'_>) -> std::result::Result<Vec<f32>, String> {
    match value {
        ValueRef::Text(raw) => {
            let text = std::str::from_utf8(raw).map_err(|e| format!("vector is not utf-8: {e}"))?;
            serde_json::from_str(text).map_err(|e| format!("vector is not a JSON array: {e}"))
        }
        ValueRef::Blob(blob) => blob_to_vector(blob),
        ValueRef::Null => Err("vector is null".into()),
        ValueRef::Integer(_) | ValueRef::Real(_) => Err("vector is a scalar".into()),
    }
}

fn blob_to_vector(blob: &[u8]) -> std::result::Result<Vec<f32>, String> {
    if blob.len() % 4 != 0 {
        return Err(format!("invalid vector blob length {}", blob.len()));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
