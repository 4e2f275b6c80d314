// Context Catalog (§4.5): a durable index of ContextSnapshot rows, backed by
// a single SQLite connection in WAL mode. Writes are serialized behind a
// mutex; SQLite's WAL mode is what lets readers run concurrently with the
// single in-flight writer on the file itself.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// A still image file on disk plus its catalog row.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub path: PathBuf,
    /// UTC epoch milliseconds.
    pub timestamp_ms: i64,
    /// Compact (XOR-folded) perceptual hash, as stored in the catalog.
    pub phash: i64,
}

pub struct ContextCatalog {
    conn: Mutex<Connection>,
}

impl ContextCatalog {
    /// Opens (creating if absent) the catalog at `path`, in WAL mode, and
    /// ensures the schema exists. Schema creation is idempotent.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating catalog directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening catalog at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("setting WAL journal mode")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id        INTEGER PRIMARY KEY,
                path      TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                phash     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON snapshots(timestamp);",
        )
        .context("creating catalog schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory catalog, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory catalog")?;
        conn.execute_batch(
            "CREATE TABLE snapshots (
                id        INTEGER PRIMARY KEY,
                path      TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                phash     INTEGER NOT NULL
            );
            CREATE INDEX idx_snapshots_timestamp ON snapshots(timestamp);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, snapshot: &ContextSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (path, timestamp, phash) VALUES (?1, ?2, ?3)",
            params![snapshot.path.to_string_lossy(), snapshot.timestamp_ms, snapshot.phash],
        )
        .context("inserting catalog row")?;
        Ok(())
    }

    /// Rows with `timestamp` in `[from, to]`, ordered ascending.
    pub fn range(&self, from: i64, to: i64) -> Result<Vec<ContextSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT path, timestamp, phash FROM snapshots
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![from, to], |row| {
                Ok(ContextSnapshot {
                    path: PathBuf::from(row.get::<_, String>(0)?),
                    timestamp_ms: row.get(1)?,
                    phash: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("reading catalog range")?;
        Ok(rows)
    }

    /// Deletes all rows with `timestamp < cutoff`; best-effort deletes their
    /// files. Returns the number of rows deleted.
    pub fn delete_before(&self, cutoff: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT path FROM snapshots WHERE timestamp < ?1")?;
        let paths: Vec<String> = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for p in &paths {
            if let Err(e) = std::fs::remove_file(p) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    eprintln!("catalog: failed to delete snapshot file {p}: {e}");
                }
            }
        }
        let deleted = conn
            .execute("DELETE FROM snapshots WHERE timestamp < ?1", params![cutoff])
            .context("deleting expired catalog rows")?;
        Ok(deleted)
    }

    /// If total rows exceed `n`, deletes the oldest (total - n) rows and their
    /// files.
    pub fn enforce_max(&self, n: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
        let total = total as usize;
        if total <= n {
            return Ok(0);
        }
        let excess = total - n;
        let mut stmt =
            conn.prepare("SELECT id, path FROM snapshots ORDER BY timestamp ASC LIMIT ?1")?;
        let rows: Vec<(i64, String)> = stmt
            .query_map(params![excess as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (_, p) in &rows {
            if let Err(e) = std::fs::remove_file(p) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    eprintln!("catalog: failed to delete snapshot file {p}: {e}");
                }
            }
        }
        for (id, _) in &rows {
            conn.execute("DELETE FROM snapshots WHERE id = ?1", params![id])?;
        }
        Ok(rows.len())
    }

    /// Deletes any row whose file no longer exists on disk. Returns the count
    /// of pruned rows.
    pub fn reconcile(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, path FROM snapshots")?;
        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut pruned = 0;
        for (id, path) in rows {
            if !Path::new(&path).exists() {
                conn.execute("DELETE FROM snapshots WHERE id = ?1", params![id])?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            println!("catalog: reconcile pruned {pruned} stale row(s)");
        }
        Ok(pruned)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
        Ok(total as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: i64, phash: i64) -> ContextSnapshot {
        ContextSnapshot {
            path: PathBuf::from(format!("/tmp/does-not-exist-{ts}.jpg")),
            timestamp_ms: ts,
            phash,
        }
    }

    #[test]
    fn insert_then_range_returns_all_ascending() {
        let cat = ContextCatalog::open_in_memory().unwrap();
        cat.insert(&snap(300, 1)).unwrap();
        cat.insert(&snap(100, 2)).unwrap();
        cat.insert(&snap(200, 3)).unwrap();

        let rows = cat.range(i64::MIN, i64::MAX).unwrap();
        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn delete_before_is_idempotent() {
        let cat = ContextCatalog::open_in_memory().unwrap();
        for ts in [10, 20, 30, 40] {
            cat.insert(&snap(ts, 0)).unwrap();
        }
        let first = cat.delete_before(25).unwrap();
        assert_eq!(first, 2);
        let second = cat.delete_before(25).unwrap();
        assert_eq!(second, 0);
        assert_eq!(cat.count().unwrap(), 2);
    }

    #[test]
    fn reconcile_prunes_rows_whose_files_are_missing() {
        let cat = ContextCatalog::open_in_memory().unwrap();
        for ts in 0..5 {
            cat.insert(&snap(ts, 0)).unwrap();
        }
        // None of the fixture paths exist on disk, so reconcile should prune all.
        let pruned = cat.reconcile().unwrap();
        assert_eq!(pruned, 5);
        assert_eq!(cat.count().unwrap(), 0);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let cat = ContextCatalog::open_in_memory().unwrap();
        cat.insert(&snap(1, 0)).unwrap();
        cat.reconcile().unwrap();
        let second = cat.reconcile().unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn enforce_max_evicts_oldest_first() {
        let cat = ContextCatalog::open_in_memory().unwrap();
        for ts in [10, 20, 30, 40, 50] {
            cat.insert(&snap(ts, 0)).unwrap();
        }
        let evicted = cat.enforce_max(3).unwrap();
        assert_eq!(evicted, 2);
        let remaining = cat.range(i64::MIN, i64::MAX).unwrap();
        let timestamps: Vec<i64> = remaining.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(timestamps, vec![30, 40, 50]);
    }
}
