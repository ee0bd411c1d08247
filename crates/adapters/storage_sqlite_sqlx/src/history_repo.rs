//! `SQLite` implementation of [`HistoryRepository`].

use std::future::Future;

use chrono::{DateTime, SecondsFormat};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minido_app::ports::HistoryRepository;
use minido_domain::error::MinidoError;
use minido_domain::history::HistoryEntry;
use minido_domain::id::{Channel, ModuleId};
use minido_domain::time::Timestamp;

use crate::error::StorageError;

const INSERT: &str =
    "INSERT INTO history (recorded_at, kind, module, channel, value) VALUES (?, ?, ?, ?, ?)";
const SELECT_ALL: &str = "SELECT recorded_at, kind, module, channel, value FROM history ORDER BY recorded_at ASC, id ASC";
const DELETE_BEFORE: &str = "DELETE FROM history WHERE recorded_at < ?";

/// Fixed-width UTC text so that lexical order matches chronological order.
fn encode_timestamp(at: &Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

struct Wrapper(HistoryEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let recorded_at: String = row.try_get("recorded_at")?;
        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(decode_error)?
            .to_utc();

        let module: i64 = row.try_get("module")?;
        let module = u8::try_from(module)
            .map_err(decode_error)
            .and_then(|raw| ModuleId::new(raw).map_err(decode_error))?;

        let channel: i64 = row.try_get("channel")?;
        let channel = u8::try_from(channel)
            .map_err(decode_error)
            .and_then(|raw| Channel::new(raw).map_err(decode_error))?;

        let value: i64 = row.try_get("value")?;
        let value = u8::try_from(value).map_err(decode_error)?;

        Ok(Self(HistoryEntry {
            recorded_at,
            kind: row.try_get("kind")?,
            module,
            channel,
            value,
        }))
    }
}

/// `SQLite`-backed history repository.
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl HistoryRepository for SqliteHistoryRepository {
    fn append_batch(
        &self,
        entries: Vec<HistoryEntry>,
    ) -> impl Future<Output = Result<(), MinidoError>> + Send {
        async move {
            if entries.is_empty() {
                return Ok(());
            }
            let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
            for entry in &entries {
                sqlx::query(INSERT)
                    .bind(encode_timestamp(&entry.recorded_at))
                    .bind(&entry.kind)
                    .bind(i64::from(entry.module.get()))
                    .bind(i64::from(entry.channel.get()))
                    .bind(i64::from(entry.value))
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }
            tx.commit().await.map_err(StorageError::from)?;
            tracing::trace!(count = entries.len(), "history batch inserted");
            Ok(())
        }
    }

    fn load_all(&self) -> impl Future<Output = Result<Vec<HistoryEntry>, MinidoError>> + Send {
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn purge_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, MinidoError>> + Send {
        async move {
            let result = sqlx::query(DELETE_BEFORE)
                .bind(encode_timestamp(&cutoff))
                .execute(&self.pool)
                .await
                .map_err(StorageError::from)?;
            Ok(result.rows_affected())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup() -> SqliteHistoryRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteHistoryRepository::new(db.pool().clone())
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn entry(module: u8, channel: u8, value: u8, secs: i64) -> HistoryEntry {
        HistoryEntry::output(
            ModuleId::new(module).unwrap(),
            Channel::new(channel).unwrap(),
            value,
            at(secs),
        )
    }

    #[tokio::test]
    async fn should_load_appended_entries_oldest_first() {
        let repo = setup().await;
        repo.append_batch(vec![entry(1, 1, 255, 20), entry(2, 8, 0, 10)])
            .await
            .unwrap();
        repo.append_batch(vec![entry(1, 1, 0, 30)]).await.unwrap();

        let loaded = repo.load_all().await.unwrap();

        assert_eq!(
            loaded,
            vec![entry(2, 8, 0, 10), entry(1, 1, 255, 20), entry(1, 1, 0, 30)]
        );
        assert!(loaded.iter().all(HistoryEntry::is_output));
    }

    #[tokio::test]
    async fn should_keep_insertion_order_for_identical_timestamps() {
        let repo = setup().await;
        repo.append_batch(vec![entry(3, 2, 1, 5), entry(3, 2, 2, 5), entry(3, 2, 3, 5)])
            .await
            .unwrap();

        let values: Vec<u8> = repo
            .load_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn should_preserve_sub_second_precision() {
        let repo = setup().await;
        let precise = at(0) + Duration::microseconds(123_456);
        let entry = HistoryEntry::output(
            ModuleId::new(4).unwrap(),
            Channel::new(3).unwrap(),
            128,
            precise,
        );
        repo.append_batch(vec![entry.clone()]).await.unwrap();

        assert_eq!(repo.load_all().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn should_accept_empty_batch() {
        let repo = setup().await;
        repo.append_batch(Vec::new()).await.unwrap();
        assert!(repo.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_purge_only_entries_strictly_before_cutoff() {
        let repo = setup().await;
        repo.append_batch(vec![entry(1, 1, 1, 0), entry(1, 1, 2, 100), entry(1, 1, 3, 200)])
            .await
            .unwrap();

        let removed = repo.purge_before(at(100)).await.unwrap();

        assert_eq!(removed, 1);
        let values: Vec<u8> = repo
            .load_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[tokio::test]
    async fn should_fail_loading_rows_with_out_of_range_module() {
        let repo = setup().await;
        sqlx::query(INSERT)
            .bind(encode_timestamp(&at(0)))
            .bind("OUTPUT")
            .bind(42_i64)
            .bind(1_i64)
            .bind(0_i64)
            .execute(&repo.pool)
            .await
            .unwrap();

        let result = repo.load_all().await;

        assert!(matches!(result, Err(MinidoError::Storage(_))));
    }
}
