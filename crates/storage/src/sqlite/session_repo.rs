use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{SessionRecord, SessionRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let answers_json: String = row.try_get("answers").map_err(ser)?;
    let answers: BTreeMap<u64, u64> = serde_json::from_str(&answers_json).map_err(ser)?;
    let limit: i64 = row.try_get("initial_time_limit_secs").map_err(ser)?;

    Ok(SessionRecord {
        user_id: u64_from_i64("user_id", row.try_get("user_id").map_err(ser)?)?,
        quiz_id: u64_from_i64("quiz_id", row.try_get("quiz_id").map_err(ser)?)?,
        slug: row.try_get("slug").map_err(ser)?,
        start_time: row.try_get("start_time_ms").map_err(ser)?,
        initial_time_limit_seconds: u32::try_from(limit).map_err(|_| {
            StorageError::Serialization(format!("invalid initial_time_limit_secs: {limit}"))
        })?,
        answers,
        current_question_index: u64_from_i64(
            "current_question_index",
            row.try_get("current_question_index").map_err(ser)?,
        )?,
        is_active: row.try_get("is_active").map_err(ser)?,
        last_saved: row.try_get("last_saved_ms").map_err(ser)?,
    })
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn load(&self) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, quiz_id, slug, start_time_ms, initial_time_limit_secs,
                answers, current_question_index, is_active, last_saved_ms
            FROM quiz_session
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let answers = serde_json::to_string(&record.answers).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO quiz_session (
                id, user_id, quiz_id, slug, start_time_ms, initial_time_limit_secs,
                answers, current_question_index, is_active, last_saved_ms
            )
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                quiz_id = excluded.quiz_id,
                slug = excluded.slug,
                start_time_ms = excluded.start_time_ms,
                initial_time_limit_secs = excluded.initial_time_limit_secs,
                answers = excluded.answers,
                current_question_index = excluded.current_question_index,
                is_active = excluded.is_active,
                last_saved_ms = excluded.last_saved_ms
            ",
        )
        .bind(i64_from_u64("user_id", record.user_id)?)
        .bind(i64_from_u64("quiz_id", record.quiz_id)?)
        .bind(&record.slug)
        .bind(record.start_time)
        .bind(i64::from(record.initial_time_limit_seconds))
        .bind(answers)
        .bind(i64_from_u64(
            "current_question_index",
            record.current_question_index,
        )?)
        .bind(record.is_active)
        .bind(record.last_saved)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM quiz_session")
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
