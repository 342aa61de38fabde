use lingua_core::model::{
    LearnerId, LessonId, LessonProgress, ProgressStatus, StepProgress,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, learner_id_from_i64, learner_id_to_i64, lesson_id_from_i64,
    lesson_id_to_i64, placeholders, ser, to_json, u32_from_i64,
};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "learner_id, lesson_id, status, progress_percent, steps, \
     xp_earned, started_at, completed_at, revision";

fn progress_from_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    let status: ProgressStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let percent_raw: i64 = row.try_get("progress_percent").map_err(ser)?;
    let percent = u8::try_from(percent_raw).map_err(|_| {
        StorageError::Serialization(format!("invalid progress_percent: {percent_raw}"))
    })?;
    let steps: Vec<StepProgress> =
        from_json("steps", &row.try_get::<String, _>("steps").map_err(ser)?)?;

    LessonProgress::from_persisted(
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        status,
        percent,
        steps,
        u32_from_i64("xp_earned", row.try_get::<i64, _>("xp_earned").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        u32_from_i64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE learner_id = ?1 AND lesson_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(learner_id_to_i64(learner_id)?)
            .bind(lesson_id_to_i64(lesson_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(progress_from_row).transpose()
    }

    async fn insert_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lesson_progress (
                learner_id, lesson_id, status, progress_percent, steps,
                xp_earned, started_at, completed_at, revision
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
            ON CONFLICT(learner_id, lesson_id) DO NOTHING
            ",
        )
        .bind(learner_id_to_i64(progress.learner_id())?)
        .bind(lesson_id_to_i64(progress.lesson_id())?)
        .bind(progress.status().as_str())
        .bind(i64::from(progress.progress_percent()))
        .bind(to_json(progress.steps())?)
        .bind(i64::from(progress.xp_earned()))
        .bind(progress.started_at())
        .bind(progress.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(progress.clone().with_revision(0))
    }

    async fn update_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StorageError> {
        let learner = learner_id_to_i64(progress.learner_id())?;
        let lesson = lesson_id_to_i64(progress.lesson_id())?;
        let next_revision = progress.revision().wrapping_add(1);

        let res = sqlx::query(
            r"
            UPDATE lesson_progress SET
                status = ?1,
                progress_percent = ?2,
                steps = ?3,
                xp_earned = ?4,
                started_at = ?5,
                completed_at = ?6,
                revision = ?7
            WHERE learner_id = ?8 AND lesson_id = ?9 AND revision = ?10
            ",
        )
        .bind(progress.status().as_str())
        .bind(i64::from(progress.progress_percent()))
        .bind(to_json(progress.steps())?)
        .bind(i64::from(progress.xp_earned()))
        .bind(progress.started_at())
        .bind(progress.completed_at())
        .bind(i64::from(next_revision))
        .bind(learner)
        .bind(lesson)
        .bind(i64::from(progress.revision()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query(
                "SELECT 1 FROM lesson_progress WHERE learner_id = ?1 AND lesson_id = ?2",
            )
            .bind(learner)
            .bind(lesson)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .is_some();
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        Ok(progress.clone().with_revision(next_revision))
    }

    async fn list_progress(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress \
             WHERE learner_id = ?1 AND lesson_id IN ({}) ORDER BY lesson_id ASC",
            placeholders(2, lesson_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(learner_id_to_i64(learner_id)?);
        for id in lesson_ids {
            query = query.bind(lesson_id_to_i64(*id)?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(progress_from_row(&row)?);
        }
        Ok(out)
    }
}
