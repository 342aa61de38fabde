use lingua_core::model::{Lesson, LessonFilter, LessonId, LessonStatus};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, lesson_id_from_i64, lesson_id_to_i64, ser, u32_from_i64};
use crate::repository::{LessonRepository, StorageError};

const LESSON_COLUMNS: &str = "id, title, description, language, status, order_index, created_at";

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let status: LessonStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Lesson::new(
        lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get::<String, _>("language").map_err(ser)?,
        status,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, title, description, language, status, order_index, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                language = excluded.language,
                status = excluded.status,
                order_index = excluded.order_index
            ",
        )
        .bind(lesson_id_to_i64(lesson.id())?)
        .bind(lesson.title())
        .bind(lesson.description())
        .bind(lesson.language())
        .bind(lesson.status().as_str())
        .bind(i64::from(lesson.order_index()))
        .bind(lesson.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(lesson_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn list_lessons(&self, filter: &LessonFilter) -> Result<Vec<Lesson>, StorageError> {
        let mut sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE 1 = 1");
        let mut bind_index = 1;
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.language.is_some() {
            sql.push_str(&format!(" AND language = ?{bind_index}"));
        }
        sql.push_str(" ORDER BY order_index ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(language) = filter.language.as_deref() {
            query = query.bind(language);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(lesson_from_row(&row)?);
        }
        Ok(lessons)
    }
}
