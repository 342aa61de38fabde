use lingua_core::model::{LessonId, Phrase, PhraseId, Question, QuestionKind, ReviewData};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, lesson_id_from_i64, lesson_id_to_i64, phrase_id_from_i64, phrase_id_to_i64,
    question_id_from_i64, question_id_to_i64, ser, to_json, u32_from_i64,
};
use crate::repository::{PhraseRepository, QuestionRepository, StorageError};

fn phrase_from_row(row: &SqliteRow) -> Result<Phrase, StorageError> {
    let mut phrase = Phrase::new(
        phrase_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get::<String, _>("translation").map_err(ser)?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
    )
    .map_err(ser)?;
    phrase.audio_url = row.try_get("audio_url").map_err(ser)?;
    Ok(phrase)
}

fn question_from_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let kind: QuestionKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let mut question = Question::new(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        kind,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
    )
    .map_err(ser)?;

    question.options = from_json("options", &row.try_get::<String, _>("options").map_err(ser)?)?;
    question.answer = row.try_get("answer").map_err(ser)?;
    question.phrase_id = row
        .try_get::<Option<i64>, _>("phrase_id")
        .map_err(ser)?
        .map(phrase_id_from_i64)
        .transpose()?;
    question.review_data = row
        .try_get::<Option<String>, _>("review_data")
        .map_err(ser)?
        .map(|raw| from_json::<ReviewData>("review_data", &raw))
        .transpose()?;
    Ok(question)
}

#[async_trait::async_trait]
impl PhraseRepository for SqliteRepository {
    async fn upsert_phrase(&self, phrase: &Phrase) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO phrases (id, lesson_id, text, translation, audio_url, order_index)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                text = excluded.text,
                translation = excluded.translation,
                audio_url = excluded.audio_url,
                order_index = excluded.order_index
            ",
        )
        .bind(phrase_id_to_i64(phrase.id)?)
        .bind(lesson_id_to_i64(phrase.lesson_id)?)
        .bind(phrase.text.as_str())
        .bind(phrase.translation.as_str())
        .bind(phrase.audio_url.as_deref())
        .bind(i64::from(phrase.order_index))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn phrases_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Phrase>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, text, translation, audio_url, order_index
            FROM phrases
            WHERE lesson_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(lesson_id_to_i64(lesson_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(phrase_from_row).collect()
    }

    async fn get_phrase(&self, id: PhraseId) -> Result<Option<Phrase>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, lesson_id, text, translation, audio_url, order_index
            FROM phrases
            WHERE id = ?1
            ",
        )
        .bind(phrase_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(phrase_from_row).transpose()
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let review_data = question
            .review_data
            .as_ref()
            .map(to_json)
            .transpose()?;
        let phrase_id = question.phrase_id.map(phrase_id_to_i64).transpose()?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, lesson_id, kind, prompt, options, answer, phrase_id, review_data, order_index
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                kind = excluded.kind,
                prompt = excluded.prompt,
                options = excluded.options,
                answer = excluded.answer,
                phrase_id = excluded.phrase_id,
                review_data = excluded.review_data,
                order_index = excluded.order_index
            ",
        )
        .bind(question_id_to_i64(question.id)?)
        .bind(lesson_id_to_i64(question.lesson_id)?)
        .bind(question.kind.as_str())
        .bind(question.prompt.as_str())
        .bind(to_json(&question.options)?)
        .bind(question.answer.as_deref())
        .bind(phrase_id)
        .bind(review_data)
        .bind(i64::from(question.order_index))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn questions_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, kind, prompt, options, answer, phrase_id, review_data, order_index
            FROM questions
            WHERE lesson_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(lesson_id_to_i64(lesson_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(question_from_row).collect()
    }
}
