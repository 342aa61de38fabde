use lingua_core::model::{DailyActivity, LearnerId, LearnerProfile};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, learner_id_from_i64, learner_id_to_i64, ser, to_json, u32_from_i64,
};
use crate::repository::{LearnerProfileRepository, StorageError};

fn total_xp_to_i64(profile: &LearnerProfile) -> Result<i64, StorageError> {
    i64::try_from(profile.total_xp())
        .map_err(|_| StorageError::Serialization("total_xp overflow".into()))
}

#[async_trait::async_trait]
impl LearnerProfileRepository for SqliteRepository {
    async fn get_profile(
        &self,
        learner_id: LearnerId,
    ) -> Result<Option<LearnerProfile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                learner_id, current_language, total_xp, completed_lessons_count,
                weekly_activity, achievements, last_active_at, revision
            FROM learner_profiles
            WHERE learner_id = ?1
            ",
        )
        .bind(learner_id_to_i64(learner_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let total_xp: i64 = row.try_get("total_xp").map_err(ser)?;
        let total_xp = u64::try_from(total_xp)
            .map_err(|_| StorageError::Serialization(format!("invalid total_xp: {total_xp}")))?;
        let revision = u32_from_i64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?;
        let weekly_activity: Vec<DailyActivity> = from_json(
            "weekly_activity",
            &row.try_get::<String, _>("weekly_activity").map_err(ser)?,
        )?;
        let achievements: Vec<String> = from_json(
            "achievements",
            &row.try_get::<String, _>("achievements").map_err(ser)?,
        )?;

        LearnerProfile::from_persisted(
            learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
            row.try_get::<String, _>("current_language").map_err(ser)?,
            total_xp,
            u32_from_i64(
                "completed_lessons_count",
                row.try_get::<i64, _>("completed_lessons_count").map_err(ser)?,
            )?,
            weekly_activity,
            achievements,
            row.try_get("last_active_at").map_err(ser)?,
        )
        .map(|profile| profile.with_revision(revision))
        .map(Some)
        .map_err(ser)
    }

    async fn upsert_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        let total_xp = total_xp_to_i64(profile)?;

        sqlx::query(
            r"
            INSERT INTO learner_profiles (
                learner_id, current_language, total_xp, completed_lessons_count,
                weekly_activity, achievements, last_active_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(learner_id) DO UPDATE SET
                current_language = excluded.current_language,
                total_xp = excluded.total_xp,
                completed_lessons_count = excluded.completed_lessons_count,
                weekly_activity = excluded.weekly_activity,
                achievements = excluded.achievements,
                last_active_at = excluded.last_active_at,
                revision = learner_profiles.revision + 1
            ",
        )
        .bind(learner_id_to_i64(profile.learner_id())?)
        .bind(profile.current_language())
        .bind(total_xp)
        .bind(i64::from(profile.completed_lessons_count()))
        .bind(to_json(profile.weekly_activity())?)
        .bind(to_json(profile.achievements())?)
        .bind(profile.last_active_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn update_profile(
        &self,
        profile: &LearnerProfile,
    ) -> Result<LearnerProfile, StorageError> {
        let learner = learner_id_to_i64(profile.learner_id())?;
        let next_revision = profile.revision().wrapping_add(1);

        let res = sqlx::query(
            r"
            UPDATE learner_profiles SET
                current_language = ?1,
                total_xp = ?2,
                completed_lessons_count = ?3,
                weekly_activity = ?4,
                achievements = ?5,
                last_active_at = ?6,
                revision = ?7
            WHERE learner_id = ?8 AND revision = ?9
            ",
        )
        .bind(profile.current_language())
        .bind(total_xp_to_i64(profile)?)
        .bind(i64::from(profile.completed_lessons_count()))
        .bind(to_json(profile.weekly_activity())?)
        .bind(to_json(profile.achievements())?)
        .bind(profile.last_active_at())
        .bind(i64::from(next_revision))
        .bind(learner)
        .bind(i64::from(profile.revision()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM learner_profiles WHERE learner_id = ?1")
                .bind(learner)
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
        Ok(profile.clone().with_revision(next_revision))
    }
}
