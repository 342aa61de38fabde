use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::catalog::LearnerCatalogService;
use crate::error::AppServicesError;
use crate::exercises::ExerciseFlowService;
use crate::lessons::LessonProgressEngine;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress_engine: Arc<LessonProgressEngine>,
    catalog: Arc<LearnerCatalogService>,
    exercises: Arc<ExerciseFlowService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        shuffle_tiles: bool,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, shuffle_tiles))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, shuffle_tiles: bool) -> Self {
        Self {
            progress_engine: Arc::new(LessonProgressEngine::from_storage(clock, storage)),
            catalog: Arc::new(LearnerCatalogService::from_storage(clock, storage)),
            exercises: Arc::new(
                ExerciseFlowService::from_storage(storage).with_shuffle(shuffle_tiles),
            ),
        }
    }

    #[must_use]
    pub fn progress_engine(&self) -> Arc<LessonProgressEngine> {
        Arc::clone(&self.progress_engine)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<LearnerCatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn exercises(&self) -> Arc<ExerciseFlowService> {
        Arc::clone(&self.exercises)
    }
}
