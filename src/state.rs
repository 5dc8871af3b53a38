use crate::answers::repo::AnswerRepo;
use crate::auth::{jwt::JwtKeys, repo::UserRepo};
use crate::config::AppConfig;
use crate::courses::repo::CourseRepo;
use crate::enrollments::repo::EnrollmentStore;
use crate::lessons::repo::LessonRepo;
use crate::profiles::repo::ProfileRepo;
use crate::quizzes::repo::QuizRepo;
use crate::store::{memory::MemoryStore, PgStore};
use crate::uploads::{LocalUploads, MemoryUploads, UploadStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub profiles: Arc<dyn ProfileRepo>,
    pub courses: Arc<dyn CourseRepo>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub lessons: Arc<dyn LessonRepo>,
    pub quizzes: Arc<dyn QuizRepo>,
    pub answers: Arc<dyn AnswerRepo>,
    pub uploads: Arc<dyn UploadStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        match sqlx::migrate!("./migrations").run(&pool).await {
            Ok(()) => info!("migrations applied"),
            Err(e) => warn!(error = %e, "failed to apply migrations"),
        }

        let uploads = Arc::new(LocalUploads::new(&config.uploads)) as Arc<dyn UploadStore>;
        Ok(Self::from_store(config, Arc::new(PgStore::new(pool)), uploads))
    }

    /// Wires one backend into every repository slot.
    pub fn from_store<S>(config: Arc<AppConfig>, store: Arc<S>, uploads: Arc<dyn UploadStore>) -> Self
    where
        S: UserRepo
            + ProfileRepo
            + CourseRepo
            + EnrollmentStore
            + LessonRepo
            + QuizRepo
            + AnswerRepo
            + 'static,
    {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            config,
            users: store.clone(),
            profiles: store.clone(),
            courses: store.clone(),
            enrollments: store.clone(),
            lessons: store.clone(),
            quizzes: store.clone(),
            answers: store,
            uploads,
        }
    }

    /// In-memory state for tests and local experiments.
    pub fn fake() -> Self {
        Self::with_memory(Arc::new(MemoryStore::new()))
    }

    /// Like [`AppState::fake`] but keeps a handle on the store.
    pub fn with_memory(store: Arc<MemoryStore>) -> Self {
        let config = Arc::new(AppConfig::ephemeral());
        let uploads = Arc::new(MemoryUploads::default()) as Arc<dyn UploadStore>;
        Self::from_store(config, store, uploads)
    }
}
