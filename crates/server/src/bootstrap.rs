use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::info;

use acadia_core::config::{AppConfig, ConfigError, LoadOptions};
use acadia_db::repositories::{
    AssignmentRepository, CertificateRepository, CourseRepository, EnrollmentRepository,
    QuizRepository, SqlAssignmentRepository, SqlCertificateRepository, SqlCourseRepository,
    SqlEnrollmentRepository, SqlPaymentAuditRepository, SqlQuizRepository, SubmissionRepository,
};
use acadia_db::{connect_with_settings, migrations, DbPool};
use acadia_gateway::{GatewayError, PaymentGateway, PaystackClient};

use crate::certificates::CertificateIssuer;
use crate::reconcile::ReconciliationService;
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::{admin, health, payments, student};

/// Shared handler state. Every collaborator sits behind a trait object so
/// tests can substitute fakes (notably the payment gateway and object
/// store).
#[derive(Clone)]
pub struct AppState {
    pub courses: Arc<dyn CourseRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub reconciler: Arc<ReconciliationService>,
    pub issuer: Arc<CertificateIssuer>,
    pub callback_url: String,
    pub webhook_secret: SecretString,
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("payment gateway client failed to build: {0}")]
    Gateway(#[source] GatewayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        PaystackClient::new(
            config.gateway.base_url.clone(),
            config.gateway.secret_key.clone(),
            Duration::from_secs(config.gateway.timeout_secs),
        )
        .map_err(BootstrapError::Gateway)?,
    );

    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        config.storage.root_dir.clone(),
        config.storage.public_base_url.clone(),
    ));

    let state = build_state(db_pool.clone(), gateway, store, &config);

    Ok(Application { config, db_pool, state })
}

pub fn build_state(
    db_pool: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn ObjectStore>,
    config: &AppConfig,
) -> AppState {
    let courses: Arc<dyn CourseRepository> = Arc::new(SqlCourseRepository::new(db_pool.clone()));
    let enrollments: Arc<dyn EnrollmentRepository> =
        Arc::new(SqlEnrollmentRepository::new(db_pool.clone()));
    let quizzes: Arc<dyn QuizRepository> = Arc::new(SqlQuizRepository::new(db_pool.clone()));
    let assignment_repo = Arc::new(SqlAssignmentRepository::new(db_pool.clone()));
    let assignments: Arc<dyn AssignmentRepository> = assignment_repo.clone();
    let submissions: Arc<dyn SubmissionRepository> = assignment_repo;
    let certificates: Arc<dyn CertificateRepository> =
        Arc::new(SqlCertificateRepository::new(db_pool.clone()));
    let audit = Arc::new(SqlPaymentAuditRepository::new(db_pool));

    let reconciler = Arc::new(ReconciliationService::new(enrollments.clone(), audit));
    let issuer = Arc::new(CertificateIssuer::new(certificates.clone(), store));

    AppState {
        courses,
        enrollments,
        quizzes,
        assignments,
        submissions,
        certificates,
        gateway,
        reconciler,
        issuer,
        callback_url: config.gateway.callback_url.clone(),
        webhook_secret: config.gateway.secret_key.clone(),
    }
}

/// Full application router: API surfaces, the health probe, and the static
/// mount backing the local object store's public URLs.
pub fn app_router(application: &Application) -> Router {
    Router::new()
        .merge(payments::router(application.state.clone()))
        .merge(student::router(application.state.clone()))
        .merge(admin::router(application.state.clone()))
        .merge(health::router(application.db_pool.clone()))
        .nest_service("/files", ServeDir::new(&application.config.storage.root_dir))
}
