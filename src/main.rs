use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use showcase::config::AppConfig;
use showcase::openapi::ApiDoc;
use showcase::repo::ShowcaseRepo;
use showcase::storage::build_blob_store;
use showcase::workflow::DraftWorkflow;
use showcase::{config, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env()?;
    info!("Bootstrapping showcase server");
    info!("Frontend URL: {}", cfg.frontend_url);

    let repo = build_repo(&cfg).await?;
    let blobs = build_blob_store(&cfg.storage).await?;
    let workflow = DraftWorkflow::new(repo, blobs);

    let openapi = ApiDoc::openapi();
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // local Vite dev server
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState { workflow: workflow.clone() }))
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(cfg.bind_addr.as_str())
    .with_context(|| format!("binding {}", cfg.bind_addr))?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ShowcaseRepo>> {
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connecting to Postgres")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(showcase::repo::pg::PgRepo::new(pool)))
}

#[cfg(not(feature = "postgres-store"))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ShowcaseRepo>> {
    use showcase::repo::inmem::InMemRepo;

    let repo = match &cfg.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using in-memory repository backend with snapshot");
            InMemRepo::with_snapshot(dir.join("state.json"))
        }
        None => {
            info!("Using in-memory repository backend");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}
