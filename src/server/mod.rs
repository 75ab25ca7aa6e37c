// HTTP server module
// GET / for liveness, POST /upload for the PDF, POST /chat for questions

mod errors;
pub mod routes;


use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::path::PathBuf;
use tracing::info;

use crate::Result;
use crate::config::Config;
use crate::engine::Session;

pub use errors::{ApiError, ErrorBody};

/// Everything a request handler needs
pub struct AppState {
    pub session: Session,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl AppState {
    #[inline]
    pub fn new(session: Session, config: &Config) -> Self {
        Self {
            session,
            upload_dir: config.server.upload_dir.clone(),
            max_upload_bytes: config.server.max_upload_bytes(),
        }
    }
}

/// Register the API routes
#[inline]
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(routes::root))
        .route("/upload", web::post().to(routes::upload))
        .route("/chat", web::post().to(routes::chat));
}

/// Any origin, method and header
#[inline]
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

/// Bind and run until the process is stopped
#[inline]
pub async fn serve(config: &Config, session: Session) -> Result<()> {
    tokio::fs::create_dir_all(&config.server.upload_dir).await?;

    let state = web::Data::new(AppState::new(session, config));
    let (host, port) = config.server.bind_address();

    info!("AI Book Agent API listening on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
