use actix_cors::Cors;
use actix_web::middleware::{from_fn, Compress};
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod pdf;
pub mod ratelimit;
pub mod render;
pub mod reports;

pub use crate::db::AppState;
pub use crate::error::ReportError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

/// Failure envelope: `{success: false, error: {code, message, details?}}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            },
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("INTERNAL_SERVER_ERROR", message)
    }
}

/// Success envelope: `{success: true, data?, message?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::<()> {
        success: true,
        data: None,
        message: Some("Inspection report server is running".to_string()),
    })
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        crate::reports::handlers::get_report,
        crate::reports::handlers::download_report,
        crate::reports::handlers::get_signing_data,
        crate::reports::handlers::sign_report,
        crate::reports::handlers::send_report,
        crate::reports::handlers::prepare_report,
        crate::reports::handlers::prepare_report_async,
        crate::reports::handlers::get_job_status,
        crate::reports::handlers::get_public_report,
        crate::reports::handlers::open_report
    ),
    components(
        schemas(
            ErrorResponse,
            ErrorBody,
            reports::model::ReportView,
            reports::model::PublicReportView,
            reports::model::SignRequest,
            reports::model::SigningData,
            reports::model::SendReceipt,
            reports::model::InspectionStatus,
            jobs::JobAccepted,
            jobs::JobStatusView,
            jobs::JobStatus,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Reports", description = "Inspection report generation, signing and verification."),
        (name = "Health", description = "Liveness probe.")
    )
)]
pub struct ApiDoc;

/// Routes shared by the server and the integration tests.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health)))
            .configure(reports::handlers::config),
    );
}

/// Body parse failures answer with the validation envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(32 * 1024 * 1024)
        .error_handler(|err, _req| {
            log::warn!("Rejected request body: {}", err);
            ReportError::validation(format!("Geçersiz istek gövdesi: {}", err)).into()
        })
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::AppConfig::from_env()?;
    let app_state = match AppState::new_with_config(&config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check your DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            std::process::exit(1);
        }
    };
    let limiter = web::Data::new(
        ratelimit::RateLimiter::default().with_trusted_proxies(config.trusted_proxies.clone()),
    );
    let jwt_keys = web::Data::new(auth::JwtKeys::from_secret(&config.jwt_secret));

    let prometheus = PrometheusMetricsBuilder::new("inspection_report_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}", config.bind_addr);

    let cors_origins = config.cors_origins.clone();
    let server_state = app_state.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .supports_credentials()
            .max_age(3600);
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(from_fn(ratelimit::enforce))
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(server_state.clone())
            .app_data(limiter.clone())
            .app_data(jwt_keys.clone())
            .app_data(json_config())
            .configure(configure_api)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(config.bind_addr.as_str())?
    .run()
    .await?;

    log::info!("Server stopped, releasing rendering engine");
    app_state.shutdown().await;
    Ok(())
}
