use std::num::NonZeroUsize;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder, ResponseError};
use log::{debug, info};
use lru::LruCache;
use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::domain::solver_factory::SolveOptions;
use crate::error::SourcingError;
use crate::models::{OptimizeRequest, PlanDocument};
use crate::service::optimize_document;

impl ResponseError for SourcingError {
    fn status_code(&self) -> StatusCode {
        match self {
            SourcingError::InvalidInput(_) | SourcingError::Json(_) => StatusCode::BAD_REQUEST,
            SourcingError::InsufficientSupply { .. } | SourcingError::Infeasible { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SourcingError::SolverTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SourcingError::ModelViolation { .. }
            | SourcingError::Backend(_)
            | SourcingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }))
    }
}

/// Recently computed plans keyed by the serialized request.
/// A capacity of 0 disables caching.
pub struct PlanCache {
    inner: Option<Mutex<LruCache<Vec<u8>, PlanDocument>>>,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        PlanCache {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// A copy of the cached plan marked as a cache reply
    pub fn get(&self, key: &[u8]) -> Option<PlanDocument> {
        let mut plan = self.inner.as_ref()?.lock().get(key).cloned()?;
        plan.solver.cached = true;
        plan.solver.elapsed_ms = 0;
        Some(plan)
    }

    pub fn put(&self, key: Vec<u8>, plan: PlanDocument) {
        if let Some(inner) = &self.inner {
            inner.lock().put(key, plan);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared state of every worker
pub struct AppState {
    pub options: SolveOptions,
    pub cache: PlanCache,
}

impl AppState {
    pub fn new(options: SolveOptions, cache_size: usize) -> Self {
        AppState {
            options,
            cache: PlanCache::new(cache_size),
        }
    }
}

// ---------- Route handlers ----------

/// POST /optimize
pub async fn optimize(
    state: web::Data<AppState>,
    req: web::Json<OptimizeRequest>,
) -> Result<HttpResponse, SourcingError> {
    let request = req.into_inner();
    let key = serde_json::to_vec(&request)?;
    if let Some(plan) = state.cache.get(&key) {
        info!("plan cache hit");
        return Ok(HttpResponse::Ok().json(plan));
    }

    let mut options = state.options;
    if let Some(strategy) = request.strategy {
        options.strategy = strategy.into();
    }
    if let Some(secs) = request.time_limit_secs {
        options.time_limit = Duration::from_secs(secs);
    }
    debug!("optimizing {} listings with {:?}", request.listings.len(), options.strategy);

    let OptimizeRequest {
        listings, demand, ..
    } = request;
    let plan = web::block(move || optimize_document(listings, &demand, &options))
        .await
        .map_err(|e| SourcingError::Backend(format!("solver worker failed: {}", e)))??;

    state.cache.put(key, plan.clone());
    Ok(HttpResponse::Ok().json(plan))
}

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// JSON extractor settings: body limit and `{error, kind}` bodies for malformed input
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(|err, _| {
        let err_string = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest()
                .json(serde_json::json!({ "error": err_string, "kind": "invalid_input" })),
        )
        .into()
    })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/optimize", web::post().to(optimize))
        .route("/health", web::get().to(health_check));
}

// ---------- Server bootstrap ----------

pub async fn run(config: AppConfig) -> std::io::Result<()> {
    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        info!("error reporting enabled");
        sentry::init((dsn, sentry::ClientOptions::default()))
    });

    let state = web::Data::new(AppState::new(config.solve_options(), config.plan_cache_size));
    let json_limit = config.json_limit;

    info!("Starting server on http://127.0.0.1:{}", config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(sentry_actix::Sentry::new())
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(json_config(json_limit))
            .configure(routes)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
