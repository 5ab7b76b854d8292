//! Application router: wires the handlers behind one axum `Router`.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::HeaderValue, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::events::{event_routes, EventHandlers};
use super::processes::{process_routes, ProcessHandlers};
use super::rig_state::{rig_state_routes, RigStateHandlers};
use super::telemetry::{telemetry_routes, TelemetryHandlers};
use crate::adapters::websocket::{websocket_router, PushHub, WebSocketState};
use crate::application::{
    CollectionReconciler, GetRigStateHandler, IngestTelemetryHandler, StateStore,
    SubmitEventHandler, UpdateRigStateHandler,
};
use crate::ports::{Clock, IdGenerator, PushPublisher};

/// Every server-side service, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<StateStore>,
    pub hub: Arc<PushHub>,
    pub get_rig_state: Arc<GetRigStateHandler>,
    pub update_rig_state: Arc<UpdateRigStateHandler>,
    pub processes: Arc<CollectionReconciler>,
    pub submit_event: Arc<SubmitEventHandler>,
    pub ingest_telemetry: Arc<IngestTelemetryHandler>,
    pub clock: Arc<dyn Clock>,
}

impl AppServices {
    pub fn new(
        store: Arc<StateStore>,
        hub: Arc<PushHub>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let publisher: Arc<dyn PushPublisher> = hub.clone();
        let update_rig_state = Arc::new(UpdateRigStateHandler::new(store.clone(), clock.clone()));
        let processes = Arc::new(CollectionReconciler::new(store.clone(), ids, clock.clone()));
        let submit_event = Arc::new(SubmitEventHandler::new(
            update_rig_state.clone(),
            processes.clone(),
            publisher.clone(),
            clock.clone(),
        ));
        let ingest_telemetry = Arc::new(IngestTelemetryHandler::new(
            update_rig_state.clone(),
            publisher,
            clock.clone(),
        ));

        Self {
            get_rig_state: Arc::new(GetRigStateHandler::new(store.clone())),
            store,
            hub,
            update_rig_state,
            processes,
            submit_event,
            ingest_telemetry,
            clock,
        }
    }
}

/// HTTP-layer settings taken from configuration.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub request_timeout: Duration,
    /// `*` or an empty list allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    connected_clients: usize,
}

/// GET /health - Liveness plus connected session count.
async fn health(State(hub): State<Arc<PushHub>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connected_clients: hub.connected_clients().await,
    })
}

/// Build the full application router.
///
/// Routes:
/// - `GET /health`
/// - `GET|POST /api/state`
/// - `GET|POST|DELETE /api/processes`
/// - `POST /api/events`
/// - `POST /api/telemetry`
/// - `GET /api/live?clientId=..` (WebSocket)
pub fn app_router(services: &AppServices, settings: &RouterSettings) -> Router {
    let publisher: Arc<dyn PushPublisher> = services.hub.clone();

    let api = Router::new()
        .merge(rig_state_routes(RigStateHandlers::new(
            services.get_rig_state.clone(),
            services.update_rig_state.clone(),
            publisher.clone(),
            services.clock.clone(),
        )))
        .merge(process_routes(ProcessHandlers::new(
            services.processes.clone(),
            publisher,
            services.clock.clone(),
        )))
        .merge(event_routes(EventHandlers::new(services.submit_event.clone())))
        .merge(telemetry_routes(TelemetryHandlers::new(
            services.ingest_telemetry.clone(),
        )))
        .merge(websocket_router().with_state(WebSocketState::new(services.hub.clone())));

    Router::new()
        .route("/health", get(health).with_state(services.hub.clone()))
        .nest("/api", api)
        .layer(TimeoutLayer::new(settings.request_timeout))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}
