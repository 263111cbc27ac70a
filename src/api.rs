//! REST API for the yard planning service.
//!
//! Provides HTTP endpoints for planning, proposal generation and combined
//! inbound/outbound sessions. Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::allocator::{AllocationEngine, PlanningResult};
use crate::config::{ApiConfig, PlannerConfig};
use crate::error::PlanningError;
use crate::metrics::{PlanMetrics, ZoneUsageDetail};
use crate::model::{Container, ContainerRecord, PlacementRecord, ValidationError, validate_records};
use crate::proposal::{Proposal, ProposalGenerator};
use crate::session::{CombinedZoneSummary, PlanningSession};
use crate::types::{CargoCategory, ContainerLength, OperationType};
use crate::yard::{YardModel, ZoneConfiguration, ZoneDescription};

#[derive(Clone)]
struct ApiState {
    planner: PlannerConfig,
    engine: AllocationEngine,
}

impl ApiState {
    fn new(planner: PlannerConfig) -> Self {
        let engine = AllocationEngine::new(planner.allocation_config()).unwrap_or_else(|err| {
            warn!("{err}. Using default allocation settings.");
            AllocationEngine::default()
        });
        Self { planner, engine }
    }

    fn fresh_yard(&self) -> YardModel {
        YardModel::from_layout(&self.planner.yard_layout())
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>yard-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the planning endpoints.
///
/// `operation` may be omitted; it is then derived from the record fields.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "operation": "inbound",
        "containers": [
            { "unit_id": "MSCU1234567", "iso_type": "45G1", "carrier": "MSC" },
            { "unit_id": "MAEU7654321", "iso_type": "22R1", "carrier": "Maersk", "category": "Reefer" }
        ],
        "zone_config": { "W1": [3, 4, 5, 6, 7, 8] }
    })
)]
pub struct PlanRequest {
    #[serde(default)]
    pub operation: Option<OperationType>,
    pub containers: Vec<ContainerRecord>,
    /// Zone name to permitted weight classes (1..=8).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub zone_config: Option<ZoneConfiguration>,
}

/// Request structure for the proposal endpoint.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ProposalRequest {
    #[serde(default)]
    pub operation: Option<OperationType>,
    pub containers: Vec<ContainerRecord>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub zone_config: Option<ZoneConfiguration>,
    #[schema(example = 3)]
    pub count: usize,
}

/// Request structure for a combined inbound and outbound session.
#[derive(Deserialize, Clone, ToSchema)]
pub struct SessionRequest {
    #[serde(default)]
    pub inbound: Vec<ContainerRecord>,
    #[serde(default)]
    pub outbound: Vec<ContainerRecord>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub zone_config: Option<ZoneConfiguration>,
}

#[derive(Debug)]
struct ValidatedPlanRequest {
    operation: OperationType,
    containers: Vec<Container>,
    zone_config: ZoneConfiguration,
}

#[derive(Debug)]
enum PlanRequestValidationError {
    MissingContainers,
    UnknownOperation(PlanningError),
    InvalidContainer(ValidationError),
}

fn validate_plan(
    operation: Option<OperationType>,
    records: Vec<ContainerRecord>,
    zone_config: Option<ZoneConfiguration>,
) -> Result<ValidatedPlanRequest, PlanRequestValidationError> {
    if records.is_empty() {
        return Err(PlanRequestValidationError::MissingContainers);
    }
    let operation = match operation {
        Some(operation) => operation,
        None => OperationType::detect(&records)
            .map_err(PlanRequestValidationError::UnknownOperation)?,
    };
    let containers = validate_records(records, operation)
        .map_err(PlanRequestValidationError::InvalidContainer)?;
    Ok(ValidatedPlanRequest {
        operation,
        containers,
        zone_config: zone_config.unwrap_or_default(),
    })
}

impl PlanRequest {
    fn into_validated(self) -> Result<ValidatedPlanRequest, PlanRequestValidationError> {
        validate_plan(self.operation, self.containers, self.zone_config)
    }
}

/// Response structure of one plan.
///
/// # Fields
/// * `placements` - Placed containers in placement order
/// * `unplaced` - Containers without a slot, with reason
/// * `metrics` - Efficiency, utilisation and grouping figures
#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub operation: OperationType,
    pub placements: Vec<PlacementRecord>,
    pub unplaced: Vec<UnplacedResponse>,
    pub is_complete: bool,
    pub metrics: PlanMetrics,
}

#[derive(Serialize, ToSchema)]
pub struct UnplacedResponse {
    pub container_id: String,
    pub weight_class: u8,
    pub reason_code: String,
    pub reason: String,
}

impl PlanResponse {
    pub fn from_planning_result(result: PlanningResult) -> Self {
        let PlanningResult {
            operation,
            placements,
            unplaced,
            metrics,
        } = result;

        Self {
            operation,
            placements,
            is_complete: unplaced.is_empty(),
            unplaced: unplaced
                .into_iter()
                .map(|entry| UnplacedResponse {
                    container_id: entry.container_id,
                    weight_class: entry.weight_class.get(),
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            metrics,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProposalResponse {
    pub id: usize,
    pub strategy: String,
    pub score: u32,
    pub timestamp: String,
    pub plan: PlanResponse,
}

impl From<Proposal> for ProposalResponse {
    fn from(proposal: Proposal) -> Self {
        Self {
            id: proposal.id,
            strategy: proposal.strategy,
            score: proposal.score,
            timestamp: proposal.timestamp,
            plan: PlanResponse::from_planning_result(proposal.result),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProposalsResponse {
    pub proposals: Vec<ProposalResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub inbound: Option<PlanResponse>,
    pub outbound: Option<PlanResponse>,
    pub combined_layout: Vec<PlacementRecord>,
    pub combined_summary: Vec<CombinedZoneSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct YardResponse {
    pub layout: String,
    pub total_slots: usize,
    pub zones: Vec<ZoneDescription>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn planning_error(err: PlanningError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Planning failed",
        err.to_string(),
    )
}

fn map_validation_error(err: PlanRequestValidationError) -> Response {
    match err {
        PlanRequestValidationError::MissingContainers => {
            validation_error("At least one container must be specified")
        }
        PlanRequestValidationError::UnknownOperation(err) => validation_error(err.to_string()),
        PlanRequestValidationError::InvalidContainer(err) => validation_error(err.to_string()),
    }
}

fn parse_plan_request(
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<ValidatedPlanRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };
    payload.into_validated().map_err(map_validation_error)
}

fn run_plan(state: &ApiState, request: &ValidatedPlanRequest) -> Result<PlanningResult, PlanningError> {
    let mut yard = state.fresh_yard();
    let mut rng = state.planner.rng();
    state.engine.plan(
        &request.containers,
        request.operation,
        &request.zone_config,
        &mut yard,
        &mut rng,
    )
}

fn run_proposals(
    state: &ApiState,
    request: &ValidatedPlanRequest,
    count: usize,
) -> Result<Vec<Proposal>, PlanningError> {
    let generator = ProposalGenerator::new(state.planner.yard_layout(), state.engine.clone())
        .with_max_proposals(state.planner.max_proposals());
    let mut rng = state.planner.rng();
    generator.generate(
        &request.containers,
        request.operation,
        &request.zone_config,
        count,
        &mut rng,
    )
}

fn run_session(
    state: &ApiState,
    inbound: Vec<Container>,
    outbound: Vec<Container>,
    zone_config: &ZoneConfiguration,
) -> Result<SessionResponse, PlanningError> {
    let mut session = PlanningSession::new(state.planner.yard_layout(), state.engine.clone());
    let mut rng = state.planner.rng();

    if !inbound.is_empty() {
        session.plan(&inbound, OperationType::Inbound, zone_config, &mut rng)?;
    }
    if !outbound.is_empty() {
        session.plan(&outbound, OperationType::Outbound, zone_config, &mut rng)?;
    }

    Ok(SessionResponse {
        inbound: session
            .inbound()
            .cloned()
            .map(PlanResponse::from_planning_result),
        outbound: session
            .outbound()
            .cloned()
            .map(PlanResponse::from_planning_result),
        combined_layout: session.combined_layout(),
        combined_summary: session.combined_summary(),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_plan,
        handle_plan_stream,
        handle_proposals,
        handle_session,
        handle_yard
    ),
    components(
        schemas(
            PlanRequest,
            ProposalRequest,
            SessionRequest,
            PlanResponse,
            UnplacedResponse,
            ProposalResponse,
            ProposalsResponse,
            SessionResponse,
            YardResponse,
            ErrorResponse,
            ContainerRecord,
            PlacementRecord,
            PlanMetrics,
            ZoneUsageDetail,
            CombinedZoneSummary,
            ZoneDescription,
            CargoCategory,
            ContainerLength,
            OperationType
        )
    ),
    tags((name = "planning", description = "Endpoints for container yard slot allocation"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// CORS is open to any origin so browser-based clients can call the API directly.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, planner: PlannerConfig) -> std::io::Result<()> {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState::new(planner);

    let app = Router::new()
        // API endpoints
        .route("/plan", post(handle_plan))
        .route("/plan_stream", post(handle_plan_stream))
        .route("/proposals", post(handle_proposals))
        .route("/session", post(handle_session))
        .route("/yard", get(handle_yard))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.inspect_err(|err| {
        error!("❌ Could not bind API server to {}: {}", addr, err);
    })?;

    info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API endpoints: POST /plan, POST /plan_stream, POST /proposals, POST /session, GET /yard");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await.inspect_err(|err| {
        error!("❌ API server terminated with an error: {err}");
    })
}

/// Handler for POST /plan endpoint.
///
/// Plans one batch of containers into a fresh yard.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Plan computed", body = PlanResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or zone configuration",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_plan_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "📥 New {} plan request: {} containers",
        request.operation,
        request.containers.len()
    );
    match run_plan(&state, &request) {
        Ok(result) => {
            info!(
                "📦 Result: {} placed, {} unplaced",
                result.placed_count(),
                result.unplaced_count()
            );
            let response = PlanResponse::from_planning_result(result);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => planning_error(err),
    }
}

/// Handler for POST /plan_stream endpoint (SSE).
///
/// Streams plan events in real-time as Server-Sent Events (text/event-stream).
#[utoipa::path(
    post,
    path = "/plan_stream",
    request_body = PlanRequest,
    responses(
        (
            status = 200,
            description = "Streams plan events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_plan_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let mut yard = state.fresh_yard();
        let mut rng = state.planner.rng();
        let outcome = state.engine.plan_with_progress(
            &request.containers,
            request.operation,
            &request.zone_config,
            &mut yard,
            &mut rng,
            |evt| {
                if let Ok(json) = serde_json::to_string(evt) {
                    // A closed receiver only means the client went away.
                    let _ = tx.blocking_send(json);
                }
            },
        );
        if let Err(err) = outcome {
            let payload = json!({ "type": "Error", "details": err.to_string() });
            let _ = tx.blocking_send(payload.to_string());
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /proposals endpoint.
///
/// Produces `count` independent plans, each against a fresh yard.
#[utoipa::path(
    post,
    path = "/proposals",
    request_body = ProposalRequest,
    responses(
        (status = 200, description = "Proposals computed", body = ProposalsResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or proposal count",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_proposals(
    State(state): State<ApiState>,
    payload: Result<Json<ProposalRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let count = payload.count;
    let request = match validate_plan(payload.operation, payload.containers, payload.zone_config) {
        Ok(request) => request,
        Err(err) => return map_validation_error(err),
    };

    info!(
        "📥 New proposal request: {} {} containers, {} proposals",
        request.containers.len(),
        request.operation,
        count
    );
    match run_proposals(&state, &request, count) {
        Ok(proposals) => {
            let response = ProposalsResponse {
                proposals: proposals.into_iter().map(ProposalResponse::from).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => planning_error(err),
    }
}

/// Handler for POST /session endpoint.
///
/// Plans the inbound batch and then the outbound batch into one shared yard.
#[utoipa::path(
    post,
    path = "/session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session planned", body = SessionResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or zone configuration",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_session(
    State(state): State<ApiState>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if payload.inbound.is_empty() && payload.outbound.is_empty() {
        return validation_error("At least one container must be specified");
    }

    let inbound = match validate_records(payload.inbound, OperationType::Inbound) {
        Ok(containers) => containers,
        Err(err) => return validation_error(err.to_string()),
    };
    let outbound = match validate_records(payload.outbound, OperationType::Outbound) {
        Ok(containers) => containers,
        Err(err) => return validation_error(err.to_string()),
    };

    info!(
        "📥 New session request: {} inbound, {} outbound containers",
        inbound.len(),
        outbound.len()
    );
    let zone_config = payload.zone_config.unwrap_or_default();
    match run_session(&state, inbound, outbound, &zone_config) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => planning_error(err),
    }
}

/// Handler for GET /yard endpoint.
///
/// Describes the empty yard of the configured layout.
#[utoipa::path(
    get,
    path = "/yard",
    responses((status = 200, description = "Yard description", body = YardResponse)),
    tag = "planning"
)]
async fn handle_yard(State(state): State<ApiState>) -> impl IntoResponse {
    let yard = state.fresh_yard();
    Json(YardResponse {
        layout: state.planner.layout_name().to_string(),
        total_slots: yard.total_slots(),
        zones: yard.describe(),
    })
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
