//! HTTP handlers for product search and styling recommendations

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderName, HeaderValue},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use axum_helpers::{
    AppError, ValidatedJson,
    errors::responses::{
        BadRequestResponse, BadRequestValidationResponse, ServiceUnavailableResponse,
    },
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};

use crate::error::{RECOMMEND_UNAVAILABLE, SEARCH_UNAVAILABLE};
use crate::models::{
    ProductResult, QueryType, RecommendRequest, RecommendResponse, SearchFilters, SearchRequest,
    SearchResponse,
};
use crate::recommend::RecommendService;
use crate::search::SearchService;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecommendParams {
    /// Stream the comment as server-sent events instead of a single JSON body
    #[serde(default)]
    pub stream: bool,
}

/// Shared state for handlers
#[derive(Clone)]
pub struct CatalogState {
    pub search: Arc<SearchService>,
    pub recommend: Arc<RecommendService>,
}

impl CatalogState {
    pub fn new(search: SearchService, recommend: RecommendService) -> Self {
        Self {
            search: Arc::new(search),
            recommend: Arc::new(recommend),
        }
    }
}

/// OpenAPI documentation for the catalog API
#[derive(OpenApi)]
#[openapi(
    paths(search_handler, recommend_handler),
    components(
        schemas(
            SearchRequest,
            SearchFilters,
            SearchResponse,
            ProductResult,
            QueryType,
            RecommendRequest,
            RecommendResponse,
        ),
        responses(
            BadRequestResponse,
            BadRequestValidationResponse,
            ServiceUnavailableResponse
        )
    ),
    tags(
        (name = "search", description = "Text, image and hybrid product search"),
        (name = "recommend", description = "Styling comments for a set of products")
    )
)]
pub struct CatalogApiDoc;

/// Create the catalog router with `/search` and `/recommend`
pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/search", post(search_handler))
        .route("/recommend", post(recommend_handler))
        .with_state(state)
}

/// Search products by text, image, or both
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked products", body = SearchResponse),
        (status = 400, response = BadRequestResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn search_handler(
    State(state): State<CatalogState>,
    ValidatedJson(request): ValidatedJson<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let response = state
        .search
        .search(request)
        .await
        .map_err(|err| err.into_app_error(SEARCH_UNAVAILABLE))?;
    Ok(Json(response))
}

/// Generate a styling comment for up to ten products
///
/// With `?stream=true` the reply is `text/event-stream`; every event is
/// `data: {"event": "delta" | "done" | "error", "data": "..."}` and the stream
/// ends after the first `done` or `error`.
#[utoipa::path(
    post,
    path = "/recommend",
    tag = "recommend",
    params(RecommendParams),
    request_body = RecommendRequest,
    responses(
        (status = 200, description = "Styling comment, as JSON or as an event stream", content(
            (RecommendResponse = "application/json"),
            (String = "text/event-stream")
        )),
        (status = 400, response = BadRequestValidationResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn recommend_handler(
    State(state): State<CatalogState>,
    Query(params): Query<RecommendParams>,
    ValidatedJson(request): ValidatedJson<RecommendRequest>,
) -> Result<Response, AppError> {
    if !params.stream {
        let response = state
            .recommend
            .recommend(&request)
            .await
            .map_err(|err| err.into_app_error(RECOMMEND_UNAVAILABLE))?;
        return Ok(Json(response).into_response());
    }

    let events = state
        .recommend
        .recommend_stream(request)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    let sse = Sse::new(events).keep_alive(KeepAlive::default());
    Ok(([(X_ACCEL_BUFFERING, HeaderValue::from_static("no"))], sse).into_response())
}
