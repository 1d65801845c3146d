use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Style Matcher API",
        version = "0.1.0",
        description = "Multimodal product search and styling recommendations"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = "/v1", api = domain_catalog::CatalogApiDoc)
    )
)]
pub struct ApiDoc;
