use std::sync::Arc;

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{app_state::AppState, http::problem::Problem, openapi::ApiDoc};

const JSON_PATH: &str = "/openapi/huddle.json";

async fn yaml_document() -> Response {
    match ApiDoc::openapi().to_yaml() {
        Ok(document) => ([(header::CONTENT_TYPE, "application/yaml")], document).into_response(),
        Err(err) => Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "openapi_unavailable",
            format!("cannot render the API document: {err}"),
        )
        .into_response(),
    }
}

/// Swagger UI at `/swagger-ui`, backed by the JSON document; YAML is served alongside.
pub fn openapi_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url(JSON_PATH, ApiDoc::openapi()))
        .route("/openapi/huddle.yaml", get(yaml_document))
}
