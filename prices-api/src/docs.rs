//! OpenAPI document served at `/api-docs/openapi.json`

use utoipa::openapi::OpenApi as OpenApiDocument;
use utoipa::OpenApi;

use prices_common::{DailyAverage, ErrorCode, ErrorEnvelope};

use crate::handler::{AverageRequest, AverageResponse};
use crate::server::AVERAGE_PRICES_PATH;

#[derive(OpenApi)]
#[openapi(
    info(title = "Daily average prices", description = "Per-day average prices over a date range"),
    paths(crate::handler::average_prices, crate::handler::average_prices_query),
    components(schemas(AverageRequest, AverageResponse, DailyAverage, ErrorEnvelope, ErrorCode)),
    tags((name = "prices", description = "Daily average price endpoints"))
)]
pub struct ApiDoc;

/// Document with the internal endpoint mounted under `average_path`
pub fn openapi(average_path: &str) -> OpenApiDocument {
    let mut doc = ApiDoc::openapi();
    if average_path != AVERAGE_PRICES_PATH {
        if let Some(item) = doc.paths.paths.remove(AVERAGE_PRICES_PATH) {
            doc.paths.paths.insert(average_path.to_string(), item);
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_both_routes_and_schemas() {
        let doc = serde_json::to_value(openapi(AVERAGE_PRICES_PATH)).unwrap();

        assert!(doc["paths"]["/average-prices"]["post"].is_object());
        assert!(doc["paths"]["/prices/average"]["get"].is_object());
        for schema in ["AverageRequest", "AverageResponse", "DailyAverage", "ErrorEnvelope"] {
            assert!(doc["components"]["schemas"][schema].is_object(), "{schema}");
        }

        let responses = &doc["paths"]["/average-prices"]["post"]["responses"];
        for status in ["200", "400", "502", "504"] {
            assert!(responses[status].is_object(), "{status}");
        }
    }

    #[test]
    fn test_prefix_moves_internal_route() {
        let doc = serde_json::to_value(openapi("/internal/average-prices")).unwrap();

        assert!(doc["paths"]["/internal/average-prices"]["post"].is_object());
        assert!(doc["paths"]["/average-prices"].is_null());
        assert!(doc["paths"]["/prices/average"]["get"].is_object());
    }
}
