// Merchant identification for payout endpoints
// The merchant id arrives in a trusted header set by the embedded-app proxy;
// session mechanics beyond that are out of scope here.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use serde_json::json;

/// Header carrying the opaque merchant identifier
pub const MERCHANT_ID_HEADER: &str = "x-merchant-id";

/// Extractor for the merchant id from the `x-merchant-id` header.
/// Missing or empty header rejects with the 401 envelope the dashboard
/// expects, before the handler runs.
#[derive(Debug, Clone)]
pub struct MerchantId(pub String);

impl MerchantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for MerchantId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(MERCHANT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| MerchantId(value.to_string()))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Merchant ID required" })),
            ))
    }
}
