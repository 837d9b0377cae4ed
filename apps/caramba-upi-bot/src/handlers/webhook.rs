use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use caramba_pay::{PayError, ReconcileOutcome, WebhookNotice};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{error, warn};

pub const SIGNATURE_HEADER: &str = "x-signature";

type HmacSha256 = Hmac<Sha256>;

/// Checks a hex HMAC-SHA256 of the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), String> {
    let sig = signature.ok_or_else(|| "Missing signature header".to_string())?;
    let sig = hex::decode(sig.trim()).map_err(|_| "Signature is not hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Invalid HMAC key: {}", e))?;
    mac.update(body);
    mac.verify_slice(&sig)
        .map_err(|_| "Invalid webhook signature".to_string())
}

pub async fn upi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Some(secret) = &state.config.webhook_secret {
        let sig = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, sig) {
            warn!("Rejected UPI webhook: {}", e);
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "ok": false, "error": "invalid signature" })),
            );
        }
    }

    let notice: WebhookNotice = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!("Malformed UPI webhook body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "malformed body" })),
            );
        }
    };

    match state.receiver.on_webhook(&notice).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "outcome": outcome })),
        ),
        // Dropped between lookup and settle; nothing left to do.
        Err(PayError::NotFound(_)) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "outcome": ReconcileOutcome::Unknown })),
        ),
        Err(e) => {
            error!("UPI webhook for {} failed: {}", notice.pay_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"pay_id":"PAY1","status":"success"}"#;
        let good = sign("s3cret", body);

        assert!(verify_signature("s3cret", body, Some(&good)).is_ok());
        assert!(verify_signature("s3cret", body, Some(&good.to_uppercase())).is_ok());
        assert!(verify_signature("other", body, Some(&good)).is_err());
        assert!(verify_signature("s3cret", b"{}", Some(&good)).is_err());
        assert!(verify_signature("s3cret", body, Some("zz")).is_err());
        assert!(verify_signature("s3cret", body, None).is_err());
    }
}
