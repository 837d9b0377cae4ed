pub mod health;
pub mod webhook;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/webhook/upi", post(webhook::upi_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use caramba_pay::models::{Amount, InvoiceId, InvoiceStatus};
    use hmac::Mac;
    use serde_json::Value;
    use tower::ServiceExt;

    fn webhook(body: &str, signature: Option<String>) -> Request<Body> {
        let mut req = Request::post("/webhook/upi").header("content-type", "application/json");
        if let Some(sig) = signature {
            req = req.header(webhook::SIGNATURE_HEADER, sig);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_active_invoices() {
        let state = test_app(None).state;
        state
            .manager
            .create_invoice(5, Amount::from_major(69).unwrap(), "grow")
            .await
            .unwrap();

        let resp = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_invoices"], 1);
    }

    #[tokio::test]
    async fn test_webhook_settles_once() {
        let t = test_app(None);
        let (state, sink, notifier) = (t.state, t.sink, t.notifier);
        state
            .manager
            .create_invoice(5, Amount::from_major(69).unwrap(), "grow")
            .await
            .unwrap();
        let app = router(state.clone());
        let body = r#"{"pay_id":"PAY5","status":"success"}"#;

        let first = app.clone().oneshot(webhook(body, None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(json_body(first).await["outcome"], "settled");

        let again = app.oneshot(webhook(body, None)).await.unwrap();
        assert_eq!(json_body(again).await["outcome"], "already_settled");

        assert_eq!(sink.count(), 1);
        let invoice = state.manager.get(&InvoiceId::new("PAY5")).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Settled);
        assert_eq!(notifier.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_unknown_and_malformed() {
        let state = test_app(None).state;
        let app = router(state);

        let resp = app
            .clone()
            .oneshot(webhook(r#"{"pay_id":"nope","status":"success"}"#, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["outcome"], "unknown");

        let resp = app.oneshot(webhook("not json", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_signature_required_when_configured() {
        let t = test_app(Some("s3cret"));
        let (state, sink) = (t.state, t.sink);
        state
            .manager
            .create_invoice(6, Amount::from_major(199).unwrap(), "prime")
            .await
            .unwrap();
        let app = router(state.clone());
        let body = r#"{"pay_id":"PAY6","status":"success"}"#;

        let unsigned = app.clone().oneshot(webhook(body, None)).await.unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
        let forged = app
            .clone()
            .oneshot(webhook(body, Some("00".repeat(32))))
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.count(), 0);
        assert_eq!(
            state.manager.get(&InvoiceId::new("PAY6")).unwrap().status,
            InvoiceStatus::AwaitingPayment
        );

        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(b"s3cret").unwrap();
        mac.update(body.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        let signed = app.oneshot(webhook(body, Some(sig))).await.unwrap();
        assert_eq!(signed.status(), StatusCode::OK);
        assert_eq!(sink.count(), 1);
    }
}
