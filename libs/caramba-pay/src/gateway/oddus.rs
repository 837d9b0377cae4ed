use crate::error::GatewayError;
use crate::gateway::{GatewayConfig, InvoiceHandle, PaymentGateway};
use crate::models::{Amount, ExternalRef, PaymentState};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

/// HTTP client for the Oddus UPI gateway (`/upi/create`, `/upi/verify`).
#[derive(Clone)]
pub struct OddusGateway {
    client: Client,
    base_url: String,
    client_id: String,
    notification_url: String,
}

#[derive(Serialize)]
struct CreateReq<'a> {
    user_id: i64,
    price_amount: f64,
    client_id: &'a str,
    notification_url: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct CreateResp {
    invoice: CreatedInvoice,
}

#[derive(Deserialize)]
struct CreatedInvoice {
    pay_id: String,
    upi_link: String,
    #[serde(default)]
    expiry: Option<Value>,
}

#[derive(Serialize)]
struct VerifyReq<'a> {
    pay_id: &'a str,
}

#[derive(Deserialize)]
struct VerifyResp {
    #[serde(default)]
    paid: bool,
}

enum Reply {
    Success(Value),
    NotFound,
}

impl OddusGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            notification_url: config.notification_url,
        })
    }

    async fn call<B: Serialize>(&self, endpoint: &str, payload: &B) -> Result<Reply, GatewayError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway API Error ({}): {}", endpoint, e);
                GatewayError::Unreachable(e.to_string())
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            error!("Gateway API Error ({}): failed to read body: {}", endpoint, e);
            GatewayError::Unreachable(e.to_string())
        })?;
        debug!("Gateway {} -> {} {}", endpoint, status, text);

        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound);
        }
        if status != StatusCode::OK {
            error!("Gateway {} returned HTTP {}: {}", endpoint, status, text);
            return Err(GatewayError::Rejected(format!("HTTP {}: {}", status, text)));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            error!("Gateway {} returned malformed body: {}", endpoint, e);
            GatewayError::Rejected(format!("malformed response: {}", text))
        })?;

        match body.get("status").and_then(Value::as_str) {
            Some("success") => Ok(Reply::Success(body)),
            Some("not_found") => Ok(Reply::NotFound),
            _ => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| text.clone());
                error!("Gateway {} refused request: {}", endpoint, message);
                Err(GatewayError::Rejected(message))
            }
        }
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: Value) -> Result<T, GatewayError> {
        serde_json::from_value(body.clone()).map_err(|e| {
            error!("Gateway {} response missing fields: {}", endpoint, e);
            GatewayError::Rejected(format!("unexpected response: {}", body))
        })
    }
}

#[async_trait]
impl PaymentGateway for OddusGateway {
    async fn create_invoice(
        &self,
        user_id: i64,
        amount: Amount,
        context: &str,
    ) -> Result<InvoiceHandle, GatewayError> {
        info!("Creating UPI invoice for user {}: {} ({})", user_id, amount, context);

        let req = CreateReq {
            user_id,
            price_amount: amount.as_f64(),
            client_id: &self.client_id,
            notification_url: &self.notification_url,
            context,
        };

        let body = match self.call("upi/create", &req).await? {
            Reply::Success(body) => body,
            Reply::NotFound => {
                return Err(GatewayError::Rejected("upi/create endpoint not found".into()));
            }
        };
        let resp: CreateResp = Self::decode("upi/create", body)?;

        Ok(InvoiceHandle {
            pay_id: resp.invoice.pay_id,
            pay_link: resp.invoice.upi_link,
            gateway_expiry: resp.invoice.expiry.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        })
    }

    async fn check_status(&self, external_ref: &ExternalRef) -> Result<PaymentState, GatewayError> {
        let req = VerifyReq {
            pay_id: &external_ref.pay_id,
        };

        match self.call("upi/verify", &req).await? {
            Reply::NotFound => Ok(PaymentState::NotFound),
            Reply::Success(body) => {
                let resp: VerifyResp = Self::decode("upi/verify", body)?;
                Ok(if resp.paid {
                    PaymentState::Paid
                } else {
                    PaymentState::Pending
                })
            }
        }
    }

    fn name(&self) -> &str {
        "oddus-upi"
    }
}
