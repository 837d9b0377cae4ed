use crate::api_client::ApiClient;
use anyhow::Result;
use async_trait::async_trait;
use caramba_pay::models::{Amount, PaymentMethod};
use caramba_pay::SettlementSink;
use serde::Serialize;
use tracing::info;

/// Credits settled UPI payments through the panel API.
#[derive(Clone)]
pub struct PanelSettlement {
    api: ApiClient,
}

#[derive(Debug, Serialize)]
struct SettlementReq<'a> {
    tg_id: i64,
    amount: f64,
    currency: &'a str,
    method: &'a str,
    payload: &'a str,
}

impl PanelSettlement {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SettlementSink for PanelSettlement {
    async fn apply(&self, user_id: i64, amount: Amount, context: &str) -> Result<()> {
        if !self.api.has_token() {
            anyhow::bail!("PANEL_TOKEN is not configured");
        }

        let req = SettlementReq {
            tg_id: user_id,
            amount: amount.as_f64(),
            currency: "INR",
            method: PaymentMethod::Upi.as_str(),
            payload: context,
        };
        let _: serde_json::Value = self.api.post("/payments/process", &req).await?;

        info!("Panel credited user {} with ₹{} for {}", user_id, amount, context);
        Ok(())
    }
}
