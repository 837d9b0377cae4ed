use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Thin client for the panel's bot API, authenticated with `X-Bot-Token`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/api/v2/bot{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("X-Bot-Token", &self.token)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Request failed: {}", resp.status()));
        }

        Ok(resp.json().await?)
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}
