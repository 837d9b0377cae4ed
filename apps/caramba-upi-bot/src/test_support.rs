//! Fakes shared by the HTTP and bot handler tests.

use crate::config::BotConfig;
use crate::AppState;
use async_trait::async_trait;
use axum::{extract::Path, routing::post, Json, Router};
use caramba_pay::models::{
    Amount, ExternalRef, Invoice, InvoiceId, MessageRef, PaymentMethod, PaymentOutcome,
    PaymentState,
};
use caramba_pay::repositories::NoopJournal;
use caramba_pay::{
    GatewayError, InvoiceHandle, InvoiceStore, LifecycleConfig, LifecycleManager,
    NotificationDispatcher, PaymentGateway, SettlementSink,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::Bot;

/// Outbound calls in the order they happened: gateway calls and Bot API methods.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(String, Value)>>>);

impl CallLog {
    pub fn push(&self, name: &str, body: Value) {
        self.0.lock().unwrap().push((name.to_string(), body));
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn calls(&self, name: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

/// Issues `PAY{user_id}` and reports it paid once `paid` is set.
#[derive(Default)]
pub struct OneShotGateway {
    pub paid: AtomicBool,
    pub log: CallLog,
}

#[async_trait]
impl PaymentGateway for OneShotGateway {
    async fn create_invoice(
        &self,
        user_id: i64,
        _amount: Amount,
        _context: &str,
    ) -> Result<InvoiceHandle, GatewayError> {
        self.log.push("create_invoice", json!({ "user_id": user_id }));
        Ok(InvoiceHandle {
            pay_id: format!("PAY{}", user_id),
            pay_link: "upi://pay?pa=m@upi".into(),
            gateway_expiry: None,
        })
    }

    async fn check_status(&self, _: &ExternalRef) -> Result<PaymentState, GatewayError> {
        Ok(if self.paid.load(Ordering::SeqCst) {
            PaymentState::Paid
        } else {
            PaymentState::Pending
        })
    }

    fn name(&self) -> &str {
        "one-shot"
    }
}

#[derive(Default)]
pub struct Counter(pub AtomicUsize);

impl Counter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementSink for Counter {
    async fn apply(&self, _: i64, _: Amount, _: &str) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records closed invoices and sends nothing.
#[derive(Default)]
pub struct Silent {
    pub closed: Mutex<Vec<Invoice>>,
}

#[async_trait]
impl NotificationDispatcher for Silent {
    async fn notify_admin(
        &self,
        _: i64,
        _: Amount,
        _: PaymentMethod,
        _: &InvoiceId,
        _: &str,
    ) -> anyhow::Result<MessageRef> {
        Ok(MessageRef {
            chat_id: 1,
            message_id: 1,
        })
    }

    async fn notify_user(&self, _: i64, _: &PaymentOutcome) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close_messages(&self, invoice: &Invoice) -> anyhow::Result<()> {
        self.closed.lock().unwrap().push(invoice.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<OneShotGateway>,
    pub sink: Arc<Counter>,
    pub notifier: Arc<Silent>,
}

pub fn test_app(secret: Option<&str>) -> TestApp {
    let secret = secret.map(str::to_string);
    let config = BotConfig::from_lookup(move |key| match key {
        "BOT_TOKEN" => Some("1:x".into()),
        "OWNER_ID" => Some("1".into()),
        "WEBHOOK_URL" => Some("https://bot.example/webhook/upi".into()),
        "WEBHOOK_SECRET" => secret.clone(),
        _ => None,
    })
    .unwrap();

    let gateway = Arc::new(OneShotGateway::default());
    let sink = Arc::new(Counter::default());
    let notifier = Arc::new(Silent::default());
    let manager = LifecycleManager::new(
        InvoiceStore::new(),
        gateway.clone(),
        sink.clone(),
        notifier.clone(),
        Arc::new(NoopJournal),
        LifecycleConfig::default(),
    );
    TestApp {
        state: AppState::new(config, manager),
        gateway,
        sink,
        notifier,
    }
}

/// A Bot pointed at a local stand-in for the Bot API that logs every method
/// (lowercased) with its JSON body into `log`.
pub async fn recording_bot(log: CallLog) -> Bot {
    async fn method(
        axum::extract::State(log): axum::extract::State<CallLog>,
        Path((_token, name)): Path<(String, String)>,
        body: axum::body::Bytes,
    ) -> Json<Value> {
        let name = name.to_lowercase();
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let chat_id = body["chat_id"].as_i64().unwrap_or(1);
        log.push(&name, body);

        let result = match name.as_str() {
            "sendmessage" | "editmessagetext" => json!({
                "message_id": 77,
                "date": 0,
                "chat": { "id": chat_id, "type": "private", "first_name": "U" },
                "text": "ok"
            }),
            _ => json!(true),
        };
        Json(json!({ "ok": true, "result": result }))
    }

    let app = Router::new()
        .route("/{token}/{name}", post(method))
        .with_state(log);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let url = reqwest::Url::parse(&format!("http://{}", addr)).unwrap();
    Bot::new("1:x").set_api_url(url)
}

/// A callback press by `user_id` on a button carrying `data`.
pub fn callback_query(user_id: i64, data: &str) -> teloxide::types::CallbackQuery {
    serde_json::from_value(json!({
        "id": "cb1",
        "from": { "id": user_id, "is_bot": false, "first_name": "U" },
        "chat_instance": "ci",
        "data": data
    }))
    .unwrap()
}
