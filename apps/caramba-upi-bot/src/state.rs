use crate::config::BotConfig;
use caramba_pay::{LifecycleManager, ReconciliationReceiver};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub manager: LifecycleManager,
    pub receiver: ReconciliationReceiver,
}

impl AppState {
    pub fn new(config: BotConfig, manager: LifecycleManager) -> Self {
        let receiver = ReconciliationReceiver::new(manager.clone());
        Self {
            config: Arc::new(config),
            manager,
            receiver,
        }
    }
}
