use std::sync::Arc;

use crate::config::AppConfig;
use crate::fetch::GameServerApi;

#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn GameServerApi>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn GameServerApi>, config: AppConfig) -> Self {
        Self {
            upstream,
            config: Arc::new(config),
        }
    }
}
