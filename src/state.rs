use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::workers::queue::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(config: AppConfig, queue: Arc<JobQueue>) -> Self {
        Self { config, queue }
    }
}
