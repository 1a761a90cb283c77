use std::sync::Arc;

use claimdesk_core::config::AppConfig;
use claimdesk_core::reports::ApproverMatching;
use claimdesk_db::repositories::{RequestRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub requests: Arc<dyn RequestRepository>,
    pub matching: ApproverMatching,
    pub recent_activity_limit: usize,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        requests: Arc<dyn RequestRepository>,
        config: &AppConfig,
    ) -> Self {
        Self {
            users,
            requests,
            matching: config.reporting.matching_mode(),
            recent_activity_limit: config.reporting.recent_activity_limit,
        }
    }
}
