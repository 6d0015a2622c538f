//! Shared application state handed to the HTTP handlers.

use std::sync::Arc;

use crate::document::DocumentService;
use crate::messaging::BrokerHealthCheck;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
    pub health: Arc<BrokerHealthCheck>,
}

impl AppState {
    pub fn new(service: Arc<DocumentService>, health: Arc<BrokerHealthCheck>) -> Self {
        Self { service, health }
    }
}
