//! Shared server state

use std::sync::Arc;
use std::time::Duration;

use super::shutdown::ShutdownState;
use crate::config::EmulatorConfig;
use crate::contracts::ContractValidator;
use crate::engine::EmulatorEngine;
use crate::telemetry::EmulatorMetrics;
use crate::vcr::CassetteRecorder;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EmulatorEngine>,
    pub contracts: Arc<ContractValidator>,
    pub recorder: Arc<CassetteRecorder>,
    pub metrics: Arc<EmulatorMetrics>,
    pub shutdown: Arc<ShutdownState>,
}

impl AppState {
    pub fn new(engine: EmulatorEngine) -> Self {
        let config = engine.config();
        Self {
            contracts: Arc::new(ContractValidator::new(&config.contracts)),
            recorder: Arc::new(CassetteRecorder::new(config.vcr.clone())),
            metrics: Arc::new(EmulatorMetrics::new()),
            shutdown: Arc::new(ShutdownState::new(Duration::from_secs(
                config.server.drain_timeout_secs,
            ))),
            engine: Arc::new(engine),
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        self.engine.config()
    }
}
