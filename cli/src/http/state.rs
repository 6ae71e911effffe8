//! HTTP服务器状态管理

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tubefetch_core::api::{AppConfig, Dispatcher, TaskStore};

use crate::http::models::RequestStats;

/// 应用状态（在所有handlers间共享）
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<AppConfig>,
    pub stats: Arc<RwLock<ServerStats>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, config: AppConfig) -> Self {
        Self {
            dispatcher,
            config: Arc::new(config),
            stats: Arc::new(RwLock::new(ServerStats::new())),
        }
    }

    pub fn store(&self) -> &TaskStore {
        self.dispatcher.store()
    }

    pub fn record_request(&self, endpoint: &str) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats.increment_request(endpoint);
    }

    pub fn record_error(&self) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        stats.increment_error();
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.stats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .uptime_seconds()
    }

    pub fn request_stats(&self) -> RequestStats {
        self.stats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }
}

/// 服务器统计信息
pub struct ServerStats {
    pub requests_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub errors_total: u64,
    pub start_time: DateTime<Local>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: 0,
            requests_by_endpoint: HashMap::new(),
            errors_total: 0,
            start_time: Local::now(),
        }
    }

    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        *self
            .requests_by_endpoint
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            total: self.requests_total,
            errors: self.errors_total,
            by_endpoint: self
                .requests_by_endpoint
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        let now = Local::now();
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
