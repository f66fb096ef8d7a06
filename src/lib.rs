pub mod collector;
pub mod config;
pub mod config_db;
pub mod errors;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod patterns;
pub mod query_builder;
pub mod retention_enforcer;
pub mod spatial;
pub mod storage;
pub mod time_range;

use clickhouse::Client;
use std::sync::Arc;

use config_db::ConfigDb;
use storage::StorageWriter;

#[derive(Clone)]
pub struct AppState {
    pub ch: Client,
    pub config_db: Arc<ConfigDb>,
    pub writer: StorageWriter,
    pub http_client: reqwest::Client,
}
