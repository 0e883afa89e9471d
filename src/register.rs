use std::sync::Arc;

use uuid::Uuid;

use crate::bots::BotRegistry;
use crate::configuration::Configuration;
use crate::store::Store;

/// Shared application state, constructed once in `main` and passed down
/// everywhere else — the same role `data_loader::register::Register` plays
/// for that codebase, kept out of statics/globals.
#[derive(Clone)]
pub struct Register {
    pub config: Configuration,
    pub store: Arc<Store>,
    /// This process's identity in leader election (SPEC_FULL §4.6.1), chosen
    /// once per process at startup.
    pub engine_owner_id: String,
    pub bots: Arc<BotRegistry>,
}

impl Register {
    pub async fn new(config: Configuration) -> anyhow::Result<Self> {
        let store = Arc::new(Store::connect(config.storage_url()).await?);
        Ok(Self {
            config,
            store,
            engine_owner_id: Uuid::new_v4().to_string(),
            bots: Arc::new(BotRegistry::new()),
        })
    }
}
