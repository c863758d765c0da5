use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{codec::TokenCodec, ledger::TokenLedger},
    config::AppConfig,
    store::{MemoryStore, PgStore, Store},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub codec: Arc<TokenCodec>,
    pub ledger: TokenLedger,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.database_url.as_deref() {
            Some(url) => {
                let pg = PgStore::connect(url).await?;
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migrations failed; continuing");
                }
                info!("using postgres store");
                Arc::new(pg) as Arc<dyn Store>
            }
            None => {
                warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Self::from_parts(config, store)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.token)?);
        let ledger = TokenLedger::new(store.clone());
        Ok(Self {
            store,
            config,
            codec,
            ledger,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_store(Arc::new(MemoryStore::new()))
    }

    #[cfg(test)]
    pub fn fake_with_store(store: Arc<MemoryStore>) -> Self {
        use crate::config::TokenConfig;

        let config = Arc::new(AppConfig {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            token: TokenConfig {
                encryption_secret: "test-encryption".into(),
                signing_secret: "test-signing".into(),
            },
        });
        Self::from_parts(config, store).expect("fake state")
    }
}
