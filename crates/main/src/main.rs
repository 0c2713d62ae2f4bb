//! 主应用程序入口
//!
//! 加载配置、选择存储后端、启动清理任务和 Axum Web 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    spawn_inactivity_reaper, Clock, MessageRepository, ParticipantRepository, PresenceService,
    PresenceServiceDependencies, PresenceSettings, SystemClock,
};
use config::{AppConfig, StorageBackend};
use infrastructure::{create_pg_pool, MemoryStorage, PgStorage, MIGRATOR};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState};

/// 运行期持有的存储句柄，关闭时需要释放连接池
enum Storage {
    Postgres(PgStorage),
    Memory(MemoryStorage),
}

impl Storage {
    async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let pool = create_pg_pool(&config.database)
                    .await
                    .context("failed to connect to postgres")?;
                MIGRATOR
                    .run(&pool)
                    .await
                    .context("failed to run database migrations")?;
                tracing::info!("using postgres storage");
                Ok(Self::Postgres(PgStorage::new(pool)))
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage, data will not survive a restart");
                Ok(Self::Memory(MemoryStorage::new()))
            }
        }
    }

    fn repositories(&self) -> (Arc<dyn ParticipantRepository>, Arc<dyn MessageRepository>) {
        match self {
            Self::Postgres(storage) => (
                Arc::new(storage.participant_repository.clone()),
                Arc::new(storage.message_repository.clone()),
            ),
            Self::Memory(storage) => (
                Arc::new(storage.participant_repository.clone()),
                Arc::new(storage.message_repository.clone()),
            ),
        }
    }

    async fn close(&self) {
        if let Self::Postgres(storage) = self {
            storage.close().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let storage = Storage::connect(&config).await?;
    let (participant_repository, message_repository) = storage.repositories();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let presence_service = Arc::new(PresenceService::new(
        PresenceServiceDependencies {
            participant_repository,
            message_repository,
            clock,
        },
        PresenceSettings {
            operation_timeout: config.operation_timeout(),
            inactivity_timeout: config.inactivity_timeout(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = spawn_inactivity_reaper(
        presence_service.clone(),
        config.reap_interval(),
        shutdown_rx,
    );

    let app = router(AppState::new(presence_service)).layer(cors_layer(&config.server.cors_origins));
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(%address, "chat presence server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    // 接收端已退出时发送失败，可以忽略
    let _ = shutdown_tx.send(true);
    if let Err(err) = reaper.await {
        tracing::error!(error = %err, "inactivity reaper task failed");
    }
    storage.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
