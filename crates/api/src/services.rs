//! Service wiring: stores, stream transport and the two consumer runtimes.

use std::sync::Arc;

use consumer::{
    ConsumerRuntime, INVENTORY_GROUP, INVENTORY_TOPIC, ORDER_GROUP, ORDER_TOPIC,
    ProjectionHandler, Shutdown,
};
use event_stream::{ConsumerGroup, InMemoryBroker, PgBroker, PgBrokerOptions};
use projections::{InventoryProjection, OrderProjection};
use read_store::{
    InMemoryInventoryStore, InMemoryOrderStore, InventoryStore, OrderStore, PgInventoryStore,
    PgOrderStore,
};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::AppState;
use crate::config::Config;

/// Failures that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// The stream transport behind both consumer runtimes.
#[derive(Clone)]
pub enum Backend {
    InMemory(InMemoryBroker),
    Postgres(PgBroker),
}

impl Backend {
    fn consumer_group(&self, group_id: &str) -> Arc<dyn ConsumerGroup> {
        match self {
            Backend::InMemory(broker) => Arc::new(broker.consumer_group(group_id)),
            Backend::Postgres(broker) => Arc::new(broker.consumer_group(group_id)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::InMemory(_) => "in-memory",
            Backend::Postgres(_) => "postgres",
        }
    }
}

/// Everything the binary runs: HTTP state plus the consumer runtimes.
pub struct Services {
    pub state: Arc<AppState>,
    pub inventory_consumer: Arc<ConsumerRuntime>,
    pub order_consumer: Arc<ConsumerRuntime>,
    pub backend: Backend,
}

impl Services {
    /// Connects to PostgreSQL when `DATABASE_URL` is set, otherwise runs in memory.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        match &config.database_url {
            Some(url) => Self::postgres(config, url).await,
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store and broker");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Connects, runs migrations and wires PostgreSQL stores and broker.
    pub async fn postgres(config: &Config, database_url: &str) -> Result<Self, StartupError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(database_url)
            .await?;
        read_store::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");

        let broker = PgBroker::new(
            pool.clone(),
            PgBrokerOptions {
                partitions: config.stream_partitions,
                poll_interval: config.stream_poll_interval,
                session_timeout: config.stream_session_timeout,
                ..PgBrokerOptions::default()
            },
        );

        Ok(Self::assemble(
            config,
            Arc::new(PgInventoryStore::new(pool.clone())),
            Arc::new(PgOrderStore::new(pool)),
            Backend::Postgres(broker),
        ))
    }

    /// Wires in-memory stores and broker.
    pub fn in_memory(config: &Config) -> Self {
        Self::assemble(
            config,
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            Backend::InMemory(InMemoryBroker::new(config.stream_partitions)),
        )
    }

    fn assemble(
        config: &Config,
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderStore>,
        backend: Backend,
    ) -> Self {
        let inventory_consumer = Arc::new(
            ConsumerRuntime::new(
                "inventory",
                INVENTORY_TOPIC,
                backend.consumer_group(INVENTORY_GROUP),
                Arc::new(ProjectionHandler::new(InventoryProjection::new(
                    inventory.clone(),
                ))),
            )
            .with_retry_backoff(config.consumer_retry_backoff),
        );

        let order_consumer = Arc::new(
            ConsumerRuntime::new(
                "orders",
                ORDER_TOPIC,
                backend.consumer_group(ORDER_GROUP),
                Arc::new(ProjectionHandler::new(OrderProjection::new(orders.clone()))),
            )
            .with_retry_backoff(config.consumer_retry_backoff),
        );

        let state = Arc::new(AppState {
            inventory,
            orders,
            consumers: vec![
                ("inventory", inventory_consumer.handle()),
                ("orders", order_consumer.handle()),
            ],
        });

        tracing::info!(backend = backend.name(), "Services assembled");

        Self {
            state,
            inventory_consumer,
            order_consumer,
            backend,
        }
    }

    /// Spawns both runtimes on the shared shutdown token.
    pub fn spawn_consumers(&self, shutdown: &Shutdown) -> Vec<JoinHandle<consumer::Result<()>>> {
        [&self.inventory_consumer, &self.order_consumer]
            .into_iter()
            .map(|runtime| {
                let runtime = runtime.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { runtime.run(shutdown).await })
            })
            .collect()
    }

    /// Waits until both runtimes hold their first assignment.
    pub async fn wait_until_ready(&self) {
        for runtime in [&self.inventory_consumer, &self.order_consumer] {
            if let Some(epoch) = runtime.handle().ready().await {
                tracing::info!(runtime = runtime.name(), epoch, "Consumer ready");
            }
        }
    }
}
