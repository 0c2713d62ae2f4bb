use std::{num::NonZeroUsize, time::Duration};

use application::repository::{MessageRepository, ParticipantRepository};
use async_trait::async_trait;
use config::DatabaseConfig;
use domain::{
    ChatMessage, DisplayName, EpochMillis, MessageKind, MessageTime, Participant,
    RepositoryError, StoredMessage,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        other => RepositoryError::storage(other.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

pub async fn create_pg_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&config.url)
        .await?;
    tracing::info!(max_connections = config.max_connections, "postgres pool ready");
    Ok(pool)
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    name: String,
    last_status: i64,
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = RepositoryError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        let name = DisplayName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Participant {
            name,
            last_status: value.last_status,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    seq: i64,
    sender: String,
    recipient: String,
    body: Option<String>,
    kind: String,
    time: String,
}

impl TryFrom<MessageRecord> for StoredMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let kind = value
            .kind
            .parse::<MessageKind>()
            .map_err(|err| invalid_data(err.to_string()))?;
        let time = MessageTime::parse(value.time).map_err(|err| invalid_data(err.to_string()))?;
        Ok(StoredMessage {
            seq: value.seq,
            message: ChatMessage {
                from: value.sender,
                to: value.recipient,
                text: value.body,
                kind,
                time,
            },
        })
    }
}

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn exists(&self, name: &DisplayName) -> Result<bool, RepositoryError> {
        let (found,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM participants WHERE name_key = $1)")
                .bind(name.key())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(found)
    }

    async fn insert(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        // 主键冲突即名称冲突，见 map_sqlx_err
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            INSERT INTO participants (name_key, name, last_status)
            VALUES ($1, $2, $3)
            RETURNING name, last_status
            "#,
        )
        .bind(participant.name.key())
        .bind(participant.name.as_str())
        .bind(participant.last_status)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Participant::try_from(record)
    }

    async fn list(&self) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT name, last_status FROM participants ORDER BY name_key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Participant::try_from).collect()
    }

    async fn touch(&self, name: &DisplayName, now: EpochMillis) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE participants SET last_status = $2 WHERE name_key = $1")
            .bind(name.key())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn remove(&self, name: &DisplayName) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM participants WHERE name_key = $1")
            .bind(name.key())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn remove_inactive(
        &self,
        cutoff: EpochMillis,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            "DELETE FROM participants WHERE last_status < $1 RETURNING name, last_status",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Participant::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: ChatMessage) -> Result<StoredMessage, RepositoryError> {
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (sender, recipient, body, kind, time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING seq
            "#,
        )
        .bind(&message.from)
        .bind(&message.to)
        .bind(message.text.as_deref())
        .bind(message.kind.as_str())
        .bind(message.time.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(StoredMessage { seq, message })
    }

    async fn visible_to(
        &self,
        viewer: &DisplayName,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        // LIMIT NULL 表示不限制；先倒序截取最新的 N 条，再按 seq 升序返回
        let limit = limit.map(|n| i64::try_from(n.get()).unwrap_or(i64::MAX));
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT seq, sender, recipient, body, kind, time FROM (
                SELECT seq, sender, recipient, body, kind, time
                FROM messages
                WHERE kind IN ('message', 'status')
                   OR recipient = $2
                   OR lower(sender) = $1
                   OR lower(recipient) = $1
                ORDER BY seq DESC
                LIMIT $3
            ) recent
            ORDER BY seq ASC
            "#,
        )
        .bind(viewer.key())
        .bind(domain::BROADCAST_TOKEN)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(StoredMessage::try_from).collect()
    }
}

/// PostgreSQL 存储句柄，由启动流程显式创建并注入服务
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub participant_repository: PgParticipantRepository,
    pub message_repository: PgMessageRepository,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            participant_repository: PgParticipantRepository::new(pool.clone()),
            message_repository: PgMessageRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
