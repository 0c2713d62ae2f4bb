//! 基础设施层实现。
//!
//! 提供参与者注册表与消息存储的 PostgreSQL 和内存两种实现。

pub mod memory;
pub mod migrations;
pub mod repository;

pub use memory::{InMemoryMessageRepository, InMemoryParticipantRepository, MemoryStorage};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgMessageRepository, PgParticipantRepository, PgStorage};
