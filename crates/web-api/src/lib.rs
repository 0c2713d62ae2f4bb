//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP 请求委托给应用层的 `PresenceService`。

mod cors;
mod error;
mod extract;
mod routes;
mod state;

pub use cors::cors_layer;
pub use error::ApiError;
pub use extract::IDENTITY_HEADER;
pub use routes::router;
pub use state::AppState;
