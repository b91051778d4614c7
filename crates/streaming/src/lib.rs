//! # Streaming
//!
//! SSE 接入层。
//!
//! 负责：
//! - `GET {prefix}/:channel`：为每个客户端建立订阅并以 SSE 推送事件
//! - `POST /publish`：写入内存历史后发布事件
//! - `GET /health`、`GET /stats`
//! - 优雅关闭：先关闭 dispatcher，再等待连接结束

pub mod encoder;
pub mod error;
pub mod handler;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, EncodeError, ServerError};
pub use handler::SubscriptionStream;
pub use routes::{router, PublishRequest, PublishResponse, StatsResponse};
pub use server::HttpServer;
pub use state::AppState;
