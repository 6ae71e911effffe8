//! HTTP服务器模块 - 下载任务 API 以及调用它的客户端

pub mod client;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod validation;

pub use models::*;
pub use server::*;
pub use state::*;
