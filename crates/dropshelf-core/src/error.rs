//! 客户端错误类型
//!
//! 区分传输层失败（连接、超时）与服务端返回的应用层错误，
//! 调用方可以据此决定提示方式。

use crate::entry::EntryId;

/// 客户端错误
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 请求未能到达服务端或响应未能读取
    #[error("connection error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 服务端返回非 2xx 状态，附带其 `error` 文本
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("entry {0} not found")]
    EntryNotFound(EntryId),

    /// 操作与条目当前状态不符（例如对未上传完成的条目执行管理操作）
    #[error("entry {id} is {state}, expected {expected}")]
    InvalidState {
        id: EntryId,
        state: &'static str,
        expected: &'static str,
    },

    #[error("another action is already running on entry {0}")]
    ActionInProgress(EntryId),

    /// 用户拒绝了确认提示
    #[error("cancelled by user")]
    Cancelled,
}

impl ClientError {
    /// 服务端报告的错误文本（仅应用层错误）
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
