//! 文件记录
//!
//! 服务端上传响应与本地快照共用的数据结构，JSON 字段名与服务端保持一致。

use serde::{Deserialize, Serialize};

/// 一个已上传文件的完整元数据（持久化单元）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub alias: Aliases,
    pub link: Links,
    pub size: Size,
    pub expiration: Expiration,
    /// 管理令牌，所有修改类请求都需要携带
    #[serde(rename = "admin", alias = "admin_token")]
    pub admin_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aliases {
    pub short: String,
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    pub short: String,
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub bytes: u64,
    pub readable: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiration {
    pub current: CurrentExpiration,
    pub allowed: AllowedExpiration,
}

/// 当前过期时间，也是延长过期时间接口的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentExpiration {
    pub date: ExpirationDate,
    pub duration: ExpirationDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationDate {
    /// Unix 时间戳（秒）
    pub timestamp: u64,
    pub readable: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationDuration {
    pub readable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedExpiration {
    pub seconds: u64,
}

/// 别名重新生成接口的响应，只包含被修改的一侧
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AliasUpdate {
    pub alias: PartialPair,
    pub link: PartialPair,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartialPair {
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
}

impl FileRecord {
    /// 是否已超过本地记录的过期时间
    pub fn is_past_expiration(&self, now: u64) -> bool {
        self.expiration.current.date.timestamp < now
    }
}
