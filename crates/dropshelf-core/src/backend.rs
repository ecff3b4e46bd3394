//! 服务端接口抽象
//!
//! 会话逻辑只依赖这个 trait，HTTP 实现见 [`crate::http::HttpBackend`]，
//! 测试可以替换为内存实现。

use crate::action::{AliasKind, ExtendTarget};
use crate::error::Result;
use crate::record::{AliasUpdate, CurrentExpiration, FileRecord};
use crate::upload::{UploadProgress, UploadSource};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /auth`，返回是否需要登录
    async fn auth_required(&self) -> Result<bool>;

    /// `POST /auth`，返回会话令牌
    async fn login(&self, username: &str, password: &str) -> Result<String>;

    /// `POST /`，只有 201 视为成功
    async fn upload(
        &self,
        source: &UploadSource,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<FileRecord>;

    /// `GET /valid/{a}+{b}+...`，按请求顺序返回有效性
    async fn check_validity(&self, aliases: &[String]) -> Result<Vec<bool>>;

    /// `PATCH /{alias}/alias[/{short|long}]`
    async fn regenerate_alias(
        &self,
        alias: &str,
        admin_token: &str,
        kind: AliasKind,
    ) -> Result<AliasUpdate>;

    /// `PATCH /{alias}/expiration/{initial|max|<seconds>}`
    async fn extend_expiration(
        &self,
        alias: &str,
        admin_token: &str,
        target: ExtendTarget,
    ) -> Result<CurrentExpiration>;

    /// `PATCH /{alias}/downloads/{n}`，0 表示不限
    async fn set_downloads(&self, alias: &str, admin_token: &str, count: u16) -> Result<()>;

    /// `DELETE /{alias}`
    async fn revoke(&self, alias: &str, admin_token: &str) -> Result<()>;

    /// `GET /{alias}`，把文件内容写入 `dest`，返回写入的字节数
    async fn download(
        &self,
        alias: &str,
        dest: &Path,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<u64>;
}
