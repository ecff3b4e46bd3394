//! HTTP 后端
//!
//! 基于 reqwest 的 [`Backend`] 实现。
//!
//! - 会话令牌以 `session=<token>` Cookie 附加到每个请求
//! - 管理令牌同时放在 `Authorization` 与 `X-Authorization` 头中
//! - 非 2xx 响应解析 `{"error": "..."}` 为 [`ClientError::Api`]

use crate::action::{AliasKind, ExtendTarget};
use crate::backend::Backend;
use crate::error::{ClientError, Result};
use crate::record::{AliasUpdate, CurrentExpiration, FileRecord};
use crate::upload::{UploadProgress, UploadSource};
use crate::validity::valid_path;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// 默认请求超时（上传请求不受此限制）
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct AuthStatus {
    required: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ValidityCheck {
    valid: Vec<bool>,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    session_token: Option<String>,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, self.build_url(path));
        if let Some(token) = &self.session_token {
            req = req.header(header::COOKIE, format!("session={token}"));
        }
        req
    }

    fn admin_request(&self, method: Method, path: &str, admin_token: &str) -> RequestBuilder {
        self.request(method, path)
            .timeout(self.timeout)
            .header(header::AUTHORIZATION, admin_token)
            .header("X-Authorization", admin_token)
    }

    /// 发送请求，非 2xx 转换为应用层错误
    async fn send(req: RequestBuilder) -> Result<Response> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(api_error(status, response).await)
    }

    /// 把响应体逐块写入文件
    async fn write_body(
        response: Response,
        dest: &Path,
        progress: &dyn UploadProgress,
    ) -> Result<u64> {
        let total = response.content_length().unwrap_or(0);
        let mut file = File::create(dest).await?;
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress.on_progress(received, total.max(received));
        }
        file.flush().await?;
        Ok(received)
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let response = Self::send(req).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// 从失败响应中提取服务端的错误文本
async fn api_error(status: StatusCode, response: Response) -> ClientError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .ok()
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_lowercase()
        });
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn auth_required(&self) -> Result<bool> {
        let status: AuthStatus =
            Self::send_json(self.request(Method::GET, "/auth").timeout(self.timeout)).await?;
        Ok(status.required)
    }

    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let req = self
            .request(Method::POST, "/auth")
            .timeout(self.timeout)
            .json(&LoginRequest { username, password });
        let response: LoginResponse = Self::send_json(req).await?;
        info!("Logged in as {}", username);
        Ok(response.token)
    }

    async fn upload(
        &self,
        source: &UploadSource,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<FileRecord> {
        debug!("Uploading {:?} ({} bytes)", source.path, source.size);
        let req = self
            .request(Method::POST, "/")
            .header("X-Filename", source.encoded_name())
            .header(header::CONTENT_TYPE, source.mime_type.as_str())
            .header(header::CONTENT_LENGTH, source.size)
            .header(header::ACCEPT, "application/json")
            .body(source.body(progress).await?);

        let response = req.send().await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(api_error(status, response).await);
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check_validity(&self, aliases: &[String]) -> Result<Vec<bool>> {
        let req = self
            .request(Method::GET, &valid_path(aliases))
            .timeout(self.timeout);
        let check: ValidityCheck = Self::send_json(req).await?;
        Ok(check.valid)
    }

    async fn regenerate_alias(
        &self,
        alias: &str,
        admin_token: &str,
        kind: AliasKind,
    ) -> Result<AliasUpdate> {
        let path = match kind.path_suffix() {
            Some(suffix) => format!("/{alias}/alias/{suffix}"),
            None => format!("/{alias}/alias"),
        };
        Self::send_json(self.admin_request(Method::PATCH, &path, admin_token)).await
    }

    async fn extend_expiration(
        &self,
        alias: &str,
        admin_token: &str,
        target: ExtendTarget,
    ) -> Result<CurrentExpiration> {
        let path = format!("/{alias}/expiration/{}", target.path_segment());
        Self::send_json(self.admin_request(Method::PATCH, &path, admin_token)).await
    }

    async fn set_downloads(&self, alias: &str, admin_token: &str, count: u16) -> Result<()> {
        let path = format!("/{alias}/downloads/{count}");
        Self::send(self.admin_request(Method::PATCH, &path, admin_token)).await?;
        Ok(())
    }

    async fn revoke(&self, alias: &str, admin_token: &str) -> Result<()> {
        Self::send(self.admin_request(Method::DELETE, &format!("/{alias}"), admin_token)).await?;
        Ok(())
    }

    async fn download(
        &self,
        alias: &str,
        dest: &Path,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<u64> {
        let response = Self::send(self.request(Method::GET, &format!("/{alias}"))).await?;
        match Self::write_body(response, dest, progress.as_ref()).await {
            Ok(received) => {
                info!("Downloaded {} to {:?} ({} bytes)", alias, dest, received);
                Ok(received)
            }
            Err(e) => {
                // 不留下写了一半的文件
                if let Err(remove) = tokio::fs::remove_file(dest).await {
                    warn!("Failed to remove partial download {:?}: {}", dest, remove);
                }
                Err(e)
            }
        }
    }
}
