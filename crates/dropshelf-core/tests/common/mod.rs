//! 集成测试共用的内存后端与辅助函数

#![allow(dead_code)]

use async_trait::async_trait;
use dropshelf_core::action::{AliasKind, Confirm, ExtendTarget, Prompt};
use dropshelf_core::record::{
    AliasUpdate, Aliases, AllowedExpiration, CurrentExpiration, Expiration, ExpirationDate,
    ExpirationDuration, FileRecord, Links, Size,
};
use dropshelf_core::{Backend, ClientError, Result, UploadProgress, UploadSource};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn record(short: &str, timestamp: u64) -> FileRecord {
    FileRecord {
        name: format!("{short}.txt"),
        alias: Aliases {
            short: short.to_string(),
            long: format!("long-{short}"),
        },
        link: Links {
            short: format!("/{short}"),
            long: format!("/long-{short}"),
        },
        size: Size {
            bytes: 10,
            readable: "10 B".to_string(),
        },
        expiration: Expiration {
            current: CurrentExpiration {
                date: ExpirationDate {
                    timestamp,
                    readable: "in 1h".to_string(),
                },
                duration: ExpirationDuration {
                    readable: "1h".to_string(),
                    seconds: None,
                },
            },
            allowed: AllowedExpiration { seconds: 7200 },
        },
        admin_token: format!("admin-{short}"),
    }
}

pub fn expiration(readable: &str, timestamp: u64) -> CurrentExpiration {
    CurrentExpiration {
        date: ExpirationDate {
            timestamp,
            readable: readable.to_string(),
        },
        duration: ExpirationDuration {
            readable: readable.to_string(),
            seconds: None,
        },
    }
}

/// 按脚本应答的内存后端，记录每次调用
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub uploads: Mutex<VecDeque<Result<FileRecord>>>,
    pub validity: Mutex<VecDeque<Result<Vec<bool>>>>,
    pub alias_updates: Mutex<VecDeque<Result<AliasUpdate>>>,
    pub extensions: Mutex<VecDeque<Result<CurrentExpiration>>>,
    pub admin_failures: Mutex<VecDeque<ClientError>>,
    /// 设置后管理请求会等待通知才返回
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_upload(&self, result: Result<FileRecord>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn push_validity(&self, result: Result<Vec<bool>>) {
        self.validity.lock().unwrap().push_back(result);
    }

    pub fn push_alias_update(&self, result: Result<AliasUpdate>) {
        self.alias_updates.lock().unwrap().push_back(result);
    }

    pub fn push_extension(&self, result: Result<CurrentExpiration>) {
        self.extensions.lock().unwrap().push_back(result);
    }

    pub fn push_admin_failure(&self, error: ClientError) {
        self.admin_failures.lock().unwrap().push_back(error);
    }

    pub fn hold_admin_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    fn record_call(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn admin_result(&self) -> Result<()> {
        match self.admin_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn auth_required(&self) -> Result<bool> {
        self.record_call("auth".to_string());
        Ok(false)
    }

    async fn login(&self, username: &str, _password: &str) -> Result<String> {
        self.record_call(format!("login {username}"));
        Ok(format!("token-{username}"))
    }

    async fn upload(
        &self,
        source: &UploadSource,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<FileRecord> {
        self.record_call(format!("upload {}", source.name));
        progress.on_progress(source.size / 2, source.size);
        progress.on_progress(source.size, source.size);
        let scripted = self.uploads.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(record(source.name.trim_end_matches(".txt"), u64::MAX)))
    }

    async fn check_validity(&self, aliases: &[String]) -> Result<Vec<bool>> {
        self.record_call(format!("valid {}", aliases.join("+")));
        let scripted = self.validity.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(vec![true; aliases.len()]))
    }

    async fn regenerate_alias(
        &self,
        alias: &str,
        admin_token: &str,
        kind: AliasKind,
    ) -> Result<AliasUpdate> {
        self.record_call(format!("alias {alias} {kind} {admin_token}"));
        self.wait_gate().await;
        let scripted = self.alias_updates.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(AliasUpdate::default()))
    }

    async fn extend_expiration(
        &self,
        alias: &str,
        admin_token: &str,
        target: ExtendTarget,
    ) -> Result<CurrentExpiration> {
        self.record_call(format!(
            "extend {alias} {} {admin_token}",
            target.path_segment()
        ));
        self.wait_gate().await;
        let scripted = self.extensions.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(expiration("in 2h", u64::MAX)))
    }

    async fn set_downloads(&self, alias: &str, admin_token: &str, count: u16) -> Result<()> {
        self.record_call(format!("downloads {alias} {count} {admin_token}"));
        self.wait_gate().await;
        self.admin_result()
    }

    async fn revoke(&self, alias: &str, admin_token: &str) -> Result<()> {
        self.record_call(format!("revoke {alias} {admin_token}"));
        self.wait_gate().await;
        self.admin_result()
    }

    async fn download(
        &self,
        alias: &str,
        dest: &Path,
        progress: Arc<dyn UploadProgress>,
    ) -> Result<u64> {
        self.record_call(format!("download {alias}"));
        let content = format!("content of {alias}");
        tokio::fs::write(dest, &content).await?;
        let size = content.len() as u64;
        progress.on_progress(size, size);
        Ok(size)
    }
}

/// 固定应答并记录提示内容
pub struct ScriptedConfirm {
    answer: bool,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &Prompt) -> bool {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer
    }
}
