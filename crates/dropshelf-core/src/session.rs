//! 会话
//!
//! 把文件列表、服务端接口与用户确认组合在一起，提供上层操作:
//!
//! 1. 选择文件 → 创建 `upload` 条目并加入列表
//! 2. 逐个上传，成功转为 `available`，失败转为 `error`
//! 3. 定时扫描：本地时间戳过期直接标记，其余合并为一次远端有效性查询
//! 4. 管理操作：确认 → 请求 → 成功后更新条目并保存快照
//!
//! 同一条目上的管理操作串行执行；操作进行中条目被移除时，响应被丢弃；
//! 被扫描标记为过期时，响应仍会更新记录字段但不会恢复其状态。

use crate::action::{AliasKind, Confirm, ExtendTarget, Prompt};
use crate::backend::Backend;
use crate::cache::SnapshotCache;
use crate::entry::{EntryId, FileEntry};
use crate::error::{ClientError, Result};
use crate::store::{Affordances, FileListStore, StoreEvent, unix_now};
use crate::upload::{
    DEFAULT_PROGRESS_DELAY, NoProgress, ProgressGate, UploadProgress, UploadSource, fraction,
};
use crate::validity::RemoteValidityChecker;
use log::{debug, error, info, warn};
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// 默认扫描间隔
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// 一次扫描的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// 本地时间戳过期
    pub expired: Vec<EntryId>,
    /// 服务端报告失效
    pub drained: Vec<EntryId>,
    /// 是否发出了远端查询
    pub checked_remote: bool,
}

pub struct Session {
    store: Arc<Mutex<FileListStore>>,
    backend: Arc<dyn Backend>,
    checker: RemoteValidityChecker,
    confirm: Arc<dyn Confirm>,
    visible: AtomicBool,
    progress_delay: Duration,
}

impl Session {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: Arc<dyn SnapshotCache>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(FileListStore::new(cache))),
            checker: RemoteValidityChecker::new(backend.clone()),
            backend,
            confirm,
            visible: AtomicBool::new(true),
            progress_delay: DEFAULT_PROGRESS_DELAY,
        }
    }

    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = delay;
        self
    }

    fn store(&self) -> MutexGuard<'_, FileListStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store().subscribe()
    }

    /// 当前条目的副本，按显示顺序
    pub fn entries(&self) -> Vec<FileEntry> {
        self.store().entries().to_vec()
    }

    pub fn entry(&self, id: EntryId) -> Option<FileEntry> {
        self.store().get(id).cloned()
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<FileEntry> {
        self.store().find_by_alias(alias).cloned()
    }

    pub fn affordances(&self) -> Affordances {
        self.store().affordances()
    }

    /// 前台可见时才发出远端有效性查询
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    /// 恢复快照并立即扫描一次
    pub async fn load(&self) -> Result<SweepReport> {
        let outcome = self.store().load_cache(unix_now())?;
        self.finish_sweep(outcome.expired, outcome.to_check).await
    }

    /// 过期扫描（本地 + 合并的远端查询）
    pub async fn sweep(&self) -> Result<SweepReport> {
        let outcome = self.store().sweep_local(unix_now())?;
        self.finish_sweep(outcome.expired, outcome.to_check).await
    }

    async fn finish_sweep(
        &self,
        expired: Vec<EntryId>,
        to_check: Vec<(EntryId, String)>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport {
            expired,
            ..Default::default()
        };
        if to_check.is_empty() || !self.is_visible() {
            return Ok(report);
        }
        report.checked_remote = true;
        if let Some(valid) = self.checker.check(&to_check).await {
            report.drained = self.store().apply_validity(&to_check, &valid)?;
        }
        Ok(report)
    }

    /// 按固定间隔扫描，直到 `shutdown` 完成
    pub async fn run_sweeper(&self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即完成，加载时已经扫描过
        ticker.tick().await;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    debug!("Sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(report) => {
                            if !report.expired.is_empty() || !report.drained.is_empty() {
                                info!(
                                    "Sweep: {} expired, {} drained",
                                    report.expired.len(),
                                    report.drained.len()
                                );
                            }
                        }
                        Err(e) => warn!("Sweep failed: {}", e),
                    }
                }
            }
        }
    }

    /// 把选中的文件加入列表（`upload` 状态），跳过目录等非常规文件
    pub async fn enqueue<P: Into<PathBuf>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Vec<EntryId>> {
        let mut ids = Vec::new();
        for path in paths {
            let path = path.into();
            let Some(source) = UploadSource::open(&path).await? else {
                continue;
            };
            let mut store = self.store();
            let entry = store.new_pending(source.name, source.path);
            ids.push(store.add(entry)?);
        }
        Ok(ids)
    }

    /// 上传一个 `upload` 状态的条目
    ///
    /// 成功（201）转为 `available` 并保存返回的元数据；其它任何结果转为
    /// `error` 并保存错误文本。`observer` 只在延迟之后收到进度。
    pub async fn upload(
        &self,
        id: EntryId,
        observer: Option<Arc<dyn UploadProgress>>,
    ) -> Result<()> {
        let path = {
            let store = self.store();
            let entry = store.get(id).ok_or(ClientError::EntryNotFound(id))?;
            if !entry.is_uploading() {
                return Err(ClientError::InvalidState {
                    id,
                    state: entry.state().name(),
                    expected: "upload",
                });
            }
            entry
                .source()
                .map(PathBuf::from)
                .ok_or(ClientError::EntryNotFound(id))?
        };

        let observer: Arc<dyn UploadProgress> = match observer {
            Some(observer) => observer,
            None => Arc::new(NoProgress),
        };
        let display = Arc::new(ProgressGate::new(observer, self.progress_delay));
        let progress = Arc::new(TrackProgress {
            store: self.store.clone(),
            id,
            display: display.clone(),
        });

        let result = match UploadSource::open(&path).await {
            Ok(Some(source)) => self.backend.upload(&source, progress).await,
            Ok(None) => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ))),
            Err(e) => Err(e),
        };
        display.finish();

        let mut store = self.store();
        if store.get(id).is_none() {
            debug!("Entry {} was removed during upload", id);
            return Ok(());
        }
        match result {
            Ok(record) => {
                info!("Uploaded {} as {}", record.name, record.link.short);
                store.update(id, |entry| entry.complete_upload(record))
            }
            Err(e) => {
                let message = e.server_message().map_or_else(|| e.to_string(), str::to_string);
                error!("Upload of entry {} failed: {}", id, message);
                store.update(id, |entry| entry.fail_upload(message))
            }
        }
    }

    /// 依次上传所有 `upload` 状态的条目
    pub async fn upload_pending(
        &self,
        observer: impl Fn(EntryId) -> Option<Arc<dyn UploadProgress>>,
    ) -> Vec<(EntryId, Result<()>)> {
        let pending: Vec<EntryId> = self
            .store()
            .entries()
            .iter()
            .filter(|entry| entry.is_uploading())
            .map(FileEntry::id)
            .collect();
        let mut results = Vec::with_capacity(pending.len());
        for id in pending {
            let result = self.upload(id, observer(id)).await;
            results.push((id, result));
        }
        results
    }

    fn ask(&self, prompt: &Prompt) -> Result<()> {
        if self.confirm.confirm(prompt) {
            Ok(())
        } else {
            Err(ClientError::Cancelled)
        }
    }

    /// 取得条目的别名与管理令牌并占用该条目
    fn begin_admin(&self, id: EntryId) -> Result<(String, String)> {
        let mut store = self.store();
        let entry = store.get(id).ok_or(ClientError::EntryNotFound(id))?;
        let record = entry.available_record()?;
        let credentials = (record.alias.short.clone(), record.admin_token.clone());
        store.begin_action(id)?;
        Ok(credentials)
    }

    /// 释放条目并在条目仍存在时应用修改
    fn finish_admin<T>(
        &self,
        id: EntryId,
        apply: impl FnOnce(&mut FileEntry) -> Result<T>,
    ) -> Result<Option<T>> {
        let mut store = self.store();
        store.end_action(id);
        if store.get(id).is_none() {
            debug!("Entry {} was removed while an action was in flight", id);
            return Ok(None);
        }
        store.update(id, apply).map(Some)
    }

    pub async fn regenerate_alias(&self, id: EntryId, kind: AliasKind) -> Result<()> {
        self.ask(&Prompt::RegenerateAlias(kind))?;
        let (alias, token) = self.begin_admin(id)?;
        let result = self.backend.regenerate_alias(&alias, &token, kind).await;
        match result {
            Ok(update) => {
                self.finish_admin(id, |entry| entry.apply_alias_update(kind, &update))?;
                info!("Regenerated {} alias of {}", kind, alias);
                Ok(())
            }
            Err(e) => {
                self.store().end_action(id);
                error!("An error occurred while trying to generate {} alias: {}", kind, e);
                Err(e)
            }
        }
    }

    pub async fn extend(
        &self,
        id: EntryId,
        target: ExtendTarget,
        label: Option<String>,
    ) -> Result<()> {
        self.ask(&Prompt::Extend { target, label })?;
        let (alias, token) = self.begin_admin(id)?;
        match self.backend.extend_expiration(&alias, &token, target).await {
            Ok(current) => {
                self.finish_admin(id, |entry| entry.apply_expiration(current))?;
                info!("Extended expiration of {}", alias);
                Ok(())
            }
            Err(e) => {
                self.store().end_action(id);
                error!("An error occurred while trying to extend expiration: {}", e);
                Err(e)
            }
        }
    }

    /// 设置最大下载次数（0 = 不限），无需确认
    pub async fn set_downloads(&self, id: EntryId, count: u16) -> Result<()> {
        let (alias, token) = self.begin_admin(id)?;
        let result = self.backend.set_downloads(&alias, &token, count).await;
        self.store().end_action(id);
        if let Err(e) = &result {
            error!("An error occurred while trying to set downloads limit: {}", e);
        }
        result
    }

    /// 仅从本地列表移除，服务端文件不受影响
    pub fn forget(&self, id: EntryId) -> Result<bool> {
        self.ask(&Prompt::Forget)?;
        self.store().remove(id)
    }

    /// 移除出错或已过期的条目，无需确认
    pub fn dismiss(&self, id: EntryId) -> Result<bool> {
        self.store().remove(id)
    }

    /// 删除服务端文件，成功后从本地列表移除
    pub async fn revoke(&self, id: EntryId) -> Result<()> {
        self.ask(&Prompt::Revoke)?;
        let (alias, token) = self.begin_admin(id)?;
        let result = self.backend.revoke(&alias, &token).await;
        let mut store = self.store();
        store.end_action(id);
        match result {
            Ok(()) => {
                store.remove(id)?;
                info!("Revoked {}", alias);
                Ok(())
            }
            Err(e) => {
                error!("An error occurred while trying to revoke this file: {}", e);
                Err(e)
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.ask(&Prompt::ClearSession)?;
        self.store().clear()
    }

    pub fn clear_expired(&self) -> Result<usize> {
        self.store().clear_expired()
    }

    /// 下载可用条目的文件到 `dir`，同名文件已存在时不覆盖
    pub async fn download(
        &self,
        id: EntryId,
        dir: &Path,
        progress: Option<Arc<dyn UploadProgress>>,
    ) -> Result<PathBuf> {
        let (alias, name) = {
            let store = self.store();
            let entry = store.get(id).ok_or(ClientError::EntryNotFound(id))?;
            let record = entry.available_record()?;
            (record.alias.short.clone(), record.name.clone())
        };
        let file_name = Path::new(&name)
            .file_name()
            .map_or_else(|| OsString::from(alias.as_str()), OsStr::to_os_string);
        let dest = dir.join(file_name);
        if tokio::fs::try_exists(&dest).await? {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            )));
        }

        let progress = progress.unwrap_or_else(|| Arc::new(NoProgress));
        match self.backend.download(&alias, &dest, progress).await {
            Ok(_) => Ok(dest),
            Err(e) => {
                error!("An error occurred while trying to download this file: {}", e);
                Err(e)
            }
        }
    }

    pub async fn auth_required(&self) -> Result<bool> {
        self.backend.auth_required().await
    }
}

/// 记录上传进度并转发给（延迟显示的）观察者
struct TrackProgress {
    store: Arc<Mutex<FileListStore>>,
    id: EntryId,
    display: Arc<ProgressGate<Arc<dyn UploadProgress>>>,
}

impl UploadProgress for TrackProgress {
    fn on_progress(&self, sent: u64, total: u64) {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_progress(self.id, fraction(sent, total));
        self.display.on_progress(sent, total);
    }
}
