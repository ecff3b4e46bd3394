//! 会话文件列表
//!
//! 拥有条目成员关系与持久化；插入顺序即显示顺序。
//! 快照始终恰好是 `available` 与 `expired` 条目的记录，顺序不变。
//! 视图通过 [`FileListStore::subscribe`] 订阅状态变化并自行重绘。

use crate::cache::SnapshotCache;
use crate::entry::{EntryId, ExpiryOrigin, FileEntry};
use crate::error::{ClientError, Result};
use crate::record::FileRecord;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

/// 当前 Unix 时间（秒）
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// 列表变化通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(EntryId),
    Changed(EntryId),
    Removed(EntryId),
    Cleared,
}

/// 由条目数量与状态分布派生的界面开关
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Affordances {
    /// 至少有一个条目
    pub has_file: bool,
    /// 至少有一个不在上传中的条目
    pub has_clearable: bool,
    /// 至少两个可用条目（可以打包下载）
    pub has_availables: bool,
    /// 可用条目的短别名，以 `+` 连接
    pub archive_aliases: String,
}

impl Affordances {
    /// 打包下载所有可用文件的链接
    pub fn archive_link(&self, origin: &str) -> String {
        format!("{}/{}", origin.trim_end_matches('/'), self.archive_aliases)
    }
}

/// 一次本地过期扫描的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// 本次因本地时间戳过期而转为 `expired` 的条目
    pub expired: Vec<EntryId>,
    /// 仍需向服务端确认有效性的条目及其短别名
    pub to_check: Vec<(EntryId, String)>,
}

pub struct FileListStore {
    entries: Vec<FileEntry>,
    cache: Arc<dyn SnapshotCache>,
    next_id: u64,
    busy: HashSet<EntryId>,
    events: broadcast::Sender<StoreEvent>,
}

impl FileListStore {
    pub fn new(cache: Arc<dyn SnapshotCache>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            entries: Vec::new(),
            cache,
            next_id: 1,
            busy: HashSet::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // 没有订阅者时发送失败是正常的
        let _ = self.events.send(event);
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    /// 读取快照并恢复条目（直接进入 `available`），随后立即执行本地过期扫描
    ///
    /// 已有条目会先被丢弃，重复调用得到的列表与快照一致。
    pub fn load_cache(&mut self, now: u64) -> Result<SweepOutcome> {
        let records = self.cache.load();
        info!("Restoring {} cached file(s)", records.len());
        if !self.entries.is_empty() {
            self.entries.clear();
            self.busy.clear();
            self.emit(StoreEvent::Cleared);
        }
        for record in records {
            let id = self.allocate_id();
            self.entries.push(FileEntry::from_record(id, record));
            self.emit(StoreEvent::Added(id));
        }
        self.sweep_local(now)
    }

    /// 为一个待上传文件创建条目（尚未加入列表）
    pub fn new_pending(
        &mut self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> FileEntry {
        let id = self.allocate_id();
        FileEntry::pending(id, name, source)
    }

    pub fn add(&mut self, entry: FileEntry) -> Result<EntryId> {
        let id = entry.id();
        if self.index_of(id).is_some() {
            return Ok(id);
        }
        self.entries.push(entry);
        self.emit(StoreEvent::Added(id));
        self.save()?;
        Ok(id)
    }

    /// 按标识移除，条目不存在时静默返回 `false`
    pub fn remove(&mut self, id: EntryId) -> Result<bool> {
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        self.entries.remove(index);
        self.busy.remove(&id);
        self.emit(StoreEvent::Removed(id));
        self.save()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.busy.clear();
        self.emit(StoreEvent::Cleared);
        self.save()
    }

    /// 只移除 `expired` 条目，其余条目及顺序不变
    pub fn clear_expired(&mut self) -> Result<usize> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.is_expired() {
                removed.push(entry.id());
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.emit(StoreEvent::Removed(*id));
        }
        self.save()?;
        Ok(removed.len())
    }

    /// 需要持久化的记录：`available` ∪ `expired`，保持插入顺序
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.entries
            .iter()
            .filter(|entry| entry.is_persisted())
            .filter_map(|entry| entry.record().cloned())
            .collect()
    }

    pub fn save(&self) -> Result<()> {
        self.cache.store(&self.snapshot())
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&FileEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// 按短别名或长别名查找
    pub fn find_by_alias(&self, alias: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|entry| {
            entry
                .record()
                .is_some_and(|r| r.alias.short == alias || r.alias.long == alias)
        })
    }

    fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    /// 修改一个条目；若修改触及持久化字段则保存快照
    pub fn update<T>(
        &mut self,
        id: EntryId,
        f: impl FnOnce(&mut FileEntry) -> Result<T>,
    ) -> Result<T> {
        let index = self.index_of(id).ok_or(ClientError::EntryNotFound(id))?;
        let entry = &mut self.entries[index];
        let was_persisted = entry.is_persisted();
        let value = f(entry)?;
        let persist = was_persisted || entry.is_persisted();
        self.emit(StoreEvent::Changed(id));
        if persist {
            self.save()?;
        }
        Ok(value)
    }

    /// 上传进度不是状态转换，不发通知也不保存
    pub fn set_progress(&mut self, id: EntryId, progress: f64) {
        if let Some(index) = self.index_of(id) {
            self.entries[index].set_progress(progress);
        }
    }

    /// 本地过期扫描
    ///
    /// 时间戳已过的 `available` 条目直接转为 `expired`（不发网络请求），
    /// 其余 `available` 条目汇总到 `to_check` 交给远端有效性检查。
    pub fn sweep_local(&mut self, now: u64) -> Result<SweepOutcome> {
        let mut outcome = SweepOutcome::default();
        for entry in &mut self.entries {
            if !entry.is_available() {
                continue;
            }
            let Some(record) = entry.record() else {
                continue;
            };
            if record.is_past_expiration(now) {
                entry.mark_expired(ExpiryOrigin::Local);
                outcome.expired.push(entry.id());
            } else {
                let alias = record.alias.short.clone();
                outcome.to_check.push((entry.id(), alias));
            }
        }
        for id in &outcome.expired {
            debug!("Entry {} expired locally", id);
            self.emit(StoreEvent::Changed(*id));
        }
        if !outcome.expired.is_empty() {
            self.save()?;
        }
        Ok(outcome)
    }

    /// 应用远端有效性结果，返回被标记为失效的条目
    ///
    /// 只处理仍为 `available` 且别名未变的条目；期间被移除或改名的条目跳过。
    pub fn apply_validity(
        &mut self,
        checked: &[(EntryId, String)],
        valid: &[bool],
    ) -> Result<Vec<EntryId>> {
        if checked.len() != valid.len() {
            warn!(
                "Validity response length mismatch: asked {}, got {}",
                checked.len(),
                valid.len()
            );
        }
        let mut drained = Vec::new();
        for ((id, alias), is_valid) in checked.iter().zip(valid) {
            if *is_valid {
                continue;
            }
            let Some(index) = self.index_of(*id) else {
                continue;
            };
            let entry = &mut self.entries[index];
            if entry.short_alias() != Some(alias.as_str()) {
                continue;
            }
            if entry.mark_expired(ExpiryOrigin::Remote) {
                drained.push(*id);
            }
        }
        for id in &drained {
            debug!("Entry {} drained remotely", id);
            self.emit(StoreEvent::Changed(*id));
        }
        if !drained.is_empty() {
            self.save()?;
        }
        Ok(drained)
    }

    pub fn affordances(&self) -> Affordances {
        let available: Vec<&str> = self
            .entries
            .iter()
            .filter(|entry| entry.is_available())
            .filter_map(|entry| entry.short_alias())
            .collect();
        Affordances {
            has_file: !self.entries.is_empty(),
            has_clearable: self.entries.iter().any(|entry| !entry.is_uploading()),
            has_availables: available.len() >= 2,
            archive_aliases: available.join("+"),
        }
    }

    /// 标记条目有管理操作正在进行；同一条目的操作串行执行
    pub fn begin_action(&mut self, id: EntryId) -> Result<()> {
        if self.index_of(id).is_none() {
            return Err(ClientError::EntryNotFound(id));
        }
        if !self.busy.insert(id) {
            return Err(ClientError::ActionInProgress(id));
        }
        Ok(())
    }

    pub fn end_action(&mut self, id: EntryId) {
        self.busy.remove(&id);
    }

    pub fn is_busy(&self, id: EntryId) -> bool {
        self.busy.contains(&id)
    }
}
