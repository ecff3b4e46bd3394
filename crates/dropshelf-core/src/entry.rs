//! 文件条目状态机
//!
//! 生命周期:
//!
//! ```text
//! Upload ──201──▶ Available ──过期/失效──▶ Expired
//!    └──其它状态码──▶ Error
//! ```
//!
//! `Expired` 与 `Error` 为终态，只能由用户显式移除。
//! 从快照恢复的条目直接进入 `Available`，跳过上传阶段。

use crate::action::AliasKind;
use crate::error::{ClientError, Result};
use crate::record::{AliasUpdate, CurrentExpiration, FileRecord};
use std::fmt;
use std::path::{Path, PathBuf};

/// 会话内唯一的条目标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntryId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 过期的检测来源，仅影响显示标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOrigin {
    /// 本地时间戳已过
    Local,
    /// 服务端报告别名已失效（下载次数耗尽或被删除）
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Upload { progress: f64 },
    Available,
    Error { message: String },
    Expired { origin: ExpiryOrigin },
}

impl EntryState {
    pub fn name(&self) -> &'static str {
        match self {
            EntryState::Upload { .. } => "upload",
            EntryState::Available => "available",
            EntryState::Error { .. } => "error",
            EntryState::Expired { .. } => "expired",
        }
    }

    /// 显示用标签
    pub fn label(&self) -> &'static str {
        match self {
            EntryState::Upload { .. } => "Uploading",
            EntryState::Available => "Available",
            EntryState::Error { .. } => "Error",
            EntryState::Expired {
                origin: ExpiryOrigin::Local,
            } => "Expired",
            EntryState::Expired {
                origin: ExpiryOrigin::Remote,
            } => "Drained",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    id: EntryId,
    name: String,
    source: Option<PathBuf>,
    state: EntryState,
    record: Option<FileRecord>,
}

impl FileEntry {
    /// 为待上传的本地文件创建条目
    pub fn pending(id: EntryId, name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            source: Some(source.into()),
            state: EntryState::Upload { progress: 0.0 },
            record: None,
        }
    }

    /// 从快照记录恢复条目
    pub fn from_record(id: EntryId, record: FileRecord) -> Self {
        Self {
            id,
            name: record.name.clone(),
            source: None,
            state: EntryState::Available,
            record: Some(record),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn record(&self) -> Option<&FileRecord> {
        self.record.as_ref()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, EntryState::Available)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.state, EntryState::Expired { .. })
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self.state, EntryState::Upload { .. })
    }

    /// 只有 `available` 与 `expired` 会写入快照
    pub fn is_persisted(&self) -> bool {
        self.record.is_some() && (self.is_available() || self.is_expired())
    }

    /// 当前短别名（管理请求的路径键）
    pub fn short_alias(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.alias.short.as_str())
    }

    /// 需要 `Available` 状态的操作使用的记录访问
    pub fn available_record(&self) -> Result<&FileRecord> {
        match (&self.state, &self.record) {
            (EntryState::Available, Some(record)) => Ok(record),
            _ => Err(self.invalid_state("available")),
        }
    }

    pub fn set_progress(&mut self, value: f64) {
        if let EntryState::Upload { progress } = &mut self.state {
            *progress = value.clamp(0.0, 1.0);
        }
    }

    pub fn complete_upload(&mut self, record: FileRecord) -> Result<()> {
        if !self.is_uploading() {
            return Err(self.invalid_state("upload"));
        }
        self.name = record.name.clone();
        self.record = Some(record);
        self.state = EntryState::Available;
        Ok(())
    }

    pub fn fail_upload(&mut self, message: impl Into<String>) -> Result<()> {
        if !self.is_uploading() {
            return Err(self.invalid_state("upload"));
        }
        self.state = EntryState::Error {
            message: message.into(),
        };
        Ok(())
    }

    /// 标记为过期，返回状态是否发生变化
    pub fn mark_expired(&mut self, origin: ExpiryOrigin) -> bool {
        if !self.is_available() {
            return false;
        }
        self.state = EntryState::Expired { origin };
        true
    }

    /// 应用别名重新生成的结果，只修改请求对应的一侧
    pub fn apply_alias_update(&mut self, kind: AliasKind, update: &AliasUpdate) -> Result<()> {
        let id = self.id;
        let record = self.record.as_mut().ok_or(ClientError::EntryNotFound(id))?;
        if kind.touches_short() {
            if let (Some(alias), Some(link)) = (&update.alias.short, &update.link.short) {
                record.alias.short.clone_from(alias);
                record.link.short.clone_from(link);
            }
        }
        if kind.touches_long() {
            if let (Some(alias), Some(link)) = (&update.alias.long, &update.link.long) {
                record.alias.long.clone_from(alias);
                record.link.long.clone_from(link);
            }
        }
        Ok(())
    }

    pub fn apply_expiration(&mut self, current: CurrentExpiration) -> Result<()> {
        let id = self.id;
        let record = self.record.as_mut().ok_or(ClientError::EntryNotFound(id))?;
        record.expiration.current = current;
        Ok(())
    }

    fn invalid_state(&self, expected: &'static str) -> ClientError {
        ClientError::InvalidState {
            id: self.id,
            state: self.state.name(),
            expected,
        }
    }
}
