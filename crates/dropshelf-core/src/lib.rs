//! Dropshelf Core Library
//!
//! dropit 兼容文件分享服务的客户端核心库
//!
//! # 模块
//!
//! - **record / entry**: 服务端元数据与本地条目状态机
//! - **store**: 有序的文件列表，每次变更后保存快照
//! - **cache**: 快照持久化（JSON 文件或内存）
//! - **http**: 基于 reqwest 的服务端接口
//! - **upload**: 流式上传与延迟显示的进度
//! - **validity**: 合并的远端有效性检查
//! - **session**: 组合以上模块的上层操作
//!
//! # 使用示例
//!
//! ```ignore
//! use dropshelf_core::{AlwaysConfirm, FileCache, HttpBackend, Session};
//!
//! // 1. 连接服务器并恢复上次的文件列表
//! let backend = HttpBackend::new("http://localhost:8080")?;
//! let cache = FileCache::new(FileCache::default_path());
//! let session = Session::new(Arc::new(backend), Arc::new(cache), Arc::new(AlwaysConfirm));
//! session.load().await?;
//!
//! // 2. 上传文件
//! session.enqueue(["notes.txt"]).await?;
//! session.upload_pending(|_| None).await;
//!
//! // 3. 定时扫描过期文件
//! session.run_sweeper(DEFAULT_SWEEP_INTERVAL, shutdown).await;
//! ```

pub mod action;
pub mod backend;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod format;
pub mod http;
pub mod logging;
pub mod record;
pub mod session;
pub mod store;
pub mod upload;
pub mod validity;

// Model re-exports
pub use entry::{EntryId, EntryState, ExpiryOrigin, FileEntry};
pub use record::{AliasUpdate, CurrentExpiration, FileRecord};

// Action re-exports
pub use action::{
    AliasKind, AlwaysConfirm, Confirm, DOWNLOAD_LIMITS, ExtendTarget, ExtensionChoice, Prompt,
    download_limit_label, extension_choices, grouped_extension_choices,
};

// Store re-exports
pub use cache::{FileCache, MemoryCache, SnapshotCache};
pub use store::{Affordances, FileListStore, StoreEvent};

// Transport re-exports
pub use backend::Backend;
pub use http::HttpBackend;
pub use upload::{NoProgress, ProgressGate, UploadProgress, UploadSource};

pub use config::AppSettings;
pub use error::{ClientError, Result};
pub use logging::LogLevel;
pub use session::{DEFAULT_SWEEP_INTERVAL, Session, SweepReport};
