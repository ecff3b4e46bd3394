//! 上传传输
//!
//! 每个文件发出一个上传请求，请求体从磁盘流式读取并按字节报告进度。
//! 进度显示延迟约 500ms 才出现，避免小文件上传时闪烁。

use crate::error::Result;
use futures_util::TryStreamExt;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;

/// 默认的进度显示延迟
pub const DEFAULT_PROGRESS_DELAY: Duration = Duration::from_millis(500);

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl UploadSource {
    /// 检查路径；目录、非常规文件和没有文件名的路径返回 `None`
    pub async fn open(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            debug!("Skipping {:?}: not a regular file", path);
            return Ok(None);
        }
        let Some(name) = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
        else {
            debug!("Skipping {:?}: no file name", path);
            return Ok(None);
        };
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Some(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            mime_type,
        }))
    }

    /// `X-Filename` 头的值（百分号编码）
    pub fn encoded_name(&self) -> String {
        urlencoding::encode(&self.name).into_owned()
    }

    /// 打开文件并生成带进度回调的请求体
    pub async fn body(&self, progress: Arc<dyn UploadProgress>) -> Result<reqwest::Body> {
        let file = tokio::fs::File::open(&self.path).await?;
        let total = self.size;
        let mut sent: u64 = 0;
        let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            progress.on_progress(sent, total);
        });
        Ok(reqwest::Body::wrap_stream(stream))
    }
}

/// 上传进度回调
pub trait UploadProgress: Send + Sync {
    fn on_progress(&self, sent: u64, total: u64);
}

impl<T: UploadProgress + ?Sized> UploadProgress for Arc<T> {
    fn on_progress(&self, sent: u64, total: u64) {
        (**self).on_progress(sent, total);
    }
}

/// 忽略所有进度
pub struct NoProgress;

impl UploadProgress for NoProgress {
    fn on_progress(&self, _sent: u64, _total: u64) {}
}

/// 上传进度的比例形式，总大小为 0 时视为完成
pub fn fraction(sent: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = sent as f64 / total as f64;
        ratio.min(1.0)
    }
}

/// 延迟显示的进度
///
/// 在 `delay` 过去之前吞掉所有进度事件，之后原样转发。
pub struct ProgressGate<P> {
    inner: P,
    started: Instant,
    delay: Duration,
    seen: Mutex<Seen>,
}

#[derive(Default)]
struct Seen {
    last: Option<(u64, u64)>,
    forwarded: Option<(u64, u64)>,
}

impl<P: UploadProgress> ProgressGate<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self {
            inner,
            started: Instant::now(),
            delay,
            seen: Mutex::new(Seen::default()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.started.elapsed() >= self.delay
    }

    /// 上传结束时调用：若进度已经显示过且最后一次事件被吞掉，补发它
    pub fn finish(&self) -> bool {
        let shown = self.is_open();
        if shown {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((sent, total)) = seen.last.filter(|last| seen.forwarded != Some(*last)) {
                seen.forwarded = Some((sent, total));
                self.inner.on_progress(sent, total);
            }
        }
        shown
    }
}

impl<P: UploadProgress> UploadProgress for ProgressGate<P> {
    fn on_progress(&self, sent: u64, total: u64) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.last = Some((sent, total));
        if self.is_open() {
            seen.forwarded = Some((sent, total));
            self.inner.on_progress(sent, total);
        }
    }
}
