//! 远端有效性检查
//!
//! 每个扫描周期把所有仍被认为可用的别名合并成一次请求，
//! 服务端按相同顺序返回布尔数组。请求失败时不修改任何条目。

use crate::backend::Backend;
use crate::entry::EntryId;
use log::{debug, error};
use std::sync::Arc;

/// 合并后的请求路径: `/valid/a+b+c`
pub fn valid_path(aliases: &[String]) -> String {
    format!("/valid/{}", aliases.join("+"))
}

pub struct RemoteValidityChecker {
    backend: Arc<dyn Backend>,
}

impl RemoteValidityChecker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// 查询一批条目，失败时返回 `None`（乐观地认为仍然可用）
    pub async fn check(&self, batch: &[(EntryId, String)]) -> Option<Vec<bool>> {
        if batch.is_empty() {
            return Some(Vec::new());
        }
        let aliases: Vec<String> = batch.iter().map(|(_, alias)| alias.clone()).collect();
        debug!("Checking validity of {} alias(es)", aliases.len());
        match self.backend.check_validity(&aliases).await {
            Ok(valid) => Some(valid),
            Err(e) => {
                error!("An error occurred while checking expired remote files: {}", e);
                None
            }
        }
    }
}
