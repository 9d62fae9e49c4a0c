//! Concurrency Gate - 合成服务并发闸门
//!
//! 一次性接口与流式接口共用同一个闸门，限制同时进行中的合成调用数

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 闸门已关闭（只会在进程退出时发生）
#[derive(Debug, thiserror::Error)]
#[error("Concurrency gate closed")]
pub struct GateClosed;

/// 并发闸门
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// 闸门许可，drop 时自动归还
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// 等待一个空闲槽位
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前空闲槽位数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
