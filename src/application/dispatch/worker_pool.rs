//! Worker Pool - 进程级子任务并发上限

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// 固定大小的工作池
///
/// 所有任务的子任务共享同一个池，启动时构造一次并注入
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// 等待空闲槽位，持有 permit 直到子任务结束
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore.clone().acquire_owned().await
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_caps_concurrency() {
        let pool = WorkerPool::new(2);
        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        let waiting = tokio::time::timeout(std::time::Duration::from_millis(20), pool.acquire()).await;
        assert!(waiting.is_err());

        drop(first);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_zero_size_is_raised_to_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
