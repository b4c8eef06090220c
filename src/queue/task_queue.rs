// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// 队列已关闭
    #[error("Queue closed")]
    Closed,
}

/// 任务队列特质
///
/// 队列中只保存任务ID，任务状态以任务表为准
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// 出队任务，超时返回 `Ok(None)`
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError>;

    /// 当前排队数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 进程内先进先出任务队列
pub struct InMemoryJobQueue {
    sender: mpsc::UnboundedSender<Uuid>,
    receiver: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    pending: AtomicUsize,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job_id).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            QueueError::Closed
        })
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(job_id)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(job_id))
            }
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
