// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::domain::models::job::{CollectionJob, DomainError, JobSpec, JobStatus};
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::RepositoryError;
use crate::queue::job_board::JobBoard;
use crate::queue::task_queue::{JobQueue, QueueError};
use crate::utils::shutdown::SharedShutdown;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 重启恢复时写入的失败原因
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// 调度器错误类型
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("No leagues to collect")]
    NoLeagues,

    #[error("Job queue closed")]
    QueueClosed,
}

impl From<QueueError> for SchedulerError {
    fn from(_: QueueError) -> Self {
        SchedulerError::QueueClosed
    }
}

/// 任务执行体
///
/// 调度器在独立的 tokio 任务中调用 `run`，返回错误或 panic 都会使任务失败
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// 提交时未指定联赛时使用的默认联赛
    fn default_leagues(&self) -> Vec<String>;

    async fn run(&self, ctx: JobContext) -> anyhow::Result<()>;
}

/// 任务执行上下文
///
/// 执行体通过它更新进度；所有修改都在任务表的锁内完成
#[derive(Clone)]
pub struct JobContext {
    job_id: Uuid,
    board: Arc<JobBoard>,
    repository: Arc<dyn JobRepository>,
    shutdown: SharedShutdown,
}

impl JobContext {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// 当前任务状态的副本
    pub fn snapshot(&self) -> Option<CollectionJob> {
        self.board.get(self.job_id)
    }

    /// 修改任务并刷新心跳
    pub fn update(&self, f: impl FnOnce(&mut CollectionJob)) {
        self.board.update(self.job_id, |job| {
            f(job);
            job.touch();
        });
    }

    /// 持久化当前进度，失败只记录日志
    pub async fn checkpoint(&self) {
        if let Some(job) = self.snapshot() {
            if let Err(e) = self.repository.upsert(&job).await {
                warn!(job_id = %self.job_id, "Failed to persist job progress: {}", e);
            }
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }
}

/// 启动恢复结果
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RecoveryReport {
    /// 因心跳过期被标记失败的任务
    pub failed: Vec<Uuid>,
    /// 重新入队的任务
    pub requeued: Vec<Uuid>,
    /// 未过期且仍在运行、保持原样的任务
    pub untouched: Vec<Uuid>,
}

/// 任务调度器
///
/// 接收任务提交，由唯一的后台工作器串行执行，持久化任务状态以便崩溃恢复
#[derive(Clone)]
pub struct TaskScheduler {
    board: Arc<JobBoard>,
    queue: Arc<dyn JobQueue>,
    repository: Arc<dyn JobRepository>,
    runner: Arc<dyn JobRunner>,
    settings: SchedulerSettings,
    shutdown: SharedShutdown,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TaskScheduler {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `queue` - 任务队列
    /// * `repository` - 任务仓库
    /// * `runner` - 任务执行体
    /// * `settings` - 调度器配置
    /// * `shutdown` - 关闭信号
    pub fn new(
        queue: Arc<dyn JobQueue>,
        repository: Arc<dyn JobRepository>,
        runner: Arc<dyn JobRunner>,
        settings: SchedulerSettings,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            board: Arc::new(JobBoard::new()),
            queue,
            repository,
            runner,
            settings,
            shutdown,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// 提交采集任务
    ///
    /// 创建 Pending 任务、持久化、入队并在工作器空闲时启动它，不等待任何网络 I/O
    ///
    /// # 返回值
    ///
    /// * `Ok(Uuid)` - 新任务ID
    /// * `Err(SchedulerError)` - 没有可采集的联赛或持久化失败
    pub async fn submit(&self, spec: JobSpec) -> Result<Uuid, SchedulerError> {
        let leagues = match &spec.leagues {
            Some(leagues) => leagues.clone(),
            None => self.runner.default_leagues(),
        };
        if leagues.is_empty() {
            return Err(SchedulerError::NoLeagues);
        }

        let job = CollectionJob::new(leagues, &spec);
        let job_id = job.job_id;

        self.repository.upsert(&job).await?;
        self.board.insert(job);
        if let Err(e) = self.queue.enqueue(job_id).await {
            let failed = self.board.update(job_id, |job| {
                let _ = job.fail(format!("could not enqueue job: {}", e));
                job.clone()
            });
            if let Some(job) = failed {
                self.persist(&job).await;
            }
            return Err(e.into());
        }
        self.start_worker();

        info!(%job_id, mode = %spec.mode, "Collection job submitted");
        Ok(job_id)
    }

    /// 取消任务，仅对 Pending 任务生效
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool, SchedulerError> {
        let cancelled = self.board.update(job_id, |job| {
            if job.status == JobStatus::Pending && job.cancel().is_ok() {
                Some(job.clone())
            } else {
                None
            }
        });

        match cancelled.flatten() {
            Some(job) => {
                self.repository.upsert(&job).await?;
                info!(%job_id, "Collection job cancelled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get_status(&self, job_id: Uuid) -> Option<CollectionJob> {
        self.board.get(job_id)
    }

    /// 全部任务，按创建时间倒序
    pub fn list_all(&self) -> Vec<CollectionJob> {
        self.board.list_all()
    }

    pub fn get_active(&self) -> Option<CollectionJob> {
        self.board.active()
    }

    pub fn has_unfinished(&self) -> bool {
        self.board.has_unfinished()
    }

    /// 启动时的崩溃恢复，必须在工作器接收新任务之前执行
    ///
    /// 心跳过期的 Pending/Running 任务标记为失败；未过期的 Pending 任务重新入队；
    /// 未过期的 Running 任务视为属于其他存活实例，保持不动
    pub async fn recover(&self) -> Result<RecoveryReport, SchedulerError> {
        let now = Utc::now();
        let threshold = Duration::seconds(self.settings.stale_heartbeat_seconds);
        let mut report = RecoveryReport::default();

        for mut job in self.repository.find_unfinished().await? {
            let job_id = job.job_id;
            if job.is_stale(now, threshold) {
                job.fail(INTERRUPTED_BY_RESTART)?;
                self.repository.upsert(&job).await?;
                self.board.replace(job);
                warn!(%job_id, "Marked stale job as failed");
                report.failed.push(job_id);
            } else if job.status == JobStatus::Pending {
                self.board.replace(job);
                self.queue.enqueue(job_id).await?;
                info!(%job_id, "Re-enqueued pending job");
                report.requeued.push(job_id);
            } else {
                self.board.replace(job);
                report.untouched.push(job_id);
            }
        }

        for job in self.repository.list_recent(self.settings.history_limit).await? {
            self.board.insert(job);
        }

        Ok(report)
    }

    /// 处理恢复时保留下来的其他实例任务
    ///
    /// 以存储中的状态为准：已结束的同步到任务表，心跳过期的标记为失败，
    /// 存储中已不存在的从任务表移除
    ///
    /// # 返回值
    ///
    /// 本次被标记为失败的任务ID
    pub async fn reap_orphans(&self) -> Result<Vec<Uuid>, SchedulerError> {
        let now = Utc::now();
        let threshold = Duration::seconds(self.settings.stale_heartbeat_seconds);
        let mut failed = Vec::new();

        for job_id in self.board.orphans() {
            let Some(mut job) = self.repository.find_by_id(job_id).await? else {
                self.board.remove(job_id);
                continue;
            };
            if !job.status.is_terminal() && job.is_stale(now, threshold) {
                job.fail(INTERRUPTED_BY_RESTART)?;
                self.repository.upsert(&job).await?;
                warn!(%job_id, "Marked orphaned job as failed");
                failed.push(job_id);
            }
            self.board.replace(job);
        }

        Ok(failed)
    }

    /// 启动后台工作器，已在运行时不做任何事
    pub fn start_worker(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if self.shutdown.is_requested() {
            return;
        }

        let scheduler = self.clone();
        *worker = Some(tokio::spawn(async move {
            scheduler.worker_loop().await;
        }));
        info!("Collection worker started");
    }

    async fn worker_loop(&self) {
        let timeout = StdDuration::from_millis(self.settings.dequeue_timeout_ms);

        loop {
            if self.shutdown.is_requested() {
                info!("Collection worker stopping");
                break;
            }

            let next = tokio::select! {
                next = self.queue.dequeue(timeout) => next,
                _ = self.shutdown.wait() => continue,
            };

            match next {
                Ok(Some(job_id)) => self.process(job_id).await,
                Ok(None) => continue,
                Err(e) => {
                    error!("Job queue unavailable: {}", e);
                    break;
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn process(&self, job_id: Uuid) {
        let Some(job) = self.board.begin(job_id) else {
            info!("Skipping job that is no longer pending");
            return;
        };
        self.persist(&job).await;

        let ctx = JobContext {
            job_id,
            board: self.board.clone(),
            repository: self.repository.clone(),
            shutdown: self.shutdown.clone(),
        };
        let heartbeat = self.spawn_heartbeat(ctx.clone());

        let runner = self.runner.clone();
        let outcome = tokio::spawn(async move { runner.run(ctx).await }).await;
        heartbeat.abort();
        // A checkpoint already in flight must land before the terminal write
        let _ = heartbeat.await;

        let finished = self.board.finish(job_id, |job| {
            let result = match outcome {
                Ok(Ok(())) => job.complete(),
                Ok(Err(e)) => job.fail(format!("{:#}", e)),
                Err(join_error) => job.fail(panic_message(join_error)),
            };
            if let Err(e) = result {
                error!("Unexpected job transition: {}", e);
            }
        });

        if let Some(job) = finished {
            self.persist(&job).await;
            match job.status {
                JobStatus::Completed => info!(
                    characters = job.characters_collected,
                    warnings = job.warnings.len(),
                    "Collection job completed"
                ),
                _ => error!(error = ?job.error_message, "Collection job failed"),
            }
        }
    }

    fn spawn_heartbeat(&self, ctx: JobContext) -> JoinHandle<()> {
        let period = StdDuration::from_secs(self.settings.heartbeat_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                ctx.update(|_| {});
                ctx.checkpoint().await;
            }
        })
    }

    async fn persist(&self, job: &CollectionJob) {
        if let Err(e) = self.repository.upsert(job).await {
            error!(job_id = %job.job_id, "Failed to persist job: {}", e);
        }
    }

    /// 请求关闭并等待工作器退出
    pub async fn shutdown(&self, grace: StdDuration) {
        self.shutdown.request();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("Collection worker did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if error.is_panic() {
        let payload = error.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("job panicked: {}", detail)
    } else {
        "job was cancelled".to_string()
    }
}
