// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{CollectionJob, JobStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct BoardState {
    jobs: HashMap<Uuid, CollectionJob>,
    current: Option<Uuid>,
}

/// 任务表
///
/// 所有任务与“当前任务”指针由同一把锁保护；
/// 读取一律返回克隆，锁不会跨越任何 I/O
#[derive(Default)]
pub struct JobBoard {
    state: Mutex<BoardState>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入任务，已存在时保留内存中的版本
    pub fn insert(&self, job: CollectionJob) {
        self.state.lock().jobs.entry(job.job_id).or_insert(job);
    }

    /// 覆盖任务
    pub fn replace(&self, job: CollectionJob) {
        self.state.lock().jobs.insert(job.job_id, job);
    }

    pub fn get(&self, job_id: Uuid) -> Option<CollectionJob> {
        self.state.lock().jobs.get(&job_id).cloned()
    }

    /// 全部任务，按创建时间倒序
    pub fn list_all(&self) -> Vec<CollectionJob> {
        let mut jobs: Vec<CollectionJob> = self.state.lock().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// 当前正在执行的任务
    pub fn active(&self) -> Option<CollectionJob> {
        let state = self.state.lock();
        state.current.and_then(|id| state.jobs.get(&id).cloned())
    }

    /// 是否存在未结束的任务
    pub fn has_unfinished(&self) -> bool {
        self.state
            .lock()
            .jobs
            .values()
            .any(|job| matches!(job.status, JobStatus::Pending | JobStatus::Running))
    }

    /// 不属于本进程的 Running 任务，即恢复时保留的其他实例任务
    pub fn orphans(&self) -> Vec<Uuid> {
        let state = self.state.lock();
        state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Running && state.current != Some(job.job_id))
            .map(|job| job.job_id)
            .collect()
    }

    pub fn remove(&self, job_id: Uuid) -> Option<CollectionJob> {
        self.state.lock().jobs.remove(&job_id)
    }

    /// 在锁内修改任务，返回闭包结果；任务不存在时返回 None
    pub fn update<R>(&self, job_id: Uuid, f: impl FnOnce(&mut CollectionJob) -> R) -> Option<R> {
        self.state.lock().jobs.get_mut(&job_id).map(f)
    }

    /// 开始执行：仅当任务仍为 Pending 时转为 Running 并设为当前任务
    pub fn begin(&self, job_id: Uuid) -> Option<CollectionJob> {
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(&job_id)?;
        if job.status != JobStatus::Pending || job.start().is_err() {
            return None;
        }
        let snapshot = job.clone();
        state.current = Some(job_id);
        Some(snapshot)
    }

    /// 结束执行：应用终态并清除当前任务指针
    pub fn finish(
        &self,
        job_id: Uuid,
        f: impl FnOnce(&mut CollectionJob),
    ) -> Option<CollectionJob> {
        let mut state = self.state.lock();
        if state.current == Some(job_id) {
            state.current = None;
        }
        let job = state.jobs.get_mut(&job_id)?;
        f(job);
        Some(job.clone())
    }
}
