// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 采集任务实体
///
/// 一次采集运行的完整状态：配置、进度计数器、告警以及心跳。
/// 任务只由唯一的后台工作器在运行期间修改，进入终态后不再变化。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionJob {
    /// 任务唯一标识符
    pub job_id: Uuid,
    /// 任务状态
    pub status: JobStatus,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间（无论成功、失败或取消）
    pub completed_at: Option<DateTime<Utc>>,
    /// 目标联赛
    pub leagues: Vec<String>,
    /// 是否进行角色档案增强
    pub enhance_profiles: bool,
    /// 是否进行构筑分类
    pub categorize_builds: bool,
    /// 采集模式
    pub collection_mode: CollectionMode,
    /// 总步数
    pub total_steps: i32,
    /// 已完成步数
    pub completed_steps: i32,
    /// 当前步骤描述
    pub current_step: String,
    /// 当前处理的联赛
    pub current_league: Option<String>,
    /// 当前操作
    pub current_operation: Option<String>,
    /// 已采集角色数
    pub characters_collected: i32,
    /// 已增强角色数
    pub characters_enhanced: i32,
    /// 已分类角色数
    pub characters_categorized: i32,
    /// 已完成的联赛
    pub leagues_completed: Vec<String>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 告警列表
    pub warnings: Vec<String>,
    /// 最后心跳时间
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// 采集模式
///
/// 控制抓取条目上限与档案增强的预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl CollectionMode {
    /// 每个天梯最多抓取的条目数
    pub fn max_entries(&self) -> usize {
        match self {
            CollectionMode::Conservative => 1000,
            CollectionMode::Balanced => 2000,
            CollectionMode::Aggressive => 2500,
        }
    }

    /// 增强预算乘数
    pub fn enhancement_multiplier(&self) -> f64 {
        match self {
            CollectionMode::Conservative => 0.1,
            CollectionMode::Balanced => 0.5,
            CollectionMode::Aggressive => 1.0,
        }
    }
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CollectionMode::Conservative => write!(f, "conservative"),
            CollectionMode::Balanced => write!(f, "balanced"),
            CollectionMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for CollectionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(CollectionMode::Conservative),
            "balanced" => Ok(CollectionMode::Balanced),
            "aggressive" => Ok(CollectionMode::Aggressive),
            other => Err(DomainError::Validation(format!(
                "invalid collection mode: {}",
                other
            ))),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换是单向的：
/// Pending → Running → Completed/Failed，Pending → Cancelled/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已提交，等待执行
    #[default]
    Pending,
    /// 正在执行
    Running,
    /// 执行完成
    Completed,
    /// 执行失败
    Failed,
    /// 执行前被取消
    Cancelled,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "invalid job status: {}",
                other
            ))),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(String),
}

/// 任务提交参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    /// 目标联赛，为空时使用当前监控的联赛
    pub leagues: Option<Vec<String>>,
    pub enhance_profiles: bool,
    pub categorize_builds: bool,
    pub mode: CollectionMode,
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            leagues: None,
            enhance_profiles: true,
            categorize_builds: true,
            mode: CollectionMode::Balanced,
        }
    }
}

impl CollectionJob {
    /// 创建一个新的待执行任务
    ///
    /// # 参数
    ///
    /// * `leagues` - 已解析的目标联赛
    /// * `spec` - 提交参数
    ///
    /// # 返回值
    ///
    /// 返回状态为 Pending 且计数器清零的任务
    pub fn new(leagues: Vec<String>, spec: &JobSpec) -> Self {
        let total_steps = Self::steps_per_league(spec.enhance_profiles, spec.categorize_builds)
            * leagues.len() as i32;

        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            leagues,
            enhance_profiles: spec.enhance_profiles,
            categorize_builds: spec.categorize_builds,
            collection_mode: spec.mode,
            total_steps,
            completed_steps: 0,
            current_step: "Queued".to_string(),
            current_league: None,
            current_operation: None,
            characters_collected: 0,
            characters_enhanced: 0,
            characters_categorized: 0,
            leagues_completed: Vec::new(),
            error_message: None,
            warnings: Vec::new(),
            last_heartbeat: None,
        }
    }

    /// 每个联赛占用的步数
    pub fn steps_per_league(enhance: bool, categorize: bool) -> i32 {
        1 + i32::from(enhance) + i32::from(categorize)
    }

    /// 开始执行
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Running)?;
        let now = Utc::now();
        self.started_at = Some(now);
        self.last_heartbeat = Some(now);
        self.current_step = "Starting collection".to_string();
        Ok(())
    }

    /// 标记完成
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Completed)?;
        self.current_step = "Completed".to_string();
        self.current_league = None;
        self.current_operation = None;
        self.stamp_finished();
        Ok(())
    }

    /// 标记失败并记录错误信息
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), DomainError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        self.current_step = "Failed".to_string();
        self.stamp_finished();
        Ok(())
    }

    /// 取消任务，仅对 Pending 有效
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Cancelled)?;
        self.current_step = "Cancelled".to_string();
        self.stamp_finished();
        Ok(())
    }

    /// 刷新心跳
    pub fn touch(&mut self) {
        self.last_heartbeat = Some(Utc::now());
    }

    /// 追加告警
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// 判断任务的心跳是否已过期
    ///
    /// 没有心跳的任务以创建时间为准
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let reference = self.last_heartbeat.unwrap_or(self.created_at);
        now - reference > threshold
    }

    /// 进度百分比
    pub fn progress_percent(&self) -> f64 {
        if self.total_steps <= 0 {
            return 0.0;
        }
        (self.completed_steps as f64 / self.total_steps as f64 * 100.0).min(100.0)
    }

    fn stamp_finished(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.last_heartbeat = Some(now);
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), DomainError> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !allowed {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
