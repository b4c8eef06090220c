// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{CycleExhaustionPolicy, RateLimitingSettings, ResourceLimits};
use crate::domain::repositories::request_log_repository::{RequestLogEntry, RequestLogRepository};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(86_400);

/// 限流错误类型
#[derive(Debug, thiserror::Error)]
pub enum RateLimitingError {
    #[error("未配置的资源类别: {0}")]
    UnknownResource(String),

    #[error("每日请求预算已耗尽: {0}")]
    BudgetExhausted(String),

    #[error("等待周期已耗尽: {0}")]
    WaitCyclesExhausted(String),
}

/// 单次请求的审计元数据
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub endpoint: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub league: Option<String>,
    pub character_name: Option<String>,
    pub account_name: Option<String>,
}

/// 资源类别的限流状态快照
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceStatus {
    pub resource: String,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    pub minute_count: u32,
    pub hour_count: u32,
    pub day_count: u32,
    pub minute_remaining: u32,
    pub hour_remaining: u32,
    pub day_remaining: u32,
    pub consecutive_failures: u32,
    pub current_delay_secs: f64,
    pub seconds_since_last_request: Option<f64>,
}

#[derive(Debug, Default)]
struct ResourceState {
    history: VecDeque<Instant>,
    consecutive_failures: u32,
    last_request: Option<Instant>,
}

impl ResourceState {
    fn purge(&mut self, now: Instant) {
        while let Some(front) = self.history.front() {
            if now.duration_since(*front) >= DAY {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// 窗口内的请求数以及窗口内最早的请求
    fn window(&self, now: Instant, span: Duration) -> (u32, Option<Instant>) {
        let mut count = 0;
        let mut oldest = None;
        for ts in self.history.iter().rev() {
            if now.duration_since(*ts) < span {
                count += 1;
                oldest = Some(*ts);
            } else {
                break;
            }
        }
        (count, oldest)
    }
}

enum Decision {
    DailyExhausted,
    Wait(Duration, &'static str),
    Proceed(Duration),
}

enum Permit {
    Granted,
    DailyExhausted,
    CyclesExhausted,
}

/// 多级速率限制管理器
///
/// 按资源类别维护分钟、小时、天三个滑动窗口，失败时指数退避，
/// 并在相邻请求之间施加带抖动的间隔。
///
/// 每个类别的状态由独立的锁保护，锁只在内存计算期间持有，不会跨越等待
pub struct RateLimitManager {
    limits: HashMap<String, ResourceLimits>,
    states: HashMap<String, Mutex<ResourceState>>,
    enable_jitter: bool,
    max_wait_cycles: u32,
    on_cycle_exhaustion: CycleExhaustionPolicy,
    request_log: Option<Arc<dyn RequestLogRepository>>,
}

impl RateLimitManager {
    /// 根据配置创建管理器
    ///
    /// # 参数
    ///
    /// * `settings` - 速率限制配置
    pub fn new(settings: &RateLimitingSettings) -> Self {
        let states = settings
            .resources
            .keys()
            .map(|k| (k.clone(), Mutex::new(ResourceState::default())))
            .collect();

        Self {
            limits: settings.resources.clone(),
            states,
            enable_jitter: settings.enable_jitter,
            max_wait_cycles: settings.max_wait_cycles.max(1),
            on_cycle_exhaustion: settings.on_cycle_exhaustion,
            request_log: None,
        }
    }

    /// 附加请求审计日志仓库
    pub fn with_request_log(mut self, repository: Arc<dyn RequestLogRepository>) -> Self {
        self.request_log = Some(repository);
        self
    }

    fn resource(
        &self,
        class: &str,
    ) -> Result<(&ResourceLimits, &Mutex<ResourceState>), RateLimitingError> {
        match (self.limits.get(class), self.states.get(class)) {
            (Some(limits), Some(state)) => Ok((limits, state)),
            _ => Err(RateLimitingError::UnknownResource(class.to_string())),
        }
    }

    /// 不含抖动的退避间隔：`min(base * 2^k, max)`
    fn backoff(limits: &ResourceLimits, failures: u32) -> f64 {
        let factor = 2f64.powi(failures.min(32) as i32);
        (limits.base_delay_secs * factor).min(limits.max_delay_secs)
    }

    fn jitter(&self) -> f64 {
        if self.enable_jitter {
            rand::random_range(0.5..=1.5)
        } else {
            1.0
        }
    }

    fn decide(&self, limits: &ResourceLimits, state: &mut ResourceState, now: Instant) -> Decision {
        state.purge(now);

        if state.history.len() as u32 >= limits.requests_per_day {
            return Decision::DailyExhausted;
        }

        let (hour_count, hour_oldest) = state.window(now, HOUR);
        if hour_count >= limits.requests_per_hour {
            let age = hour_oldest.map(|t| now.duration_since(t)).unwrap_or_default();
            let wait = HOUR.saturating_sub(age).min(MINUTE);
            return Decision::Wait(wait.max(Duration::from_millis(1)), "hour");
        }

        let (minute_count, minute_oldest) = state.window(now, MINUTE);
        if minute_count >= limits.requests_per_minute {
            let age = minute_oldest.map(|t| now.duration_since(t)).unwrap_or_default();
            let wait = (MINUTE.saturating_sub(age) + Duration::from_secs(1))
                .min(Duration::from_secs(61));
            return Decision::Wait(wait, "minute");
        }

        let spacing = match state.last_request {
            Some(last) => {
                let delay = Self::backoff(limits, state.consecutive_failures) * self.jitter();
                Duration::from_secs_f64(delay.max(0.0)).saturating_sub(now.duration_since(last))
            }
            None => Duration::ZERO,
        };
        Decision::Proceed(spacing)
    }

    async fn wait(&self, class: &str) -> Result<Permit, RateLimitingError> {
        let (limits, state) = self.resource(class)?;

        for cycle in 0..self.max_wait_cycles {
            let decision = {
                let mut guard = state.lock();
                self.decide(limits, &mut guard, Instant::now())
            };

            match decision {
                Decision::DailyExhausted => {
                    warn!(resource = class, "Daily request budget exhausted");
                    return Ok(Permit::DailyExhausted);
                }
                Decision::Wait(wait, window) => {
                    debug!(
                        resource = class,
                        window,
                        cycle,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limit window full, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
                Decision::Proceed(spacing) => {
                    if !spacing.is_zero() {
                        tokio::time::sleep(spacing).await;
                    }
                    return Ok(Permit::Granted);
                }
            }
        }

        error!(
            resource = class,
            cycles = self.max_wait_cycles,
            policy = ?self.on_cycle_exhaustion,
            "Rate limit violation: wait cycles exhausted before windows cleared"
        );
        Ok(Permit::CyclesExhausted)
    }

    /// 等待直到可以安全地发出一次该类别的请求
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 可以发出请求
    /// * `Ok(false)` - 每日预算耗尽，或等待周期耗尽且策略为拒绝
    /// * `Err(RateLimitingError)` - 资源类别未配置
    pub async fn wait_for_request(&self, class: &str) -> Result<bool, RateLimitingError> {
        Ok(match self.wait(class).await? {
            Permit::Granted => true,
            Permit::DailyExhausted => false,
            Permit::CyclesExhausted => self.on_cycle_exhaustion == CycleExhaustionPolicy::FailOpen,
        })
    }

    /// 与 `wait_for_request` 相同，但以错误区分拒绝原因
    pub async fn acquire(&self, class: &str) -> Result<(), RateLimitingError> {
        match self.wait(class).await? {
            Permit::Granted => Ok(()),
            Permit::DailyExhausted => Err(RateLimitingError::BudgetExhausted(class.to_string())),
            Permit::CyclesExhausted => match self.on_cycle_exhaustion {
                CycleExhaustionPolicy::FailOpen => Ok(()),
                CycleExhaustionPolicy::FailClosed => {
                    Err(RateLimitingError::WaitCyclesExhausted(class.to_string()))
                }
            },
        }
    }

    /// 记录一次已完成的请求
    ///
    /// 成功时清零连续失败计数，失败时加一；审计日志写入失败只记录告警
    pub async fn record_request(
        &self,
        class: &str,
        success: bool,
        meta: RequestMeta,
    ) -> Result<(), RateLimitingError> {
        let (_, state) = self.resource(class)?;
        {
            let mut guard = state.lock();
            let now = Instant::now();
            guard.purge(now);
            guard.history.push_back(now);
            guard.last_request = Some(now);
            if success {
                guard.consecutive_failures = 0;
            } else {
                guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);
            }
        }

        if let Some(repo) = &self.request_log {
            let entry = RequestLogEntry {
                api_type: class.to_string(),
                endpoint: meta.endpoint,
                success,
                response_time_ms: meta.response_time_ms,
                error_message: meta.error_message,
                league: meta.league,
                character_name: meta.character_name,
                account_name: meta.account_name,
            };
            if let Err(e) = repo.record(&entry).await {
                warn!(resource = class, "Failed to write request log: {}", e);
            }
        }

        Ok(())
    }

    /// 当前不含抖动的请求间隔（秒）
    pub fn current_delay(&self, class: &str) -> Result<f64, RateLimitingError> {
        let (limits, state) = self.resource(class)?;
        let failures = state.lock().consecutive_failures;
        Ok(Self::backoff(limits, failures))
    }

    /// 所有资源类别的状态，按类别名排序
    pub fn status(&self) -> Vec<ResourceStatus> {
        let now = Instant::now();
        let mut classes: Vec<&String> = self.limits.keys().collect();
        classes.sort();

        classes
            .into_iter()
            .filter_map(|class| {
                let (limits, state) = self.resource(class).ok()?;
                let mut guard = state.lock();
                guard.purge(now);
                let (minute_count, _) = guard.window(now, MINUTE);
                let (hour_count, _) = guard.window(now, HOUR);
                let day_count = guard.history.len() as u32;

                Some(ResourceStatus {
                    resource: class.clone(),
                    requests_per_minute: limits.requests_per_minute,
                    requests_per_hour: limits.requests_per_hour,
                    requests_per_day: limits.requests_per_day,
                    minute_count,
                    hour_count,
                    day_count,
                    minute_remaining: limits.requests_per_minute.saturating_sub(minute_count),
                    hour_remaining: limits.requests_per_hour.saturating_sub(hour_count),
                    day_remaining: limits.requests_per_day.saturating_sub(day_count),
                    consecutive_failures: guard.consecutive_failures,
                    current_delay_secs: Self::backoff(limits, guard.consecutive_failures),
                    seconds_since_last_request: guard
                        .last_request
                        .map(|t| now.duration_since(t).as_secs_f64()),
                })
            })
            .collect()
    }
}
