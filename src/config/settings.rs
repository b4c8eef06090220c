// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::job::CollectionMode;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// 应用程序配置设置
///
/// 包含数据库、服务器、速率限制、采集策略和调度器等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 速率限制配置
    #[serde(default)]
    pub rate_limiting: RateLimitingSettings,
    /// 采集配置
    #[serde(default)]
    pub collection: CollectionSettings,
    /// 调度器配置
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 等待周期耗尽时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleExhaustionPolicy {
    /// 拒绝本次请求
    #[default]
    FailClosed,
    /// 放行本次请求
    FailOpen,
}

/// 单个资源类别的请求预算
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResourceLimits {
    /// 每分钟请求数
    pub requests_per_minute: u32,
    /// 每小时请求数
    pub requests_per_hour: u32,
    /// 每天请求数
    pub requests_per_day: u32,
    /// 基础请求间隔（秒）
    pub base_delay_secs: f64,
    /// 最大请求间隔（秒）
    pub max_delay_secs: f64,
}

impl ResourceLimits {
    pub fn new(per_minute: u32, per_hour: u32, per_day: u32, base: f64, max: f64) -> Self {
        Self {
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            requests_per_day: per_day,
            base_delay_secs: base,
            max_delay_secs: max,
        }
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitingSettings {
    /// 是否对请求间隔施加抖动
    pub enable_jitter: bool,
    /// 单次等待的最大循环次数
    pub max_wait_cycles: u32,
    /// 循环次数耗尽后的策略
    pub on_cycle_exhaustion: CycleExhaustionPolicy,
    /// 按资源类别划分的预算
    pub resources: HashMap<String, ResourceLimits>,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        let mut resources = HashMap::new();
        resources.insert(
            "ladder".to_string(),
            ResourceLimits::new(4, 15, 500, 15.0, 60.0),
        );
        resources.insert(
            "profile-enhancement".to_string(),
            ResourceLimits::new(3, 12, 1200, 20.0, 120.0),
        );
        resources.insert(
            "ninja".to_string(),
            ResourceLimits::new(15, 60, 300, 4.0, 30.0),
        );
        Self {
            enable_jitter: true,
            max_wait_cycles: 10,
            on_cycle_exhaustion: CycleExhaustionPolicy::FailClosed,
            resources,
        }
    }
}

/// 采集配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// 采集模式
    pub mode: CollectionMode,
    /// 快照新鲜度阈值（小时）
    pub freshness_threshold_hours: f64,
    /// 显式监控的联赛列表，为空时自动发现
    pub leagues: Vec<String>,
    /// 需要采集的天梯类型
    pub ladder_types: Vec<String>,
    /// 快照保留天数
    pub retention_days: i64,
    /// 维护循环间隔（秒）
    pub check_interval_secs: u64,
    /// 官方 API 根地址
    pub api_base_url: String,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            mode: CollectionMode::Balanced,
            freshness_threshold_hours: 23.0,
            leagues: Vec::new(),
            ladder_types: vec!["league".to_string()],
            retention_days: 90,
            check_interval_secs: 3600,
            api_base_url: "https://www.pathofexile.com".to_string(),
            user_agent: concat!("ladderwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// 心跳超过该秒数视为过期
    pub stale_heartbeat_seconds: i64,
    /// 运行中任务的心跳间隔（秒）
    pub heartbeat_interval_seconds: u64,
    /// 出队等待超时（毫秒）
    pub dequeue_timeout_ms: u64,
    /// 启动时加载到内存的历史任务数
    pub history_limit: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            stale_heartbeat_seconds: 300,
            heartbeat_interval_seconds: 30,
            dequeue_timeout_ms: 1000,
            history_limit: 100,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与
    /// `LADDERWATCH__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://ladderwatch.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("LADDERWATCH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("collection.leagues")
                    .with_list_parse_key("collection.ladder_types")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
