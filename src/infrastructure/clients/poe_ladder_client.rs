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

use crate::config::settings::CollectionSettings;
use crate::domain::models::character::{EnhancedProfile, ProfileOutcome};
use crate::domain::models::league::LeagueInfo;
use crate::domain::services::ladder_client::{FetchError, LadderClient, MAX_PAGE_SIZE};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// 暗金物品的 frameType
const UNIQUE_FRAME_TYPE: i64 = 3;

/// 官方天梯 API 客户端
///
/// 基于reqwest实现，所有请求共享一个连接池
#[derive(Clone)]
pub struct PoeLadderClient {
    client: reqwest::Client,
    base_url: Url,
}

impl PoeLadderClient {
    /// 创建客户端
    ///
    /// # 参数
    ///
    /// * `settings` - 采集配置（根地址、User-Agent、超时）
    ///
    /// # 返回值
    ///
    /// * `Ok(PoeLadderClient)` - 客户端实例
    /// * `Err(FetchError)` - 根地址非法或客户端构建失败
    pub fn new(settings: &CollectionSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let base_url = Url::parse(&settings.api_base_url)
            .map_err(|e| FetchError::Decode(format!("invalid api_base_url: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Decode("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, FetchError> {
        debug!(url = %url, "Requesting upstream API");
        let response = self.client.get(url).query(query).send().await?;

        match response.status() {
            StatusCode::OK => response
                .json::<Value>()
                .await
                .map_err(|e| FetchError::Decode(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string();
                Err(FetchError::RateLimited(format!("retry after {}", retry_after)))
            }
            status => Err(FetchError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl LadderClient for PoeLadderClient {
    async fn fetch_ladder_page(
        &self,
        league: &str,
        ladder_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.endpoint(&["api", "ladders", league])?;
        let query = [
            ("type", ladder_type.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.min(MAX_PAGE_SIZE).to_string()),
        ];

        let body = self.get_json(url, &query).await?;
        match body {
            Value::Object(mut map) => match map.remove("entries") {
                Some(Value::Array(entries)) => Ok(entries),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(_) => Err(FetchError::Decode("entries is not an array".to_string())),
            },
            Value::Array(entries) => Ok(entries),
            _ => Err(FetchError::Decode("unexpected ladder response".to_string())),
        }
    }

    async fn fetch_character_profile(
        &self,
        account: &str,
        name: &str,
    ) -> Result<ProfileOutcome, FetchError> {
        let url = self.endpoint(&["character-window", "get-items"])?;
        let query = [
            ("accountName", account.to_string()),
            ("character", name.to_string()),
        ];

        match self.get_json(url, &query).await {
            Ok(body) => Ok(ProfileOutcome::Public(parse_profile(&body))),
            Err(FetchError::Status(403)) | Err(FetchError::Status(404)) => {
                Ok(ProfileOutcome::Private)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_leagues(&self) -> Result<Vec<LeagueInfo>, FetchError> {
        let url = self.endpoint(&["api", "leagues"])?;
        let body = self.get_json(url, &[]).await?;
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// 从 get-items 响应中提取技能、暗金物品与防御数值
pub fn parse_profile(body: &Value) -> EnhancedProfile {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut profile = EnhancedProfile::default();
    let mut best_links = 0usize;

    for item in items {
        if item.get("frameType").and_then(Value::as_i64) == Some(UNIQUE_FRAME_TYPE) {
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                if !name.is_empty() && !profile.uniques.iter().any(|u| u == name) {
                    profile.uniques.push(name.to_string());
                }
            }
        }

        let gems = item
            .get("socketedItems")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for gem in gems {
            if is_active_gem(gem) {
                if let Some(skill) = gem.get("typeLine").and_then(Value::as_str) {
                    if !profile.skills.iter().any(|s| s == skill) {
                        profile.skills.push(skill.to_string());
                    }
                }
            }
        }

        // Main skill is the first active gem in the largest linked group
        if let Some((links, skill)) = largest_link_skill(item) {
            if links > best_links {
                best_links = links;
                profile.main_skill = Some(skill);
            }
        }
    }

    if let Some(character) = body.get("character") {
        profile.life = character
            .get("life")
            .and_then(Value::as_i64)
            .map(|v| v as i32);
        profile.energy_shield = character
            .get("energyShield")
            .and_then(Value::as_i64)
            .map(|v| v as i32);
    }

    if profile.main_skill.is_none() {
        profile.main_skill = profile.skills.first().cloned();
    }

    profile
}

fn is_active_gem(gem: &Value) -> bool {
    gem.get("support").and_then(Value::as_bool) == Some(false)
}

fn largest_link_skill(item: &Value) -> Option<(usize, String)> {
    let sockets = item.get("sockets")?.as_array()?;
    let gems = item.get("socketedItems")?.as_array()?;

    let mut groups: HashMap<i64, usize> = HashMap::new();
    for socket in sockets {
        let group = socket.get("group").and_then(Value::as_i64).unwrap_or(0);
        *groups.entry(group).or_default() += 1;
    }
    let (group, links) = groups.into_iter().max_by_key(|(g, n)| (*n, -*g))?;

    gems.iter()
        .filter(|gem| is_active_gem(gem))
        .find(|gem| {
            gem.get("socket")
                .and_then(Value::as_u64)
                .and_then(|idx| sockets.get(idx as usize))
                .and_then(|s| s.get("group"))
                .and_then(Value::as_i64)
                == Some(group)
        })
        .and_then(|gem| gem.get("typeLine").and_then(Value::as_str))
        .map(|skill| (links, skill.to_string()))
}
