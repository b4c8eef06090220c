// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROFILE_BASE_URL: &str = "https://www.pathofexile.com/account/view-profile";
const LADDER_BASE_URL: &str = "https://www.pathofexile.com/ladders";

/// 天梯条目中的角色部分
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LadderCharacter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub experience: Option<i64>,
    #[serde(default)]
    pub depth: Option<LadderDepth>,
}

/// 深掘天梯的深度信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LadderDepth {
    #[serde(default)]
    pub solo: Option<i32>,
    #[serde(default)]
    pub default: Option<i32>,
}

/// 天梯条目中的账号部分
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LadderAccount {
    #[serde(default)]
    pub name: String,
}

/// 官方天梯 API 的原始条目
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LadderEntry {
    #[serde(default)]
    pub rank: Option<i32>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub character: LadderCharacter,
    #[serde(default)]
    pub account: LadderAccount,
}

/// 规范化后的角色记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterRecord {
    pub rank: i32,
    pub account: String,
    pub name: String,
    pub level: i32,
    pub experience: Option<i64>,
    pub class: String,
    pub depth: Option<i32>,
}

impl CharacterRecord {
    /// 将原始天梯条目转换为角色记录
    ///
    /// 条目中没有名次时按位置（从 1 开始）补齐
    pub fn from_entry(entry: &LadderEntry, position: usize, ladder_type: &str) -> Self {
        let depth = if ladder_type == "delve-solo" {
            entry
                .character
                .depth
                .as_ref()
                .and_then(|d| d.solo.or(d.default))
        } else {
            None
        };

        Self {
            rank: entry.rank.unwrap_or(position as i32 + 1),
            account: entry.account.name.clone(),
            name: entry.character.name.clone(),
            level: entry.character.level,
            experience: entry.character.experience,
            class: entry.character.class.clone(),
            depth,
        }
    }

    /// 从原始载荷解析出全部角色记录
    ///
    /// 载荷既可以是条目数组，也可以是带 `entries` 字段的对象
    pub fn from_payload(payload: &Value, ladder_type: &str) -> Result<Vec<Self>, serde_json::Error> {
        let entries = match payload {
            Value::Object(map) => map.get("entries").cloned().unwrap_or(Value::Array(vec![])),
            other => other.clone(),
        };
        let entries: Vec<LadderEntry> = serde_json::from_value(entries)?;
        Ok(entries
            .iter()
            .enumerate()
            .map(|(position, entry)| Self::from_entry(entry, position, ladder_type))
            .collect())
    }

    /// 角色档案页面地址
    pub fn profile_url(&self) -> String {
        format!(
            "{}/{}/characters?characterName={}",
            PROFILE_BASE_URL,
            urlencoding::encode(&self.account),
            urlencoding::encode(&self.name)
        )
    }

    /// 角色所在天梯页面地址
    pub fn ladder_url(league: &str, ladder_type: &str) -> String {
        let section = if ladder_type == "delve-solo" {
            "delve-solo"
        } else {
            "league"
        };
        format!("{}/{}/{}", LADDER_BASE_URL, section, league)
    }
}

/// 已持久化的角色
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCharacter {
    pub id: i32,
    pub snapshot_id: i32,
    #[serde(flatten)]
    pub record: CharacterRecord,
    pub profile_url: Option<String>,
    pub ladder_url: Option<String>,
    pub enhanced_skills: Vec<String>,
    pub enhanced_uniques: Vec<String>,
    pub main_skill: Option<String>,
    pub life: Option<i32>,
    pub energy_shield: Option<i32>,
    pub profile_public: Option<bool>,
    pub categories: Option<BuildCategories>,
    pub categorized_at: Option<DateTime<Utc>>,
}

/// 从角色档案中提取的增强数据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnhancedProfile {
    pub skills: Vec<String>,
    pub uniques: Vec<String>,
    pub main_skill: Option<String>,
    pub life: Option<i32>,
    pub energy_shield: Option<i32>,
}

/// 角色档案查询结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOutcome {
    /// 公开档案
    Public(EnhancedProfile),
    /// 私有或不可访问
    Private,
}

/// 构筑分类结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildCategories {
    pub primary_damage_type: Option<String>,
    pub skill_delivery: Option<String>,
    pub cost_tier: Option<String>,
}
