// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 联赛规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LeagueRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// 官方 API 返回的联赛信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeagueInfo {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<LeagueRule>,
    #[serde(rename = "startAt", default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(rename = "endAt", default)]
    pub end_at: Option<DateTime<Utc>>,
}

impl LeagueInfo {
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.name.eq_ignore_ascii_case(name) || rule.id.eq_ignore_ascii_case(name))
    }
}

/// 联赛类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeagueCategory {
    Permanent,
    Challenge,
}

impl fmt::Display for LeagueCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LeagueCategory::Permanent => write!(f, "permanent"),
            LeagueCategory::Challenge => write!(f, "challenge"),
        }
    }
}

impl FromStr for LeagueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(LeagueCategory::Permanent),
            "challenge" => Ok(LeagueCategory::Challenge),
            other => Err(format!("unknown league category: {}", other)),
        }
    }
}

/// 联赛变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeagueVariant {
    Softcore,
    Hardcore,
    SoftcoreSsf,
    HardcoreSsf,
}

impl LeagueVariant {
    /// 根据硬核与单人自给标记组合出变体
    pub fn from_flags(hardcore: bool, ssf: bool) -> Self {
        match (hardcore, ssf) {
            (false, false) => LeagueVariant::Softcore,
            (true, false) => LeagueVariant::Hardcore,
            (false, true) => LeagueVariant::SoftcoreSsf,
            (true, true) => LeagueVariant::HardcoreSsf,
        }
    }
}

impl fmt::Display for LeagueVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LeagueVariant::Softcore => write!(f, "softcore"),
            LeagueVariant::Hardcore => write!(f, "hardcore"),
            LeagueVariant::SoftcoreSsf => write!(f, "softcore_ssf"),
            LeagueVariant::HardcoreSsf => write!(f, "hardcore_ssf"),
        }
    }
}

impl FromStr for LeagueVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "softcore" => Ok(LeagueVariant::Softcore),
            "hardcore" => Ok(LeagueVariant::Hardcore),
            "softcore_ssf" => Ok(LeagueVariant::SoftcoreSsf),
            "hardcore_ssf" => Ok(LeagueVariant::HardcoreSsf),
            other => Err(format!("unknown league variant: {}", other)),
        }
    }
}

/// 快照附带的联赛元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeagueMeta {
    pub category: LeagueCategory,
    pub variant: LeagueVariant,
    /// 挑战联赛的基础名称，永久联赛为空
    pub challenge_base: Option<String>,
}

impl LeagueMeta {
    pub fn permanent(variant: LeagueVariant) -> Self {
        Self {
            category: LeagueCategory::Permanent,
            variant,
            challenge_base: None,
        }
    }

    pub fn challenge(variant: LeagueVariant, base: Option<String>) -> Self {
        Self {
            category: LeagueCategory::Challenge,
            variant,
            challenge_base: base,
        }
    }

    /// 档案增强的基础尝试次数
    pub fn enhancement_base_attempts(&self) -> usize {
        match (self.category, self.variant) {
            (LeagueCategory::Challenge, LeagueVariant::Softcore) => 200,
            (LeagueCategory::Challenge, LeagueVariant::Hardcore) => 120,
            (LeagueCategory::Challenge, LeagueVariant::SoftcoreSsf) => 120,
            (LeagueCategory::Challenge, LeagueVariant::HardcoreSsf) => 80,
            (LeagueCategory::Permanent, LeagueVariant::Softcore) => 120,
            (LeagueCategory::Permanent, LeagueVariant::Hardcore) => 160,
            _ => 50,
        }
    }
}

/// 联赛发现结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChallengeLeagues {
    /// 挑战联赛基础名称
    pub base: Option<String>,
    /// 变体名称到联赛 ID 的映射
    pub variants: Vec<(LeagueVariant, String)>,
}

impl ChallengeLeagues {
    pub fn variant_of(&self, league: &str) -> Option<LeagueVariant> {
        self.variants
            .iter()
            .find(|(_, id)| id == league)
            .map(|(variant, _)| *variant)
    }

    pub fn league_ids(&self) -> Vec<String> {
        self.variants.iter().map(|(_, id)| id.clone()).collect()
    }
}
