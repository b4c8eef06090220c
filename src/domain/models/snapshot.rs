// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::character::StoredCharacter;
use crate::domain::models::league::LeagueMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 基础职业，其余职业名称视为升华职业
const BASE_CLASSES: [&str; 7] = [
    "Duelist", "Marauder", "Ranger", "Scion", "Shadow", "Templar", "Witch",
];

/// 天梯快照
///
/// 某联赛某天梯类型在某一时刻的不可变采集结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id: i32,
    pub league: String,
    pub ladder_type: String,
    pub snapshot_date: DateTime<Utc>,
    pub total_characters: i32,
    pub content_hash: String,
    pub meta: Option<LeagueMeta>,
    pub created_at: DateTime<Utc>,
}

/// 保存快照的结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveOutcome {
    pub snapshot_id: i32,
    /// 为 false 时表示命中了已存在的相同内容
    pub created: bool,
}

/// 快照聚合指标
///
/// 完全由快照的角色记录推导
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMetrics {
    pub snapshot_id: i32,
    pub total_characters: i32,
    pub avg_level: f64,
    pub max_level: i32,
    pub level_100_count: i32,
    pub class_distribution: BTreeMap<String, i64>,
    pub ascendancy_distribution: BTreeMap<String, i64>,
    pub skill_popularity: BTreeMap<String, i64>,
    pub unique_usage: BTreeMap<String, i64>,
}

impl SnapshotMetrics {
    /// 根据角色记录计算指标
    pub fn compute(snapshot_id: i32, characters: &[StoredCharacter]) -> Self {
        let total = characters.len();
        let mut class_distribution = BTreeMap::new();
        let mut ascendancy_distribution = BTreeMap::new();
        let mut skill_popularity = BTreeMap::new();
        let mut unique_usage = BTreeMap::new();
        let mut level_sum: i64 = 0;
        let mut max_level = 0;
        let mut level_100_count = 0;

        for character in characters {
            let record = &character.record;
            level_sum += i64::from(record.level);
            max_level = max_level.max(record.level);
            if record.level >= 100 {
                level_100_count += 1;
            }

            *class_distribution.entry(record.class.clone()).or_insert(0) += 1;
            if !record.class.is_empty() && !BASE_CLASSES.contains(&record.class.as_str()) {
                *ascendancy_distribution
                    .entry(record.class.clone())
                    .or_insert(0) += 1;
            }

            for skill in &character.enhanced_skills {
                *skill_popularity.entry(skill.clone()).or_insert(0) += 1;
            }
            for unique in &character.enhanced_uniques {
                *unique_usage.entry(unique.clone()).or_insert(0) += 1;
            }
        }

        let avg_level = if total == 0 {
            0.0
        } else {
            level_sum as f64 / total as f64
        };

        Self {
            snapshot_id,
            total_characters: total as i32,
            avg_level,
            max_level,
            level_100_count,
            class_distribution,
            ascendancy_distribution,
            skill_popularity,
            unique_usage,
        }
    }
}
