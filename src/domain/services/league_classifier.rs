// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::league::{ChallengeLeagues, LeagueInfo, LeagueMeta, LeagueVariant};

/// 永久联赛
pub const PERMANENT_LEAGUES: [&str; 2] = ["Standard", "Hardcore"];

const RULE_HARDCORE: &str = "Hardcore";
const RULE_SSF: &str = "Solo Self-Found";
const RULE_SOLO: &str = "Solo";
const RULE_RUTHLESS: &str = "Ruthless";

fn is_permanent(league: &str) -> bool {
    PERMANENT_LEAGUES
        .iter()
        .any(|p| p.eq_ignore_ascii_case(league))
}

fn tokens(league: &str) -> Vec<String> {
    league
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

fn name_flags(league: &str) -> (bool, bool) {
    let toks = tokens(league);
    let upper = league.to_ascii_uppercase();
    let hardcore = toks.iter().any(|t| t == "HC" || t == "HARDCORE");
    let ssf = toks.iter().any(|t| t == "SSF") || upper.contains("SOLO SELF-FOUND");
    (hardcore, ssf)
}

fn is_ruthless(info: &LeagueInfo) -> bool {
    info.has_rule(RULE_RUTHLESS) || info.id.to_ascii_lowercase().contains("ruthless")
}

/// 从联赛列表中发现当前挑战联赛及其变体
///
/// 跳过永久联赛与已设定结束时间的联赛；基础联赛是第一个不带
/// 硬核、单人自给、单人、无情规则的联赛，其余变体按ID包含基础名称匹配
pub fn discover_challenge_leagues(leagues: &[LeagueInfo]) -> ChallengeLeagues {
    let active: Vec<&LeagueInfo> = leagues
        .iter()
        .filter(|l| !is_permanent(&l.id) && l.end_at.is_none())
        .collect();

    let base = active.iter().find(|l| {
        ![RULE_HARDCORE, RULE_SSF, RULE_SOLO, RULE_RUTHLESS]
            .iter()
            .any(|rule| l.has_rule(rule))
    });

    let Some(base) = base else {
        return ChallengeLeagues::default();
    };
    let base_id = base.id.clone();
    let base_lower = base_id.to_ascii_lowercase();

    let mut variants: Vec<(LeagueVariant, String)> = Vec::new();
    for info in active {
        if !info.id.to_ascii_lowercase().contains(&base_lower) || is_ruthless(info) {
            continue;
        }

        let (name_hc, name_ssf) = name_flags(&info.id);
        let hardcore = info.has_rule(RULE_HARDCORE) || name_hc;
        let ssf = info.has_rule(RULE_SSF) || info.has_rule(RULE_SOLO) || name_ssf;
        let variant = LeagueVariant::from_flags(hardcore, ssf);

        if !variants.iter().any(|(v, _)| *v == variant) {
            variants.push((variant, info.id.clone()));
        }
    }

    let order = |v: &LeagueVariant| match v {
        LeagueVariant::Softcore => 0,
        LeagueVariant::SoftcoreSsf => 1,
        LeagueVariant::Hardcore => 2,
        LeagueVariant::HardcoreSsf => 3,
    };
    variants.sort_by_key(|(v, _)| order(v));

    ChallengeLeagues {
        base: Some(base_id),
        variants,
    }
}

/// 对联赛进行分类
///
/// 永久联赛直接判定；挑战联赛优先使用发现缓存，否则按名称推断
pub fn classify_league(league: &str, discovered: Option<&ChallengeLeagues>) -> LeagueMeta {
    if league.eq_ignore_ascii_case("Standard") {
        return LeagueMeta::permanent(LeagueVariant::Softcore);
    }
    if league.eq_ignore_ascii_case("Hardcore") {
        return LeagueMeta::permanent(LeagueVariant::Hardcore);
    }

    if let Some(cache) = discovered {
        if let Some(variant) = cache.variant_of(league) {
            return LeagueMeta::challenge(variant, cache.base.clone());
        }
    }

    let (hardcore, ssf) = name_flags(league);
    LeagueMeta::challenge(LeagueVariant::from_flags(hardcore, ssf), None)
}

/// 计算需要监控的联赛
///
/// 配置列表非空时直接使用，否则为永久联赛加上发现的挑战联赛变体
pub fn monitored_leagues(configured: &[String], discovered: &ChallengeLeagues) -> Vec<String> {
    if !configured.is_empty() {
        return configured.to_vec();
    }

    PERMANENT_LEAGUES
        .iter()
        .map(|s| s.to_string())
        .chain(discovered.league_ids())
        .collect()
}
