// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::character::{BuildCategories, StoredCharacter};

/// 构筑分类器
///
/// 纯函数：相同输入永远得到相同分类
pub trait BuildCategorizer: Send + Sync {
    fn categorize(&self, character: &StoredCharacter) -> BuildCategories;
}

const DAMAGE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "fire",
        &["fire", "flame", "burning", "ignite", "infernal", "molten", "scorching", "volcanic", "magma"],
    ),
    (
        "cold",
        &["cold", "ice", "frost", "freez", "glacial", "arctic", "winter", "vortex", "hatred"],
    ),
    (
        "lightning",
        &["lightning", "spark", "arc", "shock", "storm", "thunder", "ball lightning", "wrath"],
    ),
    (
        "chaos",
        &["chaos", "poison", "caustic", "contagion", "essence drain", "bane", "viper", "blight", "toxic"],
    ),
    (
        "physical",
        &["bleed", "lacerate", "boneshatter", "sunder", "earthquake", "cyclone", "splitting steel", "tornado shot", "exsanguinate", "reap"],
    ),
];

const DELIVERY_KEYWORDS: &[(&str, &[&str])] = &[
    ("totem", &["totem", "ballista"]),
    ("trap", &["trap"]),
    ("mine", &["mine"]),
    ("minion", &["summon", "raise", "golem", "animate", "spectre", "zombie", "skeleton"]),
    ("trigger", &["cast on", "cast when", "trigger"]),
    ("bow", &["arrow", "shot", "barrage", "rain of", "ballista"]),
    ("melee", &["strike", "slam", "cyclone", "boneshatter", "sunder", "earthquake", "cleave", "lacerate", "blade flurry", "flicker"]),
];

const LUXURY_UNIQUES: &[&str] = &[
    "mageblood", "headhunter", "oni-goroshi", "shaper's touch", "aegis aurora", "shavronne's wrappings",
];
const EXPENSIVE_UNIQUES: &[&str] = &[
    "belly of the beast", "kaom's heart", "inpulsa's broken heart", "doryani's prototype",
    "the baron", "mon'tregul's grasp", "brass dome",
];
const MODERATE_UNIQUES: &[&str] = &[
    "tabula rasa", "goldrim", "wanderlust", "meginord's girdle", "the princess", "lycosidae",
];

/// 基于关键字规则的构筑分类器
#[derive(Debug, Clone, Default)]
pub struct KeywordBuildCategorizer;

impl KeywordBuildCategorizer {
    pub fn new() -> Self {
        Self
    }

    fn best_match(table: &[(&'static str, &[&str])], main: &str, others: &[String]) -> Option<String> {
        let mut best: Option<(&str, u32)> = None;

        for (label, keywords) in table {
            let hits = |text: &str| keywords.iter().any(|k| text.contains(k));
            let mut score = 0u32;
            if hits(main) {
                score += 3;
            }
            score += others.iter().filter(|s| hits(s)).count() as u32;

            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((*label, score));
            }
        }

        best.map(|(label, _)| label.to_string())
    }

    fn cost_tier(uniques: &[String]) -> &'static str {
        let score: u32 = uniques
            .iter()
            .map(|u| {
                let u = u.to_lowercase();
                if LUXURY_UNIQUES.iter().any(|k| u.contains(k)) {
                    5
                } else if EXPENSIVE_UNIQUES.iter().any(|k| u.contains(k)) {
                    3
                } else if MODERATE_UNIQUES.iter().any(|k| u.contains(k)) {
                    1
                } else {
                    0
                }
            })
            .sum();

        match score {
            s if s >= 8 => "luxury",
            s if s >= 4 => "expensive",
            s if s >= 2 => "moderate",
            _ => "budget",
        }
    }
}

impl BuildCategorizer for KeywordBuildCategorizer {
    fn categorize(&self, character: &StoredCharacter) -> BuildCategories {
        let main = character
            .main_skill
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let skills: Vec<String> = character
            .enhanced_skills
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        let (primary_damage_type, skill_delivery) = if main.is_empty() && skills.is_empty() {
            (None, None)
        } else {
            let delivery = Self::best_match(DELIVERY_KEYWORDS, &main, &skills)
                .or_else(|| Some("self_cast".to_string()));
            (Self::best_match(DAMAGE_KEYWORDS, &main, &skills), delivery)
        };

        BuildCategories {
            primary_damage_type,
            skill_delivery,
            cost_tier: Some(Self::cost_tier(&character.enhanced_uniques).to_string()),
        }
    }
}
