//! Stat modifiers applied when a creature is snapshotted for battle.
//!
//! Modifiers compute percentages as floats and truncate the result. Truncation,
//! not rounding, is part of the game rules.

use crate::core::ball::CreatureStats;
use serde::Deserialize;

/// Transforms creature stats before a battle unit is built from them.
pub trait StatModifier: Send + Sync {
    /// Returns the modified stats.
    fn apply(&self, stats: CreatureStats) -> CreatureStats;
}

/// Leaves stats untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModifier;

impl StatModifier for NoModifier {
    fn apply(&self, stats: CreatureStats) -> CreatureStats {
        stats
    }
}

/// Region-based boss effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossEffect {
    /// +25% attack, -25% health for autonomous communities
    Spain,
    /// +15% attack, -20% health for Latin American countries
    SpanishEmpire,
    /// +25% attack for Latin America, -35% health for autonomous communities
    CeutaFurry,
}

/// Scales `value` by `percent` and truncates toward zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn apply_percent(value: i64, percent: f64) -> i64 {
    (value as f64 * (1.0 + percent / 100.0)) as i64
}

impl StatModifier for BossEffect {
    fn apply(&self, mut stats: CreatureStats) -> CreatureStats {
        let country = stats.species.as_str();
        match self {
            Self::Spain if is_autonomous_community(country) => {
                stats.attack = apply_percent(stats.attack, 25.0);
                stats.health = apply_percent(stats.health, -25.0);
            }
            Self::SpanishEmpire if is_latam(country) => {
                stats.attack = apply_percent(stats.attack, 15.0);
                stats.health = apply_percent(stats.health, -20.0);
            }
            Self::CeutaFurry if is_latam(country) => {
                stats.attack = apply_percent(stats.attack, 25.0);
            }
            Self::CeutaFurry if is_autonomous_community(country) => {
                stats.health = apply_percent(stats.health, -35.0);
            }
            _ => {}
        }
        stats
    }
}

/// Whether the species is one of Spain's autonomous communities or cities.
#[must_use]
pub fn is_autonomous_community(country: &str) -> bool {
    AUTONOMOUS_COMMUNITIES.contains(&country)
}

/// Whether the species is a Latin American country or territory.
#[must_use]
pub fn is_latam(country: &str) -> bool {
    LATAM.contains(&country)
}

/// Spanish autonomous communities and autonomous cities.
pub const AUTONOMOUS_COMMUNITIES: &[&str] = &[
    "Community of Madrid",
    "Castile and Leon",
    "Andalusia",
    "Ceuta",
    "Melilla",
    "Canary Islands",
    "Murcia",
    "Extremadura",
    "Galicia",
    "Asturias",
    "Cantabria",
    "Basque Country",
    "Navarra",
    "Castile-La Mancha",
    "Valencian Community",
    "Catalonia",
    "Balearic Islands",
    "Aragon",
    "La Rioja",
];

/// Latin American countries plus dependent territories in the region.
pub const LATAM: &[&str] = &[
    // South America
    "Argentina",
    "Bolivia",
    "Brazil",
    "Chile",
    "Colombia",
    "Ecuador",
    "Guyana",
    "Paraguay",
    "Peru",
    "Suriname",
    "Uruguay",
    "Venezuela",
    // Central America
    "Belize",
    "Costa Rica",
    "El Salvador",
    "Guatemala",
    "Honduras",
    "Nicaragua",
    "Panama",
    // Caribbean
    "Antigua and Barbuda",
    "Bahamas",
    "Barbados",
    "Cuba",
    "Dominica",
    "Dominican Republic",
    "Grenada",
    "Haiti",
    "Jamaica",
    "Saint Kitts and Nevis",
    "Saint Lucia",
    "Saint Vincent and the Grenadines",
    "Trinidad and Tobago",
    // Territories
    "Anguilla",
    "Aruba",
    "Bermuda",
    "Bonaire",
    "British Virgin Islands",
    "Cayman Islands",
    "Curaçao",
    "Falkland Islands",
    "French Guiana",
    "Guadeloupe",
    "Martinique",
    "Montserrat",
    "Puerto Rico",
    "Saba",
    "Saint Barthelemy",
    "Saint Martin",
    "Sint Eustatius",
    "Sint Maarten",
    "Turks and Caicos Islands",
    "US Virgin Islands",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stats;

    #[test]
    fn test_percent_truncates() {
        // 33 * 1.25 = 41.25
        assert_eq!(apply_percent(33, 25.0), 41);
        // 33 * 0.75 = 24.75, truncated not rounded
        assert_eq!(apply_percent(33, -25.0), 24);
        // 47 * 0.65 = 30.55
        assert_eq!(apply_percent(47, -35.0), 30);
    }

    #[test]
    fn test_spain_effect() {
        let buffed = BossEffect::Spain.apply(stats(1, "Catalonia", 33, 33));
        assert_eq!(buffed.attack, 41);
        assert_eq!(buffed.health, 24);

        let untouched = BossEffect::Spain.apply(stats(1, "Argentina", 33, 33));
        assert_eq!(untouched, stats(1, "Argentina", 33, 33));
    }

    #[test]
    fn test_spanish_empire_effect() {
        let buffed = BossEffect::SpanishEmpire.apply(stats(1, "Peru", 51, 29));
        // 29 * 1.15 = 33.35, 51 * 0.8 = 40.8
        assert_eq!(buffed.attack, 33);
        assert_eq!(buffed.health, 40);

        let untouched = BossEffect::SpanishEmpire.apply(stats(1, "Galicia", 51, 29));
        assert_eq!(untouched.health, 51);
    }

    #[test]
    fn test_ceuta_furry_effect() {
        let latam = BossEffect::CeutaFurry.apply(stats(1, "Chile", 47, 47));
        assert_eq!(latam.attack, 58);
        assert_eq!(latam.health, 47);

        let community = BossEffect::CeutaFurry.apply(stats(1, "Aragon", 47, 47));
        assert_eq!(community.attack, 47);
        assert_eq!(community.health, 30);

        let other = BossEffect::CeutaFurry.apply(stats(1, "France", 47, 47));
        assert_eq!(other, stats(1, "France", 47, 47));
    }

    #[test]
    fn test_no_modifier() {
        assert_eq!(NoModifier.apply(stats(1, "Peru", 5, 6)), stats(1, "Peru", 5, 6));
    }
}
