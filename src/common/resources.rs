//! Game resources: canonical class tokens used by the raid manager.

/// Character classes as enumerated by the raid attendance API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacterClass {
    Bard,
    Beastlord,
    Berserker,
    Cleric,
    Druid,
    Enchanter,
    Magician,
    Monk,
    Necromancer,
    Paladin,
    Ranger,
    Rogue,
    ShadowKnight,
    Shaman,
    Warrior,
    Wizard,
    /// Class text present but not recognised.
    Unknown,
}

impl CharacterClass {
    /// Map free-form class text from a dump line to a canonical class.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unrecognised text maps to [`CharacterClass::Unknown`].
    pub fn normalize(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "bard" => Self::Bard,
            "beastlord" => Self::Beastlord,
            "berserker" => Self::Berserker,
            "cleric" => Self::Cleric,
            "druid" => Self::Druid,
            "enchanter" => Self::Enchanter,
            "magician" => Self::Magician,
            "monk" => Self::Monk,
            "necromancer" => Self::Necromancer,
            "paladin" => Self::Paladin,
            "ranger" => Self::Ranger,
            "rogue" => Self::Rogue,
            "shadow knight" | "shadowknight" => Self::ShadowKnight,
            "shaman" => Self::Shaman,
            "warrior" => Self::Warrior,
            "wizard" => Self::Wizard,
            _ => Self::Unknown,
        }
    }

    /// The API enumeration token.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Bard => "BARD",
            Self::Beastlord => "BEASTLORD",
            Self::Berserker => "BERSERKER",
            Self::Cleric => "CLERIC",
            Self::Druid => "DRUID",
            Self::Enchanter => "ENCHANTER",
            Self::Magician => "MAGICIAN",
            Self::Monk => "MONK",
            Self::Necromancer => "NECROMANCER",
            Self::Paladin => "PALADIN",
            Self::Ranger => "RANGER",
            Self::Rogue => "ROGUE",
            Self::ShadowKnight => "SHADOWKNIGHT",
            Self::Shaman => "SHAMAN",
            Self::Warrior => "WARRIOR",
            Self::Wizard => "WIZARD",
            Self::Unknown => "UNKNOWN",
        }
    }
}
