//! EQ preset names and their role defaults.
//!
//! Only the names live here; the filter parameters belong to the renderer.

use std::str::FromStr;

use crate::error::SpecError;
use crate::timeline::{MixRole, SemanticRole, TrackKind};

/// Named EQ presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqPresetName {
    DialogueClean,
    DialogueWarm,
    DialogueBroadcast,
    MusicFull,
    MusicBed,
    BackgroundSoft,
    BackgroundDistant,
    SfxPunch,
    SfxSubtle,
}

impl EqPresetName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EqPresetName::DialogueClean => "dialogue_clean",
            EqPresetName::DialogueWarm => "dialogue_warm",
            EqPresetName::DialogueBroadcast => "dialogue_broadcast",
            EqPresetName::MusicFull => "music_full",
            EqPresetName::MusicBed => "music_bed",
            EqPresetName::BackgroundSoft => "background_soft",
            EqPresetName::BackgroundDistant => "background_distant",
            EqPresetName::SfxPunch => "sfx_punch",
            EqPresetName::SfxSubtle => "sfx_subtle",
        }
    }

    pub fn all() -> &'static [EqPresetName] {
        &[
            EqPresetName::DialogueClean,
            EqPresetName::DialogueWarm,
            EqPresetName::DialogueBroadcast,
            EqPresetName::MusicFull,
            EqPresetName::MusicBed,
            EqPresetName::BackgroundSoft,
            EqPresetName::BackgroundDistant,
            EqPresetName::SfxPunch,
            EqPresetName::SfxSubtle,
        ]
    }

    /// Default preset for a track's mix role and kind.
    pub fn for_role(kind: TrackKind, role: MixRole) -> Option<Self> {
        match (role, kind) {
            (MixRole::Voice, _) | (_, TrackKind::Voice) => Some(EqPresetName::DialogueClean),
            (_, TrackKind::Music) => Some(EqPresetName::MusicBed),
            (MixRole::Background, _) | (_, TrackKind::Ambience) => {
                Some(EqPresetName::BackgroundSoft)
            }
            _ => None,
        }
    }

    /// Default preset for an SFX semantic role.
    pub fn for_semantic(role: SemanticRole) -> Option<Self> {
        match role {
            SemanticRole::Impact => Some(EqPresetName::SfxPunch),
            SemanticRole::Movement => Some(EqPresetName::SfxSubtle),
            SemanticRole::Ambience => Some(EqPresetName::BackgroundSoft),
            SemanticRole::Interaction => None,
            SemanticRole::Texture => Some(EqPresetName::BackgroundDistant),
        }
    }
}

impl std::fmt::Display for EqPresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EqPresetName {
    type Err = SpecError;

    /// Accepts versioned aliases such as `dialogue_clean@v1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || SpecError::invalid_rules("eq_preset", format!("unknown preset '{}'", s));
        let base = match s.split_once('@') {
            Some((name, "v1")) => name,
            Some(_) => return Err(unknown()),
            None => s,
        };
        EqPresetName::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == base)
            .ok_or_else(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_alias() {
        assert_eq!(
            "music_bed@v1".parse::<EqPresetName>().unwrap(),
            EqPresetName::MusicBed
        );
        assert!("music_bed@v2".parse::<EqPresetName>().is_err());
        assert!("telephone".parse::<EqPresetName>().is_err());
    }

    #[test]
    fn test_role_defaults() {
        assert_eq!(
            EqPresetName::for_role(TrackKind::Voice, MixRole::Voice),
            Some(EqPresetName::DialogueClean)
        );
        assert_eq!(
            EqPresetName::for_role(TrackKind::Music, MixRole::Foreground),
            Some(EqPresetName::MusicBed)
        );
        assert_eq!(
            EqPresetName::for_role(TrackKind::Ambience, MixRole::Background),
            Some(EqPresetName::BackgroundSoft)
        );
        assert_eq!(EqPresetName::for_role(TrackKind::Sfx, MixRole::Foreground), None);
        assert_eq!(EqPresetName::for_semantic(SemanticRole::Interaction), None);
    }
}
