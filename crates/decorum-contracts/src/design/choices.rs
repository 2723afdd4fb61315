use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoomType {
    #[default]
    LivingRoom,
    Bedroom,
    Kitchen,
    Bathroom,
    DiningRoom,
    HomeOffice,
    KidsRoom,
    Outdoor,
}

impl RoomType {
    pub const ALL: &'static [RoomType] = &[
        RoomType::LivingRoom,
        RoomType::Bedroom,
        RoomType::Kitchen,
        RoomType::Bathroom,
        RoomType::DiningRoom,
        RoomType::HomeOffice,
        RoomType::KidsRoom,
        RoomType::Outdoor,
    ];

    pub fn key(self) -> &'static str {
        match self {
            RoomType::LivingRoom => "living-room",
            RoomType::Bedroom => "bedroom",
            RoomType::Kitchen => "kitchen",
            RoomType::Bathroom => "bathroom",
            RoomType::DiningRoom => "dining-room",
            RoomType::HomeOffice => "home-office",
            RoomType::KidsRoom => "kids-room",
            RoomType::Outdoor => "outdoor",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoomType::LivingRoom => "Living Room",
            RoomType::Bedroom => "Bedroom",
            RoomType::Kitchen => "Kitchen",
            RoomType::Bathroom => "Bathroom",
            RoomType::DiningRoom => "Dining Room",
            RoomType::HomeOffice => "Home Office",
            RoomType::KidsRoom => "Kids Room",
            RoomType::Outdoor => "Outdoor Patio",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = choice_key(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|item| item.key() == key || choice_key(item.label()) == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DesignStyle {
    #[default]
    Modern,
    Minimalist,
    Scandinavian,
    Industrial,
    Bohemian,
    MidCentury,
    Japandi,
    Coastal,
    Farmhouse,
    ArtDeco,
    Traditional,
}

impl DesignStyle {
    pub const ALL: &'static [DesignStyle] = &[
        DesignStyle::Modern,
        DesignStyle::Minimalist,
        DesignStyle::Scandinavian,
        DesignStyle::Industrial,
        DesignStyle::Bohemian,
        DesignStyle::MidCentury,
        DesignStyle::Japandi,
        DesignStyle::Coastal,
        DesignStyle::Farmhouse,
        DesignStyle::ArtDeco,
        DesignStyle::Traditional,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DesignStyle::Modern => "modern",
            DesignStyle::Minimalist => "minimalist",
            DesignStyle::Scandinavian => "scandinavian",
            DesignStyle::Industrial => "industrial",
            DesignStyle::Bohemian => "bohemian",
            DesignStyle::MidCentury => "mid-century",
            DesignStyle::Japandi => "japandi",
            DesignStyle::Coastal => "coastal",
            DesignStyle::Farmhouse => "farmhouse",
            DesignStyle::ArtDeco => "art-deco",
            DesignStyle::Traditional => "traditional",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DesignStyle::Modern => "Modern",
            DesignStyle::Minimalist => "Minimalist",
            DesignStyle::Scandinavian => "Scandinavian",
            DesignStyle::Industrial => "Industrial",
            DesignStyle::Bohemian => "Bohemian",
            DesignStyle::MidCentury => "Mid-Century Modern",
            DesignStyle::Japandi => "Japandi",
            DesignStyle::Coastal => "Coastal",
            DesignStyle::Farmhouse => "Modern Farmhouse",
            DesignStyle::ArtDeco => "Art Deco",
            DesignStyle::Traditional => "Traditional",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = choice_key(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|item| item.key() == key || choice_key(item.label()) == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Budget {
    Low,
    #[default]
    Medium,
    High,
    Luxury,
}

impl Budget {
    pub const ALL: &'static [Budget] = &[Budget::Low, Budget::Medium, Budget::High, Budget::Luxury];

    pub fn key(self) -> &'static str {
        match self {
            Budget::Low => "low",
            Budget::Medium => "medium",
            Budget::High => "high",
            Budget::Luxury => "luxury",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Budget::Low => "Budget-friendly",
            Budget::Medium => "Mid-range",
            Budget::High => "High-end",
            Budget::Luxury => "Luxury",
        }
    }

    /// Phrase used in the design brief.
    pub fn guidance(self) -> &'static str {
        match self {
            Budget::Low => "favor affordable, readily available pieces and reuse existing furniture",
            Budget::Medium => "balance quality pieces with cost-conscious choices",
            Budget::High => "use premium materials and designer furniture",
            Budget::Luxury => "use bespoke, top-tier materials and statement pieces",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = choice_key(raw);
        Self::ALL
            .iter()
            .copied()
            .find(|item| item.key() == key || choice_key(item.label()) == key)
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_label!(RoomType, DesignStyle, Budget);

fn choice_key(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|ch| if ch == '_' || ch == ' ' { '-' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Budget, DesignStyle, RoomType};

    #[test]
    fn parse_accepts_keys_labels_and_loose_spelling() {
        assert_eq!(RoomType::parse("living_room"), Some(RoomType::LivingRoom));
        assert_eq!(RoomType::parse("Home Office"), Some(RoomType::HomeOffice));
        assert_eq!(DesignStyle::parse("Mid-Century Modern"), Some(DesignStyle::MidCentury));
        assert_eq!(DesignStyle::parse("ART DECO"), Some(DesignStyle::ArtDeco));
        assert_eq!(Budget::parse("mid-range"), Some(Budget::Medium));
        assert_eq!(Budget::parse("cheap"), None);
    }

    #[test]
    fn serde_uses_kebab_keys() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_value(DesignStyle::MidCentury)?,
            serde_json::json!("mid-century")
        );
        let parsed: RoomType = serde_json::from_str("\"dining-room\"")?;
        assert_eq!(parsed, RoomType::DiningRoom);
        for room in RoomType::ALL {
            assert_eq!(serde_json::to_value(room)?, serde_json::json!(room.key()));
        }
        Ok(())
    }
}
