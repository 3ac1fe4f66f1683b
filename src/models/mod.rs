use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Generation method an image was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "flux")]
    Flux,
    #[serde(rename = "sdxl")]
    Sdxl,
    #[serde(rename = "sd3")]
    Sd3,
    #[serde(rename = "sd1.5")]
    Sd15,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Flux, Category::Sdxl, Category::Sd3, Category::Sd15];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Flux => "flux",
            Category::Sdxl => "sdxl",
            Category::Sd3 => "sd3",
            Category::Sd15 => "sd1.5",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundImage {
    pub category: Category,
    pub path: PathBuf,
}

impl RoundImage {
    /// Key used in persisted rankings.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Image path -> rank (1 = best).
pub type Ranking = BTreeMap<String, u8>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub ranking: Ranking,
}

/// Contents of the running results file and of each snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResults {
    pub rounds: Vec<RoundRecord>,
    #[serde(default)]
    pub final_scores: BTreeMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip_through_from_name() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_name("dalle"), None);
    }

    #[test]
    fn results_without_final_scores_still_parse() {
        let raw = r#"{"rounds": [{"round": 1, "ranking": {"a.png": 1}}]}"#;
        let parsed: SurveyResults = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.rounds.len(), 1);
        assert_eq!(parsed.rounds[0].ranking["a.png"], 1);
        assert!(parsed.final_scores.is_empty());
    }

    #[test]
    fn results_without_rounds_are_rejected() {
        let raw = r#"{"final_scores": {"flux": 3}}"#;
        assert!(serde_json::from_str::<SurveyResults>(raw).is_err());
    }
}
