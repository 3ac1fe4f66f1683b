use crate::models::{Category, Ranking, RoundImage};
use crate::survey::folders::parse_folder_name;
use log::warn;
use std::collections::BTreeMap;
use std::path::Path;

/// Rank 1 earns `RANK_SCORE_BASE - 1` points, rank 4 earns 1.
pub const RANK_SCORE_BASE: u32 = 5;

/// A round the evaluator finished, with the images it showed.
#[derive(Debug, Clone)]
pub struct CompletedRound {
    pub round: u32,
    pub images: Vec<RoundImage>,
    pub ranking: Ranking,
}

pub fn rank_points(rank: u8) -> u32 {
    RANK_SCORE_BASE.saturating_sub(u32::from(rank))
}

fn category_of(key: &str, images: &[RoundImage]) -> Option<Category> {
    images
        .iter()
        .find(|image| image.key() == key)
        .map(|image| image.category)
        .or_else(|| {
            let folder = Path::new(key).parent()?.file_name()?.to_str()?;
            parse_folder_name(folder).map(|(category, _)| category)
        })
}

/// Per-category totals; every category is present, starting at zero.
pub fn final_scores(rounds: &[CompletedRound]) -> BTreeMap<Category, u32> {
    let mut scores: BTreeMap<Category, u32> = Category::ALL.iter().map(|c| (*c, 0)).collect();

    for completed in rounds {
        for (key, rank) in &completed.ranking {
            match category_of(key, &completed.images) {
                Some(category) => *scores.entry(category).or_insert(0) += rank_points(*rank),
                None => warn!(
                    "Round {}: no category for {}, not scored",
                    completed.round, key
                ),
            }
        }
    }
    scores
}

/// String-keyed form written to `final_scores`.
pub fn scores_by_name(scores: &BTreeMap<Category, u32>) -> BTreeMap<String, u32> {
    scores
        .iter()
        .map(|(category, score)| (category.as_str().to_string(), *score))
        .collect()
}
