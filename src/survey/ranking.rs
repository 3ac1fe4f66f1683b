use crate::error::RankingIssue;
use crate::models::{Ranking, RoundImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Some images are still unranked.
    Active,
    /// Every image has a distinct rank; the round may advance.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Ranked(u8),
    AlreadyRanked(u8),
    UnknownImage,
}

/// Click-order state for one round.
#[derive(Debug, Clone)]
pub struct RoundState {
    round: u32,
    images: Vec<RoundImage>,
    clicked: Vec<String>,
}

impl RoundState {
    pub fn new(round: u32, images: Vec<RoundImage>) -> Self {
        Self {
            round,
            images,
            clicked: Vec::new(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Images in presentation order.
    pub fn images(&self) -> &[RoundImage] {
        &self.images
    }

    pub fn ranked_count(&self) -> usize {
        self.clicked.len()
    }

    /// Clicks the image at presentation position `index`.
    pub fn click(&mut self, index: usize) -> ClickOutcome {
        match self.images.get(index) {
            Some(image) => {
                let key = image.key();
                self.click_key(&key)
            }
            None => ClickOutcome::UnknownImage,
        }
    }

    pub fn click_key(&mut self, key: &str) -> ClickOutcome {
        if !self.images.iter().any(|image| image.key() == key) {
            return ClickOutcome::UnknownImage;
        }
        if let Some(rank) = self.rank_of(key) {
            return ClickOutcome::AlreadyRanked(rank);
        }
        self.clicked.push(key.to_string());
        ClickOutcome::Ranked(self.clicked.len() as u8)
    }

    pub fn reset(&mut self) {
        self.clicked.clear();
    }

    pub fn rank_of(&self, key: &str) -> Option<u8> {
        self.clicked
            .iter()
            .position(|k| k == key)
            .map(|pos| (pos + 1) as u8)
    }

    pub fn phase(&self) -> RoundPhase {
        if self.validate().is_ok() {
            RoundPhase::Complete
        } else {
            RoundPhase::Active
        }
    }

    /// Builds the ranking once every shown image is ranked. `click_key` only
    /// accepts shown, unranked images, so a full record has distinct ranks.
    pub fn validate(&self) -> Result<Ranking, RankingIssue> {
        let expected = self.images.len();
        if expected == 0 || self.clicked.len() != expected {
            return Err(RankingIssue::Incomplete {
                ranked: self.clicked.len(),
                expected,
            });
        }

        let ranking: Ranking = self
            .clicked
            .iter()
            .enumerate()
            .map(|(pos, key)| (key.clone(), (pos + 1) as u8))
            .collect();
        debug_assert!(is_valid_ranking(&ranking, expected));
        Ok(ranking)
    }
}

/// A ranking over `expected` images is valid iff its ranks are exactly `1..=expected`.
pub fn is_valid_ranking(ranking: &Ranking, expected: usize) -> bool {
    if ranking.len() != expected {
        return false;
    }
    let mut ranks: Vec<u8> = ranking.values().copied().collect();
    ranks.sort_unstable();
    ranks
        .iter()
        .enumerate()
        .all(|(pos, rank)| *rank as usize == pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use std::path::PathBuf;

    fn full_round() -> RoundState {
        let images = Category::ALL
            .iter()
            .map(|c| RoundImage {
                category: *c,
                path: PathBuf::from(format!("base/{}_1/img.png", c)),
            })
            .collect();
        RoundState::new(1, images)
    }

    #[test]
    fn click_order_becomes_rank() {
        let mut state = full_round();
        assert_eq!(state.click(2), ClickOutcome::Ranked(1));
        assert_eq!(state.click(0), ClickOutcome::Ranked(2));
        assert_eq!(state.phase(), RoundPhase::Active);
        assert_eq!(state.click(3), ClickOutcome::Ranked(3));
        assert_eq!(state.click(1), ClickOutcome::Ranked(4));
        assert_eq!(state.phase(), RoundPhase::Complete);

        let ranking = state.validate().unwrap();
        assert_eq!(ranking[&state.images()[2].key()], 1);
        assert_eq!(ranking[&state.images()[1].key()], 4);
        assert!(is_valid_ranking(&ranking, 4));
    }

    #[test]
    fn reclick_is_a_no_op() {
        let mut state = full_round();
        state.click(1);
        assert_eq!(state.click(1), ClickOutcome::AlreadyRanked(1));
        assert_eq!(state.ranked_count(), 1);
        assert_eq!(state.click(9), ClickOutcome::UnknownImage);
        assert_eq!(state.click_key("elsewhere.png"), ClickOutcome::UnknownImage);
        assert_eq!(state.ranked_count(), 1);
    }

    #[test]
    fn reset_clears_current_round() {
        let mut state = full_round();
        for i in 0..4 {
            state.click(i);
        }
        state.reset();
        assert_eq!(state.ranked_count(), 0);
        assert!(state.images().iter().all(|img| state.rank_of(&img.key()).is_none()));
        assert_eq!(state.click(3), ClickOutcome::Ranked(1));
    }

    #[test]
    fn incomplete_ranking_blocks_advance() {
        let mut state = full_round();
        state.click(0);
        state.click(1);
        assert_eq!(
            state.validate(),
            Err(RankingIssue::Incomplete {
                ranked: 2,
                expected: 4
            })
        );
    }

    #[test]
    fn empty_round_never_validates() {
        let state = RoundState::new(4, Vec::new());
        assert!(state.validate().is_err());
        assert_eq!(state.phase(), RoundPhase::Active);
    }

    #[test]
    fn ranking_validity_requires_exact_rank_set() {
        let make = |ranks: &[u8]| -> Ranking {
            ranks
                .iter()
                .enumerate()
                .map(|(i, r)| (format!("img{}.png", i), *r))
                .collect()
        };
        assert!(is_valid_ranking(&make(&[3, 1, 4, 2]), 4));
        assert!(!is_valid_ranking(&make(&[1, 2, 3]), 4));
        assert!(!is_valid_ranking(&make(&[1, 1, 3, 4]), 4));
        assert!(!is_valid_ranking(&make(&[1, 2, 3, 5]), 4));
        assert!(!is_valid_ranking(&make(&[0, 1, 2, 3]), 4));
    }

    #[test]
    fn partial_round_completes_with_its_own_ranks() {
        let images: Vec<RoundImage> = [Category::Flux, Category::Sd3, Category::Sd15]
            .iter()
            .map(|c| RoundImage {
                category: *c,
                path: PathBuf::from(format!("base/{}_2/img.png", c)),
            })
            .collect();
        let mut state = RoundState::new(2, images);

        assert_eq!(state.click(1), ClickOutcome::Ranked(1));
        assert_eq!(state.click(2), ClickOutcome::Ranked(2));
        assert_eq!(state.phase(), RoundPhase::Active);
        assert_eq!(state.click(0), ClickOutcome::Ranked(3));
        assert_eq!(state.phase(), RoundPhase::Complete);
        assert_eq!(state.click(3), ClickOutcome::UnknownImage);

        let ranking = state.validate().unwrap();
        let mut ranks: Vec<u8> = ranking.values().copied().collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(is_valid_ranking(&ranking, 3));
        assert!(!is_valid_ranking(&ranking, 4));
    }
}
