pub mod folders;
pub mod ranking;
pub mod scoring;

pub use folders::{GroupedFolders, group_folders, images_for_round};
pub use ranking::{RoundPhase, RoundState};
pub use scoring::{CompletedRound, final_scores};
