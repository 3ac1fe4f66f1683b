use crate::error::SurveyError;
use crate::models::{Category, RoundImage};
use lazy_static::lazy_static;
use log::{debug, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

lazy_static! {
    static ref FOLDER_PATTERN: Regex = {
        let names = Category::ALL
            .iter()
            .map(|c| regex::escape(c.as_str()))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"^({})_(\d+)$", names)).expect("category folder pattern compiles")
    };
}

/// round -> category -> folder
pub type GroupedFolders = BTreeMap<u32, BTreeMap<Category, PathBuf>>;

/// Splits a folder name like `sdxl_3` into its category and round.
pub fn parse_folder_name(name: &str) -> Option<(Category, u32)> {
    let caps = FOLDER_PATTERN.captures(name)?;
    let category = Category::from_name(caps.get(1)?.as_str())?;
    let round = caps.get(2)?.as_str().parse().ok()?;
    Some((category, round))
}

/// Groups the immediate subdirectories of `base_dir` by round.
///
/// Names that don't match `{category}_{round}` and rounds outside
/// `1..=total_rounds` are skipped. Missing rounds or categories are fine.
pub fn group_folders(base_dir: &Path, total_rounds: u32) -> Result<GroupedFolders, SurveyError> {
    let entries = fs::read_dir(base_dir).map_err(|source| SurveyError::ScanDir {
        path: base_dir.to_path_buf(),
        source,
    })?;

    let mut grouped = GroupedFolders::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some((category, round)) = name.to_str().and_then(parse_folder_name) else {
            debug!("Skipping folder {}", path.display());
            continue;
        };
        if round == 0 || round > total_rounds {
            debug!("Skipping folder {} outside rounds 1..={}", path.display(), total_rounds);
            continue;
        }
        grouped.entry(round).or_default().insert(category, path);
    }
    Ok(grouped)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// First image in directory listing order.
pub fn first_image(folder: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read image folder {}: {}", folder.display(), e);
            return None;
        }
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.is_file() && is_image(path))
}

/// One image per category for `round`, in random presentation order.
pub fn images_for_round<R: Rng + ?Sized>(
    grouped: &GroupedFolders,
    round: u32,
    rng: &mut R,
) -> Vec<RoundImage> {
    let mut images: Vec<RoundImage> = grouped
        .get(&round)
        .into_iter()
        .flatten()
        .filter_map(|(category, folder)| {
            first_image(folder).map(|path| RoundImage {
                category: *category,
                path,
            })
        })
        .collect();
    images.shuffle(rng);
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn make_folder(base: &Path, name: &str, files: &[&str]) {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"img").unwrap();
        }
    }

    #[test]
    fn parses_category_and_round() {
        assert_eq!(parse_folder_name("flux_1"), Some((Category::Flux, 1)));
        assert_eq!(parse_folder_name("sd1.5_10"), Some((Category::Sd15, 10)));
        assert_eq!(parse_folder_name("sd3_4"), Some((Category::Sd3, 4)));
        assert_eq!(parse_folder_name("sdxl_"), None);
        assert_eq!(parse_folder_name("sd1x5_2"), None);
        assert_eq!(parse_folder_name("dalle_1"), None);
        assert_eq!(parse_folder_name("flux_one"), None);
    }

    #[test]
    fn groups_matching_folders_and_skips_the_rest() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path();
        make_folder(base, "flux_1", &[]);
        make_folder(base, "sdxl_1", &[]);
        make_folder(base, "sd3_2", &[]);
        make_folder(base, "sd1.5_11", &[]);
        make_folder(base, "flux_0", &[]);
        make_folder(base, "notes", &[]);
        fs::write(base.join("sdxl_2"), b"not a dir").unwrap();

        let grouped = group_folders(base, 10).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped[&1].keys().copied().collect::<Vec<_>>(),
            vec![Category::Flux, Category::Sdxl]
        );
        assert_eq!(grouped[&2].keys().copied().collect::<Vec<_>>(), vec![Category::Sd3]);
        assert_eq!(grouped[&2][&Category::Sd3], base.join("sd3_2"));
    }

    #[test]
    fn missing_base_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = group_folders(&tmp.path().join("absent"), 10).unwrap_err();
        assert!(matches!(err, SurveyError::ScanDir { .. }));
    }

    #[test]
    fn first_image_ignores_non_images() {
        let tmp = TempDir::new().unwrap();
        make_folder(tmp.path(), "flux_1", &["readme.txt", "pic.JPEG"]);
        let found = first_image(&tmp.path().join("flux_1")).unwrap();
        assert_eq!(found.file_name().unwrap(), "pic.JPEG");
    }

    #[test]
    fn round_selection_has_at_most_one_image_per_category() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path();
        make_folder(base, "flux_1", &["a.png", "b.png"]);
        make_folder(base, "sdxl_1", &["c.jpg"]);
        make_folder(base, "sd3_1", &["d.jpeg", "e.png", "f.png"]);
        make_folder(base, "sd1.5_1", &["notes.txt"]);
        let grouped = group_folders(base, 10).unwrap();

        let mut rng = rand::rng();
        for _ in 0..20 {
            let images = images_for_round(&grouped, 1, &mut rng);
            assert_eq!(images.len(), 3);
            let categories: HashSet<Category> = images.iter().map(|i| i.category).collect();
            assert_eq!(categories.len(), images.len());
            assert!(!categories.contains(&Category::Sd15));
        }
    }

    #[test]
    fn missing_round_yields_no_images() {
        let grouped = GroupedFolders::new();
        assert!(images_for_round(&grouped, 3, &mut rand::rng()).is_empty());
    }
}
