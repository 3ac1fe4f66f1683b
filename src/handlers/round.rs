use crate::session::{FinalReport, SurveySession};
use crate::survey::{RoundPhase, RoundState};
use serenity::builder::CreateComponents;
use serenity::model::application::component::ButtonStyle;
use serenity::model::channel::AttachmentType;
use std::borrow::Cow;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyAction {
    Select(usize),
    Reset,
    Next,
}

/// Decoded button id: `survey_<session>_<round>_<action>[_<index>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyButton {
    pub session: Uuid,
    pub round: u32,
    pub action: SurveyAction,
}

impl SurveyButton {
    pub fn new(session: Uuid, round: u32, action: SurveyAction) -> Self {
        Self {
            session,
            round,
            action,
        }
    }

    pub fn custom_id(&self) -> String {
        let prefix = format!("survey_{}_{}", self.session.simple(), self.round);
        match self.action {
            SurveyAction::Select(index) => format!("{}_select_{}", prefix, index),
            SurveyAction::Reset => format!("{}_reset", prefix),
            SurveyAction::Next => format!("{}_next", prefix),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        let parts: Vec<&str> = custom_id.split('_').collect();
        if parts.len() < 4 || parts[0] != "survey" {
            return None;
        }
        let session = Uuid::parse_str(parts[1]).ok()?;
        let round = parts[2].parse().ok()?;
        let action = match (parts[3], parts.get(4)) {
            ("select", Some(index)) if parts.len() == 5 => SurveyAction::Select(index.parse().ok()?),
            ("reset", None) => SurveyAction::Reset,
            ("next", None) => SurveyAction::Next,
            _ => return None,
        };
        Some(Self::new(session, round, action))
    }
}

#[derive(Debug, Clone)]
pub struct ImageButton {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub disabled: bool,
}

/// Everything needed to draw one round message.
#[derive(Debug, Clone)]
pub struct RoundView {
    pub content: String,
    pub image_buttons: Vec<ImageButton>,
    pub reset_id: String,
    pub next_id: String,
    pub can_advance: bool,
    pub attachments: Vec<(String, PathBuf)>,
}

pub fn attachment_name(position: usize, path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string());
    format!("image_{}.{}", position + 1, ext)
}

pub fn round_view(session: &SurveySession, state: &RoundState) -> RoundView {
    let session_id = session.id();
    let round = state.round();

    let image_buttons = state
        .images()
        .iter()
        .enumerate()
        .map(|(position, image)| {
            let rank = state.rank_of(&image.key());
            ImageButton {
                custom_id: SurveyButton::new(session_id, round, SurveyAction::Select(position))
                    .custom_id(),
                label: match rank {
                    Some(rank) => format!("Image {}: rank {}", position + 1, rank),
                    None => format!("Select image {}", position + 1),
                },
                style: if rank.is_some() {
                    ButtonStyle::Success
                } else {
                    ButtonStyle::Primary
                },
                disabled: rank.is_some(),
            }
        })
        .collect();

    let status = match state.validate() {
        Ok(_) => "Order complete. Press **Next** to save this round.".to_string(),
        Err(issue) => format!("⚠ {}", issue),
    };

    RoundView {
        content: format!(
            "**AI image ranking**\n**Round {} / {}**\n\
             Click the images in order of preference: the first click is rank 1 (best), \
             the last is rank {}. Use **Reset** to start this round over.\n\n{}",
            round,
            session.total_rounds(),
            state.images().len(),
            status
        ),
        image_buttons,
        reset_id: SurveyButton::new(session_id, round, SurveyAction::Reset).custom_id(),
        next_id: SurveyButton::new(session_id, round, SurveyAction::Next).custom_id(),
        can_advance: state.phase() == RoundPhase::Complete,
        attachments: state
            .images()
            .iter()
            .enumerate()
            .map(|(position, image)| (attachment_name(position, &image.path), image.path.clone()))
            .collect(),
    }
}

pub fn completion_text(report: &FinalReport) -> String {
    let mut text = String::from("Evaluation complete! Thank you.\n\n**Final scores**\n");
    for (category, score) in &report.scores {
        text.push_str(&format!("• {}: {}\n", category, score));
    }
    if let Some(name) = report.snapshot.file_name() {
        text.push_str(&format!("\nSaved as `{}`.", name.to_string_lossy()));
    }
    text
}

pub fn apply_buttons<'c>(c: &'c mut CreateComponents, view: &RoundView) -> &'c mut CreateComponents {
    c.create_action_row(|row| {
        for button in &view.image_buttons {
            row.create_button(|b| {
                b.custom_id(&button.custom_id)
                    .label(&button.label)
                    .style(button.style)
                    .disabled(button.disabled)
            });
        }
        row
    })
    .create_action_row(|row| {
        row.create_button(|b| {
            b.custom_id(&view.reset_id)
                .label("Reset")
                .style(ButtonStyle::Danger)
        })
        .create_button(|b| {
            b.custom_id(&view.next_id)
                .label("Next")
                .style(ButtonStyle::Success)
                .disabled(!view.can_advance)
        })
    })
}

/// Reads the round's images so they can be attached under neutral names.
pub async fn load_attachments(
    view: &RoundView,
) -> Result<Vec<AttachmentType<'static>>, std::io::Error> {
    let mut files = Vec::with_capacity(view.attachments.len());
    for (filename, path) in &view.attachments {
        let data = tokio::fs::read(path).await?;
        files.push(AttachmentType::Bytes {
            data: Cow::Owned(data),
            filename: filename.clone(),
        });
    }
    Ok(files)
}
