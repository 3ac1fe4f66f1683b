use crate::error::SurveyError;
use crate::handlers::round::{RoundView, apply_buttons, completion_text, load_attachments, round_view};
use crate::session::{Advance, SurveySession};
use crate::state::AppState;
use crate::survey::group_folders;
use chrono::Utc;
use log::{error, info};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::prelude::*;
use std::collections::HashMap;

pub fn create_survey_command(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("survey")
        .description("Rank AI-generated images")
        .create_option(|option| {
            option
                .name("start")
                .description("Start the ranking survey, or show your current round again")
                .kind(CommandOptionType::SubCommand)
        })
        .create_option(|option| {
            option
                .name("status")
                .description("Show your progress through the survey")
                .kind(CommandOptionType::SubCommand)
        })
}

pub async fn handle_survey_command(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subcommand_name = match command.data.options.first() {
        Some(option) => option.name.as_str(),
        None => {
            send_text(ctx, command, "No subcommand provided").await?;
            return Ok(());
        }
    };

    match subcommand_name {
        "start" => handle_start(state, ctx, command).await?,
        "status" => handle_status(state, ctx, command).await?,
        _ => send_text(ctx, command, "Unknown subcommand").await?,
    }

    Ok(())
}

/// What `/survey start` posts back.
#[derive(Debug)]
enum StartReply {
    Round(RoundView),
    Finished(String),
}

/// Starts a fresh session, or re-posts the active round of an unfinished one.
/// A session whose final snapshot failed retries it here.
fn start_or_resume(
    state: &AppState,
    sessions: &mut HashMap<String, SurveySession>,
    user_id: &str,
) -> Result<StartReply, SurveyError> {
    let resumable = sessions
        .get(user_id)
        .map(|session| !session.is_finished())
        .unwrap_or(false);

    if !resumable {
        let folders = group_folders(&state.config.base_dir, state.config.total_rounds)?;
        let session = {
            let mut rng = rand::rng();
            SurveySession::start(user_id, folders, state.config.total_rounds, &mut rng)?
        };
        sessions.insert(user_id.to_string(), session);
    } else {
        info!("Resuming survey session for user {}", user_id);
    }

    let session = sessions.get_mut(user_id).ok_or(SurveyError::AlreadyComplete)?;
    session.touch(Utc::now());
    if let Some(current) = session.current_round() {
        return Ok(StartReply::Round(round_view(session, current)));
    }

    info!("Retrying final results for user {}", user_id);
    let outcome = {
        let mut rng = rand::rng();
        session.advance(&state.store, &mut rng)?
    };
    match outcome {
        Advance::Finished(report) => Ok(StartReply::Finished(completion_text(&report))),
        Advance::NextRound(_) => match session.current_round() {
            Some(current) => Ok(StartReply::Round(round_view(session, current))),
            None => Err(SurveyError::AlreadyComplete),
        },
    }
}

async fn handle_start(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = command.user.id.to_string();
    let reply = {
        let mut sessions = state.sessions.lock().await;
        start_or_resume(state, &mut sessions, &user_id)
    };

    let view = match reply {
        Ok(StartReply::Round(view)) => view,
        Ok(StartReply::Finished(text)) => {
            send_text(ctx, command, &text).await?;
            return Ok(());
        }
        Err(e) => {
            error!("Cannot start survey for user {}: {}", user_id, e);
            send_text(ctx, command, &format!("Cannot start the survey: {}", e)).await?;
            return Ok(());
        }
    };

    let files = load_attachments(&view).await?;
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| {
                    message
                        .ephemeral(true)
                        .content(&view.content)
                        .add_files(files)
                        .components(|c| apply_buttons(c, &view))
                })
        })
        .await?;
    Ok(())
}

async fn handle_status(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = command.user.id.to_string();
    let text = {
        let sessions = state.sessions.lock().await;
        match sessions.get(&user_id) {
            None => "You have no survey in progress. Run `/survey start` to begin.".to_string(),
            Some(session) => match (session.current_round(), session.final_report()) {
                (Some(current), _) => format!(
                    "Round {} of {}: {} of {} images ranked, {} round(s) saved.",
                    current.round(),
                    session.total_rounds(),
                    current.ranked_count(),
                    current.images().len(),
                    session.completed_rounds()
                ),
                (None, Some(report)) => completion_text(report),
                (None, None) => "All rounds are saved; press Next or run `/survey start` to write the final results.".to_string(),
            },
        }
    };
    send_text(ctx, command, &text).await?;
    Ok(())
}

async fn send_text(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    text: &str,
) -> Result<(), serenity::Error> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(text).ephemeral(true))
        })
        .await
}
