pub mod round;

use crate::error::SurveyError;
use crate::session::{Advance, SurveySession};
use crate::state::AppState;
use crate::store::ResultsStore;
use chrono::Utc;
use log::{error, info, warn};
use round::{SurveyAction, SurveyButton, apply_buttons, completion_text, load_attachments, round_view};
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::prelude::*;
use std::collections::HashMap;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// What to send back once the session lock is released.
#[derive(Debug)]
enum Reply {
    Notice(String),
    Redraw(round::RoundView),
    NextRound {
        saved: String,
        view: round::RoundView,
    },
    Finished(String),
}

async fn send_notice(
    ctx: &Context,
    component: &MessageComponentInteraction,
    text: &str,
) -> Result<(), serenity::Error> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(text).ephemeral(true))
        })
        .await
}

// Routes survey buttons; session state is only touched while the lock is held.
pub async fn handle_component(
    state: &AppState,
    ctx: &Context,
    component: &MessageComponentInteraction,
) -> HandlerResult {
    let custom_id = &component.data.custom_id;
    info!("Received component interaction: {}", custom_id);

    let Some(button) = SurveyButton::parse(custom_id) else {
        warn!("Unhandled component custom_id: {}", custom_id);
        send_notice(ctx, component, "Unknown button action.").await?;
        return Ok(());
    };

    let user_id = component.user.id.to_string();
    let reply = {
        let mut sessions = state.sessions.lock().await;
        route_button(&state.store, &mut sessions, &user_id, &button)
    };

    match reply {
        Reply::Notice(text) => send_notice(ctx, component, &text).await?,
        Reply::Redraw(view) => {
            component
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::UpdateMessage)
                        .interaction_response_data(|message| {
                            message
                                .content(&view.content)
                                .components(|c| apply_buttons(c, &view))
                        })
                })
                .await?;
        }
        Reply::NextRound { saved, view } => {
            component
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::UpdateMessage)
                        .interaction_response_data(|message| message.content(saved).components(|c| c))
                })
                .await?;
            let files = load_attachments(&view).await?;
            component
                .create_followup_message(&ctx.http, |followup| {
                    followup
                        .ephemeral(true)
                        .content(&view.content)
                        .add_files(files)
                        .components(|c| apply_buttons(c, &view))
                })
                .await?;
        }
        Reply::Finished(text) => {
            component
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::UpdateMessage)
                        .interaction_response_data(|message| message.content(text).components(|c| c))
                })
                .await?;
        }
    }

    Ok(())
}

const FINALIZING_NOTICE: &str = "All rounds are saved; press Next to write the final results.";

// Applies one button press to the user's session and decides the reply.
fn route_button(
    store: &ResultsStore,
    sessions: &mut HashMap<String, SurveySession>,
    user_id: &str,
    button: &SurveyButton,
) -> Reply {
    let Some(session) = sessions
        .get_mut(user_id)
        .filter(|session| session.id() == button.session)
    else {
        warn!("Stale session button {} from user {}", button.custom_id(), user_id);
        return Reply::Notice(
            "This survey session is no longer active. Run `/survey start` to begin again.".to_string(),
        );
    };

    session.touch(Utc::now());
    if session.active_round() != Some(button.round) {
        warn!("Stale round button {} from user {}", button.custom_id(), user_id);
        return Reply::Notice("This round is no longer active.".to_string());
    }

    let round = button.round;
    match button.action {
        SurveyAction::Select(index) => match session.current_round_mut() {
            Some(current) => {
                let outcome = current.click(index);
                info!("User {} round {}: {:?}", user_id, round, outcome);
                redraw(session)
            }
            None => Reply::Notice(FINALIZING_NOTICE.to_string()),
        },
        SurveyAction::Reset => match session.current_round_mut() {
            Some(current) => {
                current.reset();
                redraw(session)
            }
            None => Reply::Notice(FINALIZING_NOTICE.to_string()),
        },
        SurveyAction::Next => {
            let outcome = {
                let mut rng = rand::rng();
                session.advance(store, &mut rng)
            };
            match outcome {
                Ok(Advance::NextRound(_)) => match session.current_round() {
                    Some(next) => Reply::NextRound {
                        saved: format!("Round {} / {} saved.", round, session.total_rounds()),
                        view: round_view(session, next),
                    },
                    None => Reply::Notice("The survey has no further rounds.".to_string()),
                },
                Ok(Advance::Finished(report)) => Reply::Finished(completion_text(&report)),
                Err(SurveyError::Ranking(issue)) => {
                    warn!("User {} tried to advance round {}: {}", user_id, round, issue);
                    redraw(session)
                }
                Err(e) => {
                    error!("Failed to save round {} for user {}: {}", round, user_id, e);
                    Reply::Notice(format!(
                        "Could not save your results ({}). Please press Next again.",
                        e
                    ))
                }
            }
        }
    }
}

fn redraw(session: &SurveySession) -> Reply {
    match session.current_round() {
        Some(current) => Reply::Redraw(round_view(session, current)),
        None => Reply::Notice("This round is no longer active.".to_string()),
    }
}

pub async fn handle_interaction(state: &AppState, ctx: &Context, interaction: Interaction) {
    let result = match interaction {
        Interaction::ApplicationCommand(command) => {
            crate::commands::handle_command(state, ctx, &command).await
        }
        Interaction::MessageComponent(component) => {
            let result = handle_component(state, ctx, &component).await;
            if let Err(ref why) = result {
                // The interaction may already be answered; this is best effort.
                let _ = send_notice(ctx, &component, "Something went wrong handling that click.").await;
                error!("Component handler error for {}: {:?}", component.data.custom_id, why);
            }
            Ok(())
        }
        _ => {
            warn!("Unhandled interaction type: {:?}", interaction.kind());
            Ok(())
        }
    };

    if let Err(why) = result {
        error!("Interaction handler error: {:?}", why);
    }
}
