pub mod survey;

use crate::state::AppState;
use serenity::model::application::command::Command;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::id::GuildId;
use serenity::prelude::*;

/// Guild commands show up immediately, global ones can take a while.
pub async fn register_commands(ctx: &Context, guild_id: Option<GuildId>) -> Result<(), serenity::Error> {
    match guild_id {
        Some(guild_id) => {
            guild_id
                .set_application_commands(&ctx.http, |commands| {
                    commands.create_application_command(|command| survey::create_survey_command(command))
                })
                .await?;
        }
        None => {
            Command::set_global_application_commands(&ctx.http, |commands| {
                commands.create_application_command(|command| survey::create_survey_command(command))
            })
            .await?;
        }
    }
    Ok(())
}

pub async fn handle_command(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    log::info!("Received command: {}", command.data.name);
    match command.data.name.as_str() {
        "survey" => survey::handle_survey_command(state, ctx, command).await?,
        _ => {
            command
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message.content("Unknown command").ephemeral(true)
                        })
                })
                .await?;
        }
    }

    Ok(())
}
