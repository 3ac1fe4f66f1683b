mod commands;
mod config;
mod error;
mod handlers;
mod models;
mod session;
mod state;
mod store;
mod survey;
mod tasks;

use config::SurveyConfig;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use state::AppState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct Bot {
    state: Arc<AppState>,
    reaper_started: AtomicBool,
}

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            handlers::handle_interaction(&state, &ctx, interaction).await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let guild_id = self.state.config.guild_id.map(GuildId);
        let scope = guild_id.map_or_else(|| "global".to_string(), |id| format!("guild {}", id));
        match commands::register_commands(&ctx, guild_id).await {
            Ok(()) => info!("Registered /survey command ({})", scope),
            Err(why) => error!("Failed to register slash commands: {:?}", why),
        }

        // `ready` fires again after every reconnect.
        if !self.reaper_started.swap(true, Ordering::SeqCst) {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                tasks::session_reaper::reap_idle_sessions_task(state).await;
            });
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match SurveyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    match survey::group_folders(&config.base_dir, config.total_rounds) {
        Ok(grouped) => info!(
            "Found images for {} of {} round(s) under {}",
            grouped.len(),
            config.total_rounds,
            config.base_dir.display()
        ),
        Err(e) => warn!("{}", e),
    }

    let token = config.token.clone();
    let state = Arc::new(AppState::new(config));
    info!(
        "Writing results to {} ({} round(s) already recorded)",
        state.store.path().display(),
        state.store.results().rounds.len()
    );

    let intents = GatewayIntents::GUILDS;
    let mut client = match Client::builder(&token, intents)
        .event_handler(Bot {
            state,
            reaper_started: AtomicBool::new(false),
        })
        .await
    {
        Ok(client) => client,
        Err(why) => {
            error!("Error creating client: {:?}", why);
            return;
        }
    };

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
