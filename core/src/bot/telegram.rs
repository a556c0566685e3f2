//! Telegram wiring: the only module allowed to know about `teloxide`. Bridges incoming
//! updates into `Router::route` and turns the resulting `RouteDecision` into session
//! lifecycle calls and chat replies.

use std::sync::{Arc, Mutex};

use teloxide::prelude::*;
use teloxide::types::ChatAction;

use super::{icons, RouteDecision, Router};
use crate::config::{self, Config};
use crate::log::{prefix, truncate_content_default};
use crate::pty;
use crate::registry::{SessionRecord, SessionRegistry};
use crate::screen::VirtualScreen;
use crate::sink::{ChatSink, DeliverFn, DynSink};
use crate::streamer;

pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

fn channel_id_for(chat_id: ChatId) -> String {
    format!("telegram:{}", chat_id.0)
}

fn chat_sink_for(bot: Bot, chat_id: ChatId) -> DynSink {
    let deliver: DeliverFn = Arc::new(move |text: String| {
        let bot = bot.clone();
        Box::pin(async move {
            if let Err(e) = bot.send_message(chat_id, text).await {
                eprintln!("{} event=send_failed error={}", prefix("bot.telegram"), e);
            }
        })
    });
    Arc::new(ChatSink::new(deliver, TELEGRAM_MAX_MESSAGE_LEN))
}

/// Run the Telegram long-poll loop until the process is asked to stop. Runs forever in
/// practice; the caller races this against `tokio::signal::ctrl_c()`. `router` already
/// holds whatever approval code the caller generated and printed at startup — this
/// function never mints one itself.
pub async fn run(bot_token: String, config: Arc<Mutex<Config>>, registry: Arc<SessionRegistry>, router: Arc<Router>) {
    let bot = Bot::new(bot_token);

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let config = config.clone();
        let registry = registry.clone();
        let router = router.clone();

        async move {
            let Some(user) = msg.from.as_ref() else {
                return Ok(());
            };
            let chat_user_id = user.id.0 as i64;
            let chat_id = msg.chat.id;
            let channel_id = channel_id_for(chat_id);
            let text = msg.text().unwrap_or("").to_string();

            eprintln!(
                "{} chat_id={} direction=incoming content={}",
                prefix("bot.telegram"),
                chat_id.0,
                truncate_content_default(&text)
            );

            let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

            let is_allowed = {
                let config = config.clone();
                move |id: i64| config.lock().unwrap().is_user_allowed(id)
            };
            let registry_check = registry.clone();
            let has_active = move || {
                registry_check
                    .get(&channel_id_for(chat_id))
                    .map(|r| r.is_active())
                    .unwrap_or(false)
            };

            let decision = router.route(chat_user_id, &text, is_allowed, has_active);
            handle_decision(bot, config, registry, chat_id, channel_id, decision).await;
            Ok(())
        }
    })
    .await;
}

async fn handle_decision(
    bot: Bot,
    config: Arc<Mutex<Config>>,
    registry: Arc<SessionRegistry>,
    chat_id: ChatId,
    channel_id: String,
    decision: RouteDecision,
) {
    match decision {
        RouteDecision::ApprovalAccepted { chat_user_id } => {
            let save_result = {
                let mut cfg = config.lock().unwrap();
                if !cfg.allowed_users.contains(&chat_user_id) {
                    cfg.allowed_users.push(chat_user_id);
                }
                config::save(&cfg)
            };
            if let Err(e) = save_result {
                eprintln!("{} event=config_save_failed error={}", prefix("bot.admission"), e);
            }
            reply(&bot, chat_id, &format!("{} Approved. You're connected.", icons::OK)).await;
        }
        RouteDecision::ApprovalRejected { message } => {
            reply(&bot, chat_id, &format!("{} {}", icons::ERROR, message)).await;
        }
        RouteDecision::Status => {
            let active = registry.get(&channel_id).map(|r| r.is_active()).unwrap_or(false);
            let text = if active {
                format!("{} Session active.", icons::OK)
            } else {
                format!("{} No active session.", icons::WARN)
            };
            reply(&bot, chat_id, &text).await;
        }
        RouteDecision::Exit => {
            registry.delete(&channel_id);
            reply(&bot, chat_id, &format!("{} Session closed.", icons::OK)).await;
        }
        RouteDecision::ForwardInput(text) => {
            if let Some(record) = registry.get(&channel_id) {
                record.pty.send_command(&text).await;
            }
        }
        RouteDecision::CreateInteractiveSession(command) => {
            spawn_session(bot, registry, chat_id, channel_id, command, true).await;
        }
        RouteDecision::RunOneShot(command) => {
            spawn_session(bot, registry, chat_id, channel_id, command, false).await;
        }
        RouteDecision::Ignored => {}
    }
}

async fn spawn_session(
    bot: Bot,
    registry: Arc<SessionRegistry>,
    chat_id: ChatId,
    channel_id: String,
    command: String,
    interactive: bool,
) {
    let (pty, output_rx) = match pty::spawn() {
        Ok(pair) => pair,
        Err(e) => {
            reply(&bot, chat_id, &format!("{} Failed to start session: {}", icons::ERROR, e)).await;
            return;
        }
    };
    let sink = chat_sink_for(bot, chat_id);
    let screen = Arc::new(VirtualScreen::new(pty::DEFAULT_ROWS, pty::DEFAULT_COLS));

    let record = Arc::new(SessionRecord::new(pty.clone(), sink.clone(), command.clone()));
    registry.create_if_absent(&channel_id, || record.clone());

    pty.send_command(&command).await;

    let registry_for_task = registry.clone();
    let channel_id_for_task = channel_id.clone();
    tokio::spawn(async move {
        streamer::chat::run(pty, output_rx, screen, sink).await;
        if !interactive {
            registry_for_task.delete(&channel_id_for_task);
        }
    });
}

async fn reply(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("{} event=reply_failed error={}", prefix("bot.telegram"), e);
    }
}
