//! Bot long-polling loop.
//!
//! The only interaction the bot cares about is /start: it records the
//! sender's username → chat id so the send endpoint can reach them later,
//! then replies with a greeting. Everything else is logged and ignored.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chat_map::ChatStore;
use crate::telegram::{
    play_keyboard, start_greeting, MessageSender, OutgoingMessage, TelegramClient, Update,
};

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Polls `getUpdates` forever. Poll errors back off briefly instead of
/// killing the loop.
pub async fn run_bot(
    client: Arc<TelegramClient>,
    chats: Arc<dyn ChatStore>,
    web_app_url: Option<String>,
) {
    info!("Telegram bot polling started");
    let mut offset: Option<i64> = None;

    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {e}");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            handle_update(
                client.as_ref(),
                chats.as_ref(),
                web_app_url.as_deref(),
                update,
            )
            .await;
        }
    }
}

/// Handles one update. Greeting delivery failures are logged, never fatal.
pub async fn handle_update(
    sender: &dyn MessageSender,
    chats: &dyn ChatStore,
    web_app_url: Option<&str>,
    update: Update,
) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };

    if !text.starts_with("/start") {
        debug!("ignoring message from chat {}: {text}", message.chat.id);
        return;
    }

    let chat_id = message.chat.id;
    let username = message.from.as_ref().and_then(|u| u.username.as_deref());
    let first_name = message.from.as_ref().and_then(|u| u.first_name.as_deref());

    match username {
        Some(username) => {
            chats.register(username, chat_id);
            info!("registered @{username} -> chat {chat_id}");
        }
        None => {
            // Without a username the game has no way to address this
            // player later.
            warn!("/start from chat {chat_id} without a username; not registered");
        }
    }

    let mut greeting = OutgoingMessage::plain(chat_id, start_greeting(first_name));
    if let Some(url) = web_app_url {
        greeting = greeting.with_reply_markup(play_keyboard(url));
    }
    if let Err(e) = sender.send_message(&greeting).await {
        warn!("failed to deliver /start greeting to chat {chat_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_map::InMemoryChatStore;
    use crate::telegram::{Chat, IncomingMessage, MockMessageSender, User};

    fn start_update(username: Option<&str>, chat_id: i64) -> Update {
        Update {
            update_id: 1,
            message: Some(IncomingMessage {
                message_id: 1,
                text: Some("/start".to_string()),
                chat: Chat { id: chat_id },
                from: Some(User {
                    id: chat_id,
                    username: username.map(str::to_string),
                    first_name: Some("Pat".to_string()),
                }),
            }),
        }
    }

    #[tokio::test]
    async fn start_registers_the_username_and_greets() {
        let chats = InMemoryChatStore::new();
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_message()
            .withf(|m| m.chat_id == 99 && m.text.contains("Pat") && m.reply_markup.is_some())
            .times(1)
            .returning(|_| Ok(()));

        handle_update(
            &sender,
            &chats,
            Some("https://game.example"),
            start_update(Some("Player"), 99),
        )
        .await;

        assert_eq!(chats.resolve("player"), Some(99));
    }

    #[tokio::test]
    async fn start_without_username_still_greets() {
        let chats = InMemoryChatStore::new();
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_message()
            .times(1)
            .returning(|_| Ok(()));

        handle_update(&sender, &chats, None, start_update(None, 7)).await;

        assert_eq!(chats.resolve(""), None);
    }

    #[tokio::test]
    async fn non_command_messages_are_ignored() {
        let chats = InMemoryChatStore::new();
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().times(0);

        let mut update = start_update(Some("player"), 5);
        if let Some(message) = update.message.as_mut() {
            message.text = Some("hello".to_string());
        }
        handle_update(&sender, &chats, None, update).await;

        assert_eq!(chats.resolve("player"), None);
    }
}
