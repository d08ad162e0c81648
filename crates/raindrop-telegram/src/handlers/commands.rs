use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatMemberStatus, Message},
};

use raindrop_core::{
    command,
    domain::{Identity, RequestContext, Snowflake},
};

use crate::{router::AppState, TelegramReply};

/// Identity fields Telegram can supply for one message.
///
/// Chats double as groups; forum topics are distinct locations inside them.
/// Roles are the sender's membership status, scoped to the chat so that
/// "administrator" in one group never matches another.
#[derive(Clone, Debug)]
struct TelegramContext {
    user_id: u64,
    chat_id: i64,
    thread_id: Option<i32>,
    member_status: Option<ChatMemberStatus>,
}

impl RequestContext for TelegramContext {
    fn actor_id(&self) -> Snowflake {
        Snowflake::new(self.user_id.to_string())
    }

    fn location_id(&self) -> Snowflake {
        match self.thread_id {
            Some(thread) => Snowflake::new(format!("{}/{thread}", self.chat_id)),
            None => Snowflake::new(self.chat_id.to_string()),
        }
    }

    fn role_ids(&self) -> Vec<Snowflake> {
        self.member_status
            .map(|s| vec![Snowflake::new(format!("{}:{}", self.chat_id, status_name(s)))])
            .unwrap_or_default()
    }

    fn group_id(&self) -> Snowflake {
        Snowflake::new(self.chat_id.to_string())
    }
}

impl TelegramContext {
    /// Reply target: the same chat, and the same forum topic.
    fn reply(&self, bot: Bot, limit: usize) -> TelegramReply {
        TelegramReply::new(bot, ChatId(self.chat_id))
            .in_thread(self.thread_id)
            .with_limit(limit)
    }
}

fn status_name(status: ChatMemberStatus) -> &'static str {
    match status {
        ChatMemberStatus::Owner => "owner",
        ChatMemberStatus::Administrator => "administrator",
        ChatMemberStatus::Member => "member",
        ChatMemberStatus::Restricted => "restricted",
        ChatMemberStatus::Left => "left",
        ChatMemberStatus::Banned => "banned",
    }
}

async fn extract_context(bot: &Bot, msg: &Message) -> Option<TelegramContext> {
    let user = msg.from()?;

    // Private chats have no membership roles.
    let member_status = if msg.chat.is_group() || msg.chat.is_supergroup() {
        match bot.get_chat_member(msg.chat.id, user.id).await {
            Ok(member) => Some(member.status()),
            Err(e) => {
                tracing::warn!(chat_id = msg.chat.id.0, error = %e, "get_chat_member failed");
                None
            }
        }
    } else {
        None
    };

    Some(TelegramContext {
        user_id: user.id.0,
        chat_id: msg.chat.id.0,
        thread_id: msg.thread_id,
        member_status,
    })
}

/// Commands without a mention, or mentioning us, are ours. If our own
/// username is unknown every mention is accepted.
fn addressed_to_us(text: &str, bot_username: Option<&str>) -> bool {
    match (command::addressee(text), bot_username) {
        (Some(to), Some(me)) => to.eq_ignore_ascii_case(me),
        _ => true,
    }
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !addressed_to_us(text, state.bot_username.as_deref()) {
        return Ok(());
    }
    // Other bots' commands are dropped before any API call is made.
    if matches!(command::parse(text), Ok(None)) {
        return Ok(());
    }
    let Some(ctx) = extract_context(&bot, &msg).await else {
        return Ok(());
    };

    let identity = Identity::from_context(&ctx);
    let reply = ctx.reply(bot, state.cfg.telegram_safe_limit);

    match state.service.handle_text(text, &identity, &reply).await {
        Ok(_) => {}
        Err(e) if e.is_rejection() => {
            tracing::debug!(actor = %identity.actor_id, reason = e.kind(), "command rejected");
        }
        Err(e) => {
            tracing::warn!(actor = %identity.actor_id, error = %e, "command failed");
        }
    }

    Ok(())
}
