//! Telegram adapter (teloxide).
//!
//! Implements the `raindrop-core` ports over the Telegram Bot API: identity
//! extraction from incoming messages and a per-request reply sink.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use raindrop_core::{
    errors::Error,
    formatting::notice_to_html_chunks,
    messaging::{
        port::NotificationSink,
        types::{Document, Notice},
    },
    Result,
};

const DEFAULT_SAFE_LIMIT: usize = 4000;

/// Replies to the chat (and forum topic) a command came from.
#[derive(Clone)]
pub struct TelegramReply {
    bot: Bot,
    chat_id: ChatId,
    thread_id: Option<i32>,
    limit: usize,
}

impl TelegramReply {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            thread_id: None,
            limit: DEFAULT_SAFE_LIMIT,
        }
    }

    /// Reply inside a forum topic instead of the chat's General topic.
    pub fn in_thread(mut self, thread_id: Option<i32>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(200);
        self
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn thread_id(&self) -> Option<i32> {
        self.thread_id
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(chat_id = self.chat_id.0, "telegram flood control, retrying");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramReply {
    async fn notify(&self, notice: &Notice) -> Result<()> {
        for chunk in notice_to_html_chunks(notice, self.limit) {
            self.with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(self.chat_id, chunk.clone())
                    .parse_mode(ParseMode::Html);
                if let Some(thread_id) = self.thread_id {
                    req = req.message_thread_id(thread_id);
                }
                req
            })
            .await?;
        }
        Ok(())
    }

    async fn send_document(&self, document: &Document) -> Result<()> {
        self.with_retry(|| {
            let file = InputFile::memory(document.contents.clone())
                .file_name(document.file_name.clone());
            let mut req = self.bot.send_document(self.chat_id, file);
            if let Some(thread_id) = self.thread_id {
                req = req.message_thread_id(thread_id);
            }
            req
        })
        .await?;
        Ok(())
    }
}
