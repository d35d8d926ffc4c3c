//! Telegram Bot API over long polling.

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramBot {
    token: String,
    client: reqwest::Client,
    poll_timeout_secs: u64,
    offset: i64,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, poll_timeout_secs: u64) -> Result<Self> {
        // The HTTP timeout has to outlive the long poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            token: token.into(),
            client,
            poll_timeout_secs,
            offset: 0,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Telegram {} failed", method))?;
        parse_response(method, response).await
    }

    /// Fetch new updates and advance the offset past them.
    pub async fn get_updates(&mut self) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                serde_json::json!({
                    "offset": self.offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        if let Some(last) = updates.last() {
            self.offset = last.update_id + 1;
        }
        Ok(updates)
    }

    /// `parse_mode` is left out of the request when `None`, so the text is
    /// delivered verbatim.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<Message> {
        let mut body = text_body(chat_id, text, parse_mode);
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", body).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<()> {
        let mut body = text_body(chat_id, text, parse_mode);
        body["message_id"] = message_id.into();
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    /// Upload PNG bytes as a photo.
    pub async fn send_photo(&self, chat_id: i64, png: Vec<u8>, caption: &str) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(png)
            .file_name("stats.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.api_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .context("Telegram sendPhoto failed")?;
        let _: serde_json::Value = parse_response("sendPhoto", response).await?;
        Ok(())
    }
}

async fn parse_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let body: ApiResponse<T> = response
        .json()
        .await
        .with_context(|| format!("Invalid Telegram {} response", method))?;
    if !body.ok {
        bail!(
            "Telegram {} error: {}",
            method,
            body.description.unwrap_or_default()
        );
    }
    body.result
        .ok_or_else(|| anyhow::anyhow!("Telegram {} returned no result", method))
}

fn text_body(chat_id: i64, text: &str, parse_mode: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if let Some(mode) = parse_mode {
        body["parse_mode"] = mode.into();
    }
    body
}

/// Reply keyboard with the stats button.
pub fn stats_keyboard(button: &str) -> serde_json::Value {
    serde_json::json!({
        "keyboard": [[{ "text": button }]],
        "resize_keyboard": true,
    })
}
