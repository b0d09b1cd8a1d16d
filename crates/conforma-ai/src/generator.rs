//! Ollama-compatible text generation client.
//!
//! `complete` posts to `/api/generate` (non-streaming, per-request timeout);
//! `stream_chat` posts to `/api/chat` with `stream: true` and relays the
//! NDJSON fragments. Request initiation goes through the bounded retry
//! policy; a failure mid-stream surfaces as one `Err` fragment and ends the
//! stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use conforma_core::{BackendError, ChatRole, ChatTurn, FragmentStream, Settings, TextGenerator};

use crate::retry::with_retries;
use crate::AiError;

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// One parsed fragment of a streaming chat response.
#[derive(Debug)]
struct ChatDelta {
    content: String,
    done: bool,
}

impl OllamaGenerator {
    pub fn new(settings: &Settings) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        info!(
            url = %settings.generator_url,
            model = %settings.generator_model,
            "generator client ready"
        );
        Ok(Self {
            client,
            base_url: settings.generator_url.trim_end_matches('/').to_string(),
            model: settings.generator_model.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_retries: settings.max_retries,
        })
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AiError::Response(format!("completion body: {e}")))?;
        Ok(parsed.response)
    }

    async fn open_chat_stream(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<reqwest::Response, AiError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        for turn in history {
            messages.push(WireMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: message,
        });

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        with_retries(self.max_retries, "complete", || self.complete_once(prompt))
            .await
            .map_err(|e| BackendError::new(e.to_string()))
    }

    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<FragmentStream, BackendError> {
        let resp = with_retries(self.max_retries, "stream_chat", || {
            self.open_chat_stream(system_prompt, history, message)
        })
        .await
        .map_err(|e| BackendError::new(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<Result<String, BackendError>>(16);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buf = String::new();

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::new(format!("stream read failed: {e}"))))
                            .await;
                        return;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    match parse_chat_line(&line) {
                        Ok(delta) => {
                            if !delta.content.is_empty()
                                && tx.send(Ok(delta.content)).await.is_err()
                            {
                                // Consumer stopped pulling.
                                return;
                            }
                            if delta.done {
                                debug!("chat stream complete");
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // Stream ended without a done marker; flush any trailing line.
            let line = buf.trim();
            if !line.is_empty() {
                if let Ok(delta) = parse_chat_line(line) {
                    if !delta.content.is_empty() {
                        let _ = tx.send(Ok(delta.content)).await;
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

fn parse_chat_line(line: &str) -> Result<ChatDelta, BackendError> {
    let parsed: ChatLine = serde_json::from_str(line)
        .map_err(|e| BackendError::new(format!("unparseable stream line: {e}")))?;
    if let Some(error) = parsed.error {
        return Err(BackendError::new(format!("generation failed: {error}")));
    }
    Ok(ChatDelta {
        content: parsed.message.map(|m| m.content).unwrap_or_default(),
        done: parsed.done,
    })
}
