//! Slack Web API client

use async_trait::async_trait;
use secrecy::SecretString;
use slack_models::{Block, PostMessageRequest, PostMessageResponse};
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::http::client::HttpClient;

/// Result of posting to one channel
pub type PostResult = PostMessageResponse;

/// Message content: fallback text plus optional Block Kit layout
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContent {
    pub text: String,
    pub blocks: Option<Vec<Block>>,
}

impl ChatContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: None,
        }
    }

    pub fn with_blocks(text: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            text: text.into(),
            blocks: Some(blocks),
        }
    }
}

/// Posts messages to chat channels.
///
/// A failure on one channel is reported in its result and does not stop
/// the remaining channels.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    async fn post(&self, channels: &[String], content: &ChatContent) -> Result<Vec<PostResult>, DeployError>;
}

/// Posts through `chat.postMessage`
pub struct SlackClient {
    http: HttpClient,
}

impl SlackClient {
    pub fn new(api_base_url: &str, token: SecretString) -> Result<Self, DeployError> {
        Ok(Self {
            http: HttpClient::with_token(api_base_url, token)?,
        })
    }
}

#[async_trait]
impl ChatPoster for SlackClient {
    async fn post(&self, channels: &[String], content: &ChatContent) -> Result<Vec<PostResult>, DeployError> {
        let mut results = Vec::with_capacity(channels.len());
        for channel in channels {
            let request = PostMessageRequest {
                channel: channel.clone(),
                text: content.text.clone(),
                blocks: content.blocks.clone(),
                thread_ts: None,
            };
            let response: PostMessageResponse =
                match self.http.post(&["chat.postMessage"], &request).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Failed to post to {}: {}", channel, e);
                        PostMessageResponse {
                            ok: false,
                            error: Some(e.to_string()),
                            channel: Some(channel.clone()),
                            ts: None,
                        }
                    }
                };
            if !response.ok {
                warn!(
                    "Slack rejected message to {}: {}",
                    channel,
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(response);
        }
        Ok(results)
    }
}

/// Stand-in used when no Slack token is configured
pub struct LogOnlyPoster;

#[async_trait]
impl ChatPoster for LogOnlyPoster {
    async fn post(&self, channels: &[String], content: &ChatContent) -> Result<Vec<PostResult>, DeployError> {
        debug!("Slack disabled, not posting to {:?}: {}", channels, content.text);
        Ok(Vec::new())
    }
}
