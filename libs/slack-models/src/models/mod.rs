//! API models

use serde::{Deserialize, Serialize};

/// Text object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    PlainText,
    Mrkdwn,
}

/// Block Kit text object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl TextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: TextType::Mrkdwn,
            text: text.into(),
            emoji: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: TextType::PlainText,
            text: text.into(),
            emoji: Some(true),
        }
    }
}

/// Interactive element inside an actions block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Button {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_id: Option<String>,
        text: TextObject,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
}

/// Layout block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
    },
    Actions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<BlockElement>,
    },
}

/// `chat.postMessage` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub channel: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

/// `chat.postMessage` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

/// User who triggered an interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Message container an interaction happened in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionContainer {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub message_ts: String,
    pub channel_id: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub is_ephemeral: Option<bool>,
}

/// A single action from a `block_actions` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionAction {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
    pub value: String,
    #[serde(default)]
    pub action_ts: Option<String>,
}

/// Inbound `block_actions` interaction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub user: InteractionUser,
    pub container: InteractionContainer,
    pub actions: Vec<InteractionAction>,
    #[serde(default)]
    pub response_url: Option<String>,
}
