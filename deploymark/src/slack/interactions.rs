//! Rollback prompt blocks and button press parsing

use std::fmt;

use serde::Deserialize;
use slack_models::{Block, BlockElement, InteractionPayload, TextObject};

use crate::errors::DeployError;

/// Block id of the rollback prompt's buttons
pub const ROLLBACK_BLOCK_ID: &str = "rollback_block1";

/// Action requested by a button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Rollback,
    Continue,
    Other(String),
}

impl From<&str> for ButtonAction {
    fn from(value: &str) -> Self {
        match value {
            "rollback" => ButtonAction::Rollback,
            "continue" => ButtonAction::Continue,
            other => ButtonAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonAction::Rollback => f.write_str("rollback"),
            ButtonAction::Continue => f.write_str("continue"),
            ButtonAction::Other(other) => f.write_str(other),
        }
    }
}

/// A parsed operator button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub username: String,
    pub action: ButtonAction,
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
}

/// Blocks for a deployment message with rollback and continue buttons.
///
/// The first block carries `message` verbatim.
pub fn get_slack_blocks_for_deployment(message: &str) -> Vec<Block> {
    vec![
        Block::Section {
            block_id: None,
            text: TextObject::mrkdwn(message),
        },
        Block::Actions {
            block_id: Some(ROLLBACK_BLOCK_ID.to_string()),
            elements: vec![
                BlockElement::Button {
                    action_id: None,
                    text: TextObject::plain("Roll Back"),
                    value: "rollback".to_string(),
                    style: Some("danger".to_string()),
                },
                BlockElement::Button {
                    action_id: None,
                    text: TextObject::plain("Continue"),
                    value: "continue".to_string(),
                    style: Some("primary".to_string()),
                },
            ],
        },
    ]
}

/// Parse a `block_actions` interaction payload
pub fn event_to_buttonpress(event: &serde_json::Value) -> Result<ButtonPressEvent, DeployError> {
    let payload = InteractionPayload::deserialize(event)
        .map_err(|e| DeployError::InteractionParse(e.to_string()))?;

    let action = payload
        .actions
        .first()
        .ok_or_else(|| DeployError::InteractionParse("payload has no actions".to_string()))?;

    Ok(ButtonPressEvent {
        username: payload.user.username,
        action: ButtonAction::from(action.value.as_str()),
        channel_id: payload.container.channel_id,
        message_ts: payload.container.message_ts,
        thread_ts: payload.container.thread_ts,
    })
}
