//! Server state

use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::slack::interactions::ButtonPressEvent;

/// Server state shared across handlers
pub struct ServerState {
    pub button_presses: mpsc::Sender<ButtonPressEvent>,

    /// Slack app signing secret used to authenticate interactions
    pub signing_secret: SecretString,
}

impl ServerState {
    pub fn new(button_presses: mpsc::Sender<ButtonPressEvent>, signing_secret: SecretString) -> Self {
        Self {
            button_presses,
            signing_secret,
        }
    }
}
