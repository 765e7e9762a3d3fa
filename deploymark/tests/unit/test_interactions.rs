//! Slack interaction parsing tests

use serde_json::json;

use deploymark::slack::interactions::{
    event_to_buttonpress, get_slack_blocks_for_deployment, ButtonAction, ROLLBACK_BLOCK_ID,
};
use slack_models::{Block, BlockElement};

fn real_rollback_press() -> serde_json::Value {
    json!({
        "type": "block_actions",
        "team": {"id": "T0289TLJY", "domain": "yelp"},
        "user": {"id": "UA6JBNA0Z", "username": "kwa", "team_id": "T0289TLJY"},
        "api_app_id": "AAJ7PL9ST",
        "container": {
            "type": "message",
            "message_ts": "1551306063.241500",
            "channel_id": "CA05GTDB9",
            "is_ephemeral": false,
            "thread_ts": "1551306063.241500"
        },
        "trigger_id": "562162233904.2281938644.c15af7fa5b7e10836c6db7ece2f53eab",
        "channel": {"id": "CA05GTDB9", "name": "paasta"},
        "response_url": "https://hooks.slack.com/actions/T0289TLJY/562866820372/0lRlD5JFQlLPPvqrelCpJlF9",
        "actions": [{
            "action_id": "cLjFK",
            "block_id": "rollback_block1",
            "text": {"type": "plain_text", "text": "Roll Back", "emoji": true},
            "value": "rollback",
            "type": "button",
            "action_ts": "1551306127.199355"
        }]
    })
}

#[test]
fn test_real_rollback_press() {
    let press = event_to_buttonpress(&real_rollback_press()).unwrap();
    assert_eq!(press.username, "kwa");
    assert_eq!(press.action, ButtonAction::Rollback);
    assert_eq!(press.channel_id, "CA05GTDB9");
    assert_eq!(press.message_ts, "1551306063.241500");
    assert_eq!(press.thread_ts.as_deref(), Some("1551306063.241500"));
}

#[test]
fn test_press_without_actions_is_rejected() {
    let mut event = real_rollback_press();
    event["actions"] = json!([]);
    assert!(event_to_buttonpress(&event).is_err());
}

#[test]
fn test_press_without_user_is_rejected() {
    let mut event = real_rollback_press();
    event.as_object_mut().unwrap().remove("user");
    assert!(event_to_buttonpress(&event).is_err());
}

#[test]
fn test_deployment_blocks_have_both_buttons() {
    let blocks = get_slack_blocks_for_deployment("*web* - Marked *abc* for deployment");
    assert_eq!(blocks.len(), 2);

    match &blocks[1] {
        Block::Actions { block_id, elements } => {
            assert_eq!(block_id.as_deref(), Some(ROLLBACK_BLOCK_ID));
            let values: Vec<&str> = elements
                .iter()
                .map(|element| match element {
                    BlockElement::Button { value, .. } => value.as_str(),
                })
                .collect();
            assert_eq!(values, vec!["rollback", "continue"]);
        }
        other => panic!("expected actions block, got {:?}", other),
    }
}
