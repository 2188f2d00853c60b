//! Payloads exchanged with the host for non-fetch events.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::NotificationConfig;

/// Tag of the one background-sync registration the worker recognises.
pub const SYNC_TAG: &str = "sync-data";

/// Instructions accepted on the control channel.
///
/// The wire shape is `{ "action": "skipWaiting" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action")]
pub enum ControlMessage {
    #[serde(rename = "skipWaiting")]
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a message; anything that is not a recognised shape yields `None`.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The tag is recognised but synchronization has no implementation yet.
    NotImplemented { tag: String },
    Ignored { tag: String },
}

/// A notification the host should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

impl Notification {
    /// Build the notification for a push, using the default body when the
    /// payload is absent.
    pub fn from_push(config: &NotificationConfig, payload: Option<&str>, date_of_arrival: i64) -> Self {
        Self {
            title: config.title.clone(),
            body: payload.map_or_else(|| config.default_body.clone(), str::to_string),
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData { date_of_arrival, primary_key: 1 },
        }
    }
}

/// What the host should do with its clients after a notification click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Focus { url: String },
    OpenWindow { url: String },
}

impl ClientAction {
    /// Focus an already open client showing `target`, or open a new one.
    pub fn for_target(target: &Url, open_clients: &[Url]) -> Self {
        if open_clients.iter().any(|client| client == target) {
            ClientAction::Focus { url: target.to_string() }
        } else {
            ClientAction::OpenWindow { url: target.to_string() }
        }
    }
}
