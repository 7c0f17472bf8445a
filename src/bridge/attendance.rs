//! Raid attendance posting.
//!
//! Finished raid dumps are synced to the raid manager's attendance API and
//! optionally announced on the chat gateway.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::common::{Event, RaidMember, TransportId};
use crate::config::types::RaidConfig;

use super::channels::HubHandle;
use super::notify::{raid_captured_message, raid_synced_message};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub character_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_number: Option<u32>,
    pub status: &'static str,
}

impl From<&RaidMember> for AttendanceRecord {
    fn from(member: &RaidMember) -> Self {
        Self {
            character_name: member.name.clone(),
            level: Some(member.level).filter(|l| *l > 0),
            class: member.class.map(|c| c.token()),
            group_number: Some(member.group_number).filter(|g| *g > 0),
            status: "PRESENT",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePayload {
    pub note: String,
    pub event_type: &'static str,
    pub records: Vec<AttendanceRecord>,
}

impl AttendancePayload {
    pub fn new(members: &[RaidMember]) -> Self {
        Self {
            note: format!(
                "Auto-synced from talkbridge at {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            event_type: "LOG",
            records: members.iter().map(AttendanceRecord::from).collect(),
        }
    }
}

/// HTTP client for the attendance API.
pub struct AttendancePoster {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl AttendancePoster {
    pub fn new(config: &RaidConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: attendance_url(&config.api_url, &config.raid_event_id),
            token: config.api_token.clone(),
        })
    }

    pub async fn post(&self, members: &[RaidMember]) -> Result<()> {
        info!("Posting attendance for {} member(s) to {}", members.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::COOKIE, format!("cwraid_token={}", self.token))
            .json(&AttendancePayload::new(members))
            .send()
            .await
            .context("attendance request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("attendance POST failed (status {}): {}", status.as_u16(), body);
        }
        info!("Attendance posted successfully (status {})", status.as_u16());
        Ok(())
    }
}

fn attendance_url(api_url: &str, raid_event_id: &str) -> String {
    format!(
        "{}/api/attendance/raid/{}",
        api_url.trim_end_matches('/'),
        raid_event_id
    )
}

/// Consume finished raid dumps until shutdown.
pub async fn run_raid_results(
    config: RaidConfig,
    mut results: mpsc::UnboundedReceiver<Vec<RaidMember>>,
    hub: HubHandle,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let poster = if config.auto_post {
        match AttendancePoster::new(&config) {
            Ok(poster) => Some(poster),
            Err(e) => {
                error!("Failed to build attendance client: {:#}", e);
                None
            }
        }
    } else {
        None
    };
    let notify_channel = Some(config.discord_channel_id.clone())
        .filter(|c| config.notify_discord && !c.is_empty());

    loop {
        tokio::select! {
            members = results.recv() => {
                let Some(members) = members else { break };

                let text = match &poster {
                    Some(poster) => match poster.post(&members).await {
                        Ok(()) => Some(raid_synced_message(&members, Utc::now())),
                        Err(e) => {
                            error!("Failed to sync raid attendance: {:#}", e);
                            None
                        }
                    },
                    None => Some(raid_captured_message(&members, Utc::now())),
                };

                if let (Some(text), Some(channel)) = (text, &notify_channel) {
                    hub.direct(
                        TransportId::Discord,
                        Event::new(TransportId::Telnet, "", channel.as_str(), text),
                    );
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channels::{ChannelBundle, HubInput};
    use crate::common::CharacterClass;

    #[test]
    fn test_attendance_url_trims_slash() {
        assert_eq!(
            attendance_url("https://raids.example/", "42"),
            "https://raids.example/api/attendance/raid/42"
        );
    }

    #[test]
    fn test_payload_serialization() {
        let members = vec![
            RaidMember {
                name: "A".to_string(),
                level: 60,
                class: Some(CharacterClass::Warrior),
                group_number: 1,
            },
            RaidMember::named("B"),
        ];
        let payload = AttendancePayload::new(&members);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["eventType"], "LOG");
        assert!(json["note"].as_str().unwrap().starts_with("Auto-synced from talkbridge at "));
        assert_eq!(
            json["records"][0],
            serde_json::json!({
                "characterName": "A",
                "level": 60,
                "class": "WARRIOR",
                "groupNumber": 1,
                "status": "PRESENT"
            })
        );
        assert_eq!(
            json["records"][1],
            serde_json::json!({ "characterName": "B", "status": "PRESENT" })
        );
    }

    #[tokio::test]
    async fn test_captured_notice_without_auto_post() {
        let mut bundle = ChannelBundle::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RaidConfig {
            enabled: true,
            notify_discord: true,
            discord_channel_id: "555".to_string(),
            ..Default::default()
        };

        let task = tokio::spawn(run_raid_results(
            config,
            rx,
            bundle.hub.clone(),
            bundle.control.shutdown_rx.clone(),
        ));
        tx.send(vec![RaidMember::named("A")]).unwrap();

        let Some(HubInput::Direct { target, event }) = bundle.hub_rx.recv().await else {
            panic!("expected a direct delivery");
        };
        assert_eq!(target, TransportId::Discord);
        assert_eq!(event.channel_ref, "555");
        assert!(event.message.contains("Raid Dump Captured"));

        drop(tx);
        task.await.unwrap();
    }
}
