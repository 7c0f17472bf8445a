//! Discord gateway transport.
//!
//! Wraps a serenity client. Guild messages are forwarded to the hub as
//! events; outbound events are posted to the channel named by their
//! channel reference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ActivityData, ChannelId, ShardManager};
use serenity::http::{Http, HttpBuilder};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bridge::HubHandle;
use crate::common::error::{TransportError, TransportResult};
use crate::common::{Event, TransportId};
use crate::config::types::DiscordConfig;
use crate::presence::PresenceStore;

use super::Transport;

const WHO_COMMAND: &str = "!who";

/// Connection state shared between the transport and its event handler.
#[derive(Default)]
struct GatewayState {
    ready: AtomicBool,
    context: Mutex<Option<Context>>,
}

struct GatewayEvents {
    hub: HubHandle,
    store: Arc<PresenceStore>,
    server_id: Option<u64>,
    state: Arc<GatewayState>,
}

#[serenity::async_trait]
impl EventHandler for GatewayEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        *self.state.context.lock() = Some(context);
        self.state.ready.store(true, Ordering::SeqCst);
    }

    async fn message(&self, context: Context, message: Message) {
        if message.author.bot || message.author.id == context.cache.current_user().id {
            return;
        }
        let Some(guild_id) = message.guild_id else {
            return;
        };
        if self.server_id.is_some_and(|id| id != guild_id.get()) {
            return;
        }

        let content = message.content.trim();
        if content.is_empty() {
            return;
        }

        if let Some(filter) = parse_who_command(content) {
            let summary = self.store.online_summary(filter);
            if let Err(e) = message.channel_id.say(&context.http, summary).await {
                warn!(transport = "discord", "Failed to answer who command: {}", e);
            }
            return;
        }

        let author = message
            .member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .unwrap_or_else(|| message.author.name.clone());

        self.hub.publish(
            Event::new(
                TransportId::Discord,
                author,
                message.channel_id.get().to_string(),
                content,
            )
            .with_extra(guild_id.get().to_string()),
        );
    }
}

/// Parse `!who [filter]`; `all` and a bare `!who` mean no filter.
fn parse_who_command(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(WHO_COMMAND)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let filter = rest.trim();
    if filter.eq_ignore_ascii_case("all") {
        Some("")
    } else {
        Some(filter)
    }
}

fn parse_channel_id(channel_ref: &str) -> TransportResult<ChannelId> {
    channel_ref
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
        .ok_or_else(|| TransportError::SendFailed {
            transport: TransportId::Discord.to_string(),
            message: format!("'{}' is not a channel ID", channel_ref),
        })
}

async fn build_client(token: &str, events: GatewayEvents) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS;

    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// A started gateway session.
struct Session {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<()>,
}

pub struct DiscordTransport {
    config: DiscordConfig,
    hub: HubHandle,
    store: Arc<PresenceStore>,
    state: Arc<GatewayState>,
    session: Mutex<Option<Session>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordTransport {
    pub fn new(
        config: DiscordConfig,
        hub: HubHandle,
        store: Arc<PresenceStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            hub,
            store,
            state: Arc::new(GatewayState::default()),
            session: Mutex::new(None),
            shutdown_rx,
        }
    }

    fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    fn http(&self) -> TransportResult<Arc<Http>> {
        match self.session.lock().as_ref() {
            Some(session) if self.is_connected() => Ok(session.http.clone()),
            _ => Err(TransportError::NotConnected {
                transport: TransportId::Discord.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    fn id(&self) -> TransportId {
        TransportId::Discord
    }

    fn is_connected(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> TransportResult<()> {
        // A session still handshaking counts as in progress.
        if self.is_running() {
            return Ok(());
        }
        info!("Connecting to Discord...");

        let events = GatewayEvents {
            hub: self.hub.clone(),
            store: self.store.clone(),
            server_id: self.config.server_id.trim().parse().ok(),
            state: self.state.clone(),
        };
        let mut client = build_client(&self.config.token, events)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                transport: TransportId::Discord.to_string(),
                message: e.to_string(),
            })?;

        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let manager = shard_manager.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                result = client.start() => match result {
                    Ok(()) => info!("Discord client disconnected normally"),
                    Err(e) => error!("Discord client error: {}", e),
                },
                _ = async {
                    loop {
                        if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                } => {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                }
            }
            state.ready.store(false, Ordering::SeqCst);
            state.context.lock().take();
        });

        *self.session.lock() = Some(Session {
            http,
            shard_manager,
            task,
        });
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.shard_manager.shutdown_all().await;
            if let Err(e) = session.task.await {
                debug!("Discord task ended abnormally: {}", e);
            }
            info!("Discord shutdown complete");
        }
        self.state.ready.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, event: &Event) -> TransportResult<()> {
        let channel = parse_channel_id(&event.channel_ref)?;
        let http = self.http()?;
        channel
            .say(&http, event.message.as_str())
            .await
            .map_err(|e| TransportError::SendFailed {
                transport: TransportId::Discord.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn set_status(&self, status: &str) -> TransportResult<()> {
        let context = self.state.context.lock().clone();
        let Some(context) = context else {
            return Err(TransportError::NotConnected {
                transport: TransportId::Discord.to_string(),
            });
        };
        context.set_activity(Some(ActivityData::custom(status)));
        debug!("Discord status set to '{}'", status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ChannelBundle;

    #[test]
    fn test_parse_who_command() {
        assert_eq!(parse_who_command("!who"), Some(""));
        assert_eq!(parse_who_command("!who all"), Some(""));
        assert_eq!(parse_who_command("!who  qeynos "), Some("qeynos"));
        assert_eq!(parse_who_command("!whoami"), None);
        assert_eq!(parse_who_command("hello"), None);
    }

    #[test]
    fn test_parse_channel_id() {
        assert_eq!(parse_channel_id("1234").unwrap(), ChannelId::new(1234));
        assert!(matches!(
            parse_channel_id("general"),
            Err(TransportError::SendFailed { .. })
        ));
        assert!(parse_channel_id("0").is_err());
    }

    #[tokio::test]
    async fn test_unstarted_transport_rejects_send_and_status() {
        let bundle = ChannelBundle::new();
        let transport = DiscordTransport::new(
            DiscordConfig::default(),
            bundle.hub.clone(),
            Arc::new(PresenceStore::new()),
            bundle.control.shutdown_rx.clone(),
        );

        assert!(!transport.is_connected());
        let event = Event::new(TransportId::Telnet, "", "1234", "hello");
        assert!(matches!(
            transport.send(&event).await,
            Err(TransportError::NotConnected { .. })
        ));
        assert!(matches!(
            transport.set_status("EQ: 3 Online").await,
            Err(TransportError::NotConnected { .. })
        ));
        assert!(transport.disconnect().await.is_ok());
    }
}
