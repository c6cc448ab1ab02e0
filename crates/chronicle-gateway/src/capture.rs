use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use chronicle_queue::{QueueResult, UpdateQueue};
use chronicle_types::{GatewayEvent, Snowflake, Update};

/// Which events are worth mirroring: channel-scoped events from the listed
/// channels, and member events from the one mirrored guild.
#[derive(Debug, Clone)]
pub struct AllowList {
    guild_id: Snowflake,
    channels: HashSet<Snowflake>,
}

impl AllowList {
    pub fn new(guild_id: Snowflake, channels: impl IntoIterator<Item = Snowflake>) -> Self {
        Self {
            guild_id,
            channels: channels.into_iter().collect(),
        }
    }

    pub fn guild_id(&self) -> &Snowflake {
        &self.guild_id
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn admits(&self, event: &GatewayEvent) -> bool {
        match event.channel_id() {
            Some(channel_id) => self.channels.contains(channel_id),
            None => event.guild_id() == Some(&self.guild_id),
        }
    }
}

/// Map a platform event onto the update that mirrors it.
pub fn to_update(event: GatewayEvent) -> Update {
    match event {
        GatewayEvent::MessageCreate { message, .. } => Update::AddMessage(message),
        GatewayEvent::MessageDelete { id, .. } => Update::DeleteMessage { id },
        GatewayEvent::ReactionAdd { reaction, .. } => Update::AddReaction(reaction),
        GatewayEvent::ReactionRemove {
            message_id,
            user_id,
            emoji,
            ..
        } => Update::DeleteReaction {
            message_id,
            author_id: user_id,
            emoji,
        },
        GatewayEvent::GuildMemberAdd { member, .. } => Update::AddMember(member),
        GatewayEvent::GuildMemberRemove { user_id, .. } => Update::DeleteMember { user_id },
        GatewayEvent::GuildMemberUpdate { member, .. } => Update::UpdateMember(member),
    }
}

/// Counters for one capture run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub accepted: usize,
    pub filtered: usize,
    pub failed: usize,
}

/// Producer side of the pipeline: filters inbound events and appends the
/// accepted ones to the update queue. Never touches the mirror store.
pub struct Capture {
    allow: AllowList,
    queue: Arc<UpdateQueue>,
}

impl Capture {
    pub fn new(allow: AllowList, queue: Arc<UpdateQueue>) -> Self {
        Self { allow, queue }
    }

    /// Queue the event if the allow-list admits it. Returns the queue entry id,
    /// or `None` when the event was filtered out.
    pub async fn handle(&self, event: GatewayEvent) -> QueueResult<Option<Uuid>> {
        if !self.allow.admits(&event) {
            debug!(
                channel_id = ?event.channel_id(),
                guild_id = ?event.guild_id(),
                "Ignoring event outside allow-list"
            );
            return Ok(None);
        }

        let update = to_update(event);
        let kind = update.kind();
        let key = update.key();

        match self.queue.append(update).await {
            Ok(id) => {
                debug!(update_id = %id, kind = %kind, key = %key, "Queued update");
                Ok(Some(id))
            }
            Err(e) => {
                error!(kind = %kind, key = %key, error = %e, "Failed to queue update");
                Err(e)
            }
        }
    }

    /// Consume `events` until the stream ends or `shutdown` fires.
    pub async fn run<S>(&self, events: S, shutdown: CancellationToken) -> CaptureStats
    where
        S: Stream<Item = GatewayEvent>,
    {
        let mut stats = CaptureStats::default();
        futures_util::pin_mut!(events);

        info!(
            guild_id = %self.allow.guild_id(),
            channels = self.allow.channel_count(),
            "Capture started"
        );

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = events.next() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            match self.handle(event).await {
                Ok(Some(_)) => stats.accepted += 1,
                Ok(None) => stats.filtered += 1,
                // already logged with kind and key
                Err(_) => stats.failed += 1,
            }
        }

        info!(
            accepted = stats.accepted,
            filtered = stats.filtered,
            failed = stats.failed,
            "Capture stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::{Emoji, GuildMember, Message, User};

    fn allow() -> AllowList {
        AllowList::new("1".into(), [Snowflake::from("10"), Snowflake::from("11")])
    }

    fn message_in(channel: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            guild_id: Some("1".into()),
            message: Message {
                id: "500".into(),
                channel_id: channel.into(),
                author_id: "7".into(),
                non_user_author: false,
                timestamp_ms: 0,
                content: "hello".into(),
                reaction_emoji: vec![],
                mentions: vec![],
            },
        }
    }

    fn member_in(guild: &str) -> GatewayEvent {
        GatewayEvent::GuildMemberAdd {
            guild_id: guild.into(),
            member: GuildMember {
                user: User {
                    id: "42".into(),
                    username: "ada".into(),
                    discriminator: "0001".into(),
                    bot: false,
                },
                nick: None,
                roles: vec![],
            },
        }
    }

    #[test]
    fn allow_list_scopes_by_channel_and_guild() {
        let allow = allow();
        assert!(allow.admits(&message_in("10")));
        assert!(!allow.admits(&message_in("99")));
        assert!(allow.admits(&member_in("1")));
        assert!(!allow.admits(&member_in("2")));
    }

    #[test]
    fn reaction_remove_maps_user_to_author() {
        let update = to_update(GatewayEvent::ReactionRemove {
            guild_id: None,
            channel_id: "10".into(),
            message_id: "500".into(),
            user_id: "9".into(),
            emoji: Emoji::builtin("smile"),
        });
        assert_eq!(
            update,
            Update::DeleteReaction {
                message_id: "500".into(),
                author_id: "9".into(),
                emoji: Emoji::builtin("smile"),
            }
        );
    }

    #[tokio::test]
    async fn filtered_events_never_reach_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(UpdateQueue::open(dir.path().join("queue.json")).await.unwrap());
        let capture = Capture::new(allow(), queue.clone());

        assert!(capture.handle(message_in("99")).await.unwrap().is_none());
        assert!(capture.handle(member_in("2")).await.unwrap().is_none());
        assert!(queue.is_empty().await);

        let id = capture.handle(message_in("10")).await.unwrap().unwrap();
        let pending = queue.snapshot_pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].update.key(), "message:500");
    }

    #[tokio::test]
    async fn run_counts_accepted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(UpdateQueue::open(dir.path().join("queue.json")).await.unwrap());
        let capture = Capture::new(allow(), queue.clone());

        let events = futures_util::stream::iter(vec![
            message_in("10"),
            message_in("99"),
            member_in("1"),
        ]);
        let stats = capture.run(events, CancellationToken::new()).await;

        assert_eq!(
            stats,
            CaptureStats {
                accepted: 2,
                filtered: 1,
                failed: 0
            }
        );
        assert_eq!(queue.len().await, 2);
    }
}
