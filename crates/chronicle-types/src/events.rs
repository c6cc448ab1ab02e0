use serde::{Deserialize, Serialize};

use crate::models::{Emoji, GuildMember, Message, Reaction, Snowflake};

/// Normalized events from the live platform feed. The connector that talks
/// to the platform is responsible for producing these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A message was posted
    MessageCreate {
        guild_id: Option<Snowflake>,
        message: Message,
    },

    /// A message was deleted
    MessageDelete {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        id: Snowflake,
    },

    /// A user reacted to a message
    ReactionAdd {
        guild_id: Option<Snowflake>,
        reaction: Reaction,
    },

    /// A user removed their reaction
    ReactionRemove {
        guild_id: Option<Snowflake>,
        channel_id: Snowflake,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: Emoji,
    },

    /// A user joined the guild
    GuildMemberAdd {
        guild_id: Snowflake,
        member: GuildMember,
    },

    /// A user left or was removed from the guild
    GuildMemberRemove {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    /// Nickname or roles changed
    GuildMemberUpdate {
        guild_id: Snowflake,
        member: GuildMember,
    },
}

impl GatewayEvent {
    /// Returns the channel this event happened in, for channel-scoped events.
    /// Member events return `None`.
    pub fn channel_id(&self) -> Option<&Snowflake> {
        match self {
            Self::MessageCreate { message, .. } => Some(&message.channel_id),
            Self::MessageDelete { channel_id, .. } => Some(channel_id),
            Self::ReactionAdd { reaction, .. } => Some(&reaction.channel_id),
            Self::ReactionRemove { channel_id, .. } => Some(channel_id),
            Self::GuildMemberAdd { .. }
            | Self::GuildMemberRemove { .. }
            | Self::GuildMemberUpdate { .. } => None,
        }
    }

    pub fn guild_id(&self) -> Option<&Snowflake> {
        match self {
            Self::MessageCreate { guild_id, .. }
            | Self::MessageDelete { guild_id, .. }
            | Self::ReactionAdd { guild_id, .. }
            | Self::ReactionRemove { guild_id, .. } => guild_id.as_ref(),
            Self::GuildMemberAdd { guild_id, .. }
            | Self::GuildMemberRemove { guild_id, .. }
            | Self::GuildMemberUpdate { guild_id, .. } => Some(guild_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_json() {
        let raw = r#"{
            "type": "ReactionRemove",
            "data": {
                "guild_id": "1",
                "channel_id": "2",
                "message_id": "3",
                "user_id": "4",
                "emoji": { "id": null, "name": "smile" }
            }
        }"#;
        let event: GatewayEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.channel_id().map(Snowflake::as_str), Some("2"));
        assert_eq!(event.guild_id().map(Snowflake::as_str), Some("1"));
    }

    #[test]
    fn member_events_have_no_channel() {
        let event = GatewayEvent::GuildMemberRemove {
            guild_id: "1".into(),
            user_id: "4".into(),
        };
        assert!(event.channel_id().is_none());
    }
}
