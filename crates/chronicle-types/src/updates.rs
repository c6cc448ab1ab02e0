use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Emoji, GuildMember, Message, Reaction, Snowflake};

/// A unit of pending mirror work. The set of kinds is closed: anything that
/// consumes an `Update` matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Update {
    AddMessage(Message),

    DeleteMessage {
        id: Snowflake,
    },

    AddReaction(Reaction),

    DeleteReaction {
        message_id: Snowflake,
        author_id: Snowflake,
        emoji: Emoji,
    },

    AddMember(GuildMember),

    DeleteMember {
        user_id: Snowflake,
    },

    UpdateMember(GuildMember),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    AddMessage,
    DeleteMessage,
    AddReaction,
    DeleteReaction,
    AddMember,
    DeleteMember,
    UpdateMember,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddMessage => "AddMessage",
            Self::DeleteMessage => "DeleteMessage",
            Self::AddReaction => "AddReaction",
            Self::DeleteReaction => "DeleteReaction",
            Self::AddMember => "AddMember",
            Self::DeleteMember => "DeleteMember",
            Self::UpdateMember => "UpdateMember",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Update {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::AddMessage(_) => UpdateKind::AddMessage,
            Self::DeleteMessage { .. } => UpdateKind::DeleteMessage,
            Self::AddReaction(_) => UpdateKind::AddReaction,
            Self::DeleteReaction { .. } => UpdateKind::DeleteReaction,
            Self::AddMember(_) => UpdateKind::AddMember,
            Self::DeleteMember { .. } => UpdateKind::DeleteMember,
            Self::UpdateMember(_) => UpdateKind::UpdateMember,
        }
    }

    /// Natural key of the entity this update touches, for logs and the
    /// queue status listing. Enough to find the row and replay by hand.
    pub fn key(&self) -> String {
        match self {
            Self::AddMessage(m) => format!("message:{}", m.id),
            Self::DeleteMessage { id } => format!("message:{}", id),
            Self::AddReaction(r) => reaction_key(&r.message_id, &r.author_id, &r.emoji),
            Self::DeleteReaction {
                message_id,
                author_id,
                emoji,
            } => reaction_key(message_id, author_id, emoji),
            Self::AddMember(m) | Self::UpdateMember(m) => format!("member:{}", m.user.id),
            Self::DeleteMember { user_id } => format!("member:{}", user_id),
        }
    }
}

fn reaction_key(message_id: &Snowflake, author_id: &Snowflake, emoji: &Emoji) -> String {
    format!("reaction:{}/{}/{}", message_id, author_id, emoji.reference())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let update = Update::DeleteMember {
            user_id: "42".into(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "DeleteMember");
        assert_eq!(json["payload"]["user_id"], "42");

        let back: Update = serde_json::from_value(json).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn unknown_kind_fails_to_decode() {
        let raw = r#"{"type":"PinMessage","payload":{"id":"1"}}"#;
        assert!(serde_json::from_str::<Update>(raw).is_err());
    }

    #[test]
    fn keys_identify_entities() {
        let delete = Update::DeleteReaction {
            message_id: "10".into(),
            author_id: "20".into(),
            emoji: Emoji::custom("pepe", "30"),
        };
        assert_eq!(delete.kind(), UpdateKind::DeleteReaction);
        assert_eq!(delete.key(), "reaction:10/20/pepe:30");

        let msg = Update::DeleteMessage { id: "10".into() };
        assert_eq!(msg.key(), "message:10");
        assert_eq!(msg.kind().to_string(), "DeleteMessage");
    }
}
