//! Database row types. These map directly to SQLite rows and are converted
//! into `chronicle-types` models on the way out.

use anyhow::Result;
use chronicle_types::{Emoji, GuildMember, Mention, Message, Reaction, User};

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub non_user_author: bool,
    pub timestamp_ms: i64,
    pub content: String,
}

impl MessageRow {
    pub fn into_message(self, mentions: Vec<MentionRow>, emoji: Vec<String>) -> Result<Message> {
        let reaction_emoji = emoji
            .iter()
            .map(|r| Emoji::from_reference(r))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Message {
            id: self.id.into(),
            channel_id: self.channel_id.into(),
            author_id: self.author_id.into(),
            non_user_author: self.non_user_author,
            timestamp_ms: self.timestamp_ms,
            content: self.content,
            reaction_emoji,
            mentions: mentions
                .into_iter()
                .map(|m| Mention {
                    user_id: m.user_id.into(),
                    position: m.position,
                })
                .collect(),
        })
    }
}

pub struct MentionRow {
    pub user_id: String,
    pub position: i64,
}

pub struct ReactionRow {
    pub channel_id: String,
    pub message_id: String,
    pub author_id: String,
    pub emoji: String,
}

impl ReactionRow {
    pub fn into_reaction(self) -> Result<Reaction> {
        Ok(Reaction {
            channel_id: self.channel_id.into(),
            message_id: self.message_id.into(),
            author_id: self.author_id.into(),
            emoji: Emoji::from_reference(&self.emoji)?,
        })
    }
}

pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub discriminator: String,
    pub bot: bool,
    pub nickname: Option<String>,
}

impl MemberRow {
    pub fn into_member(self, roles: Vec<String>) -> GuildMember {
        GuildMember {
            user: User {
                id: self.user_id.into(),
                username: self.username,
                discriminator: self.discriminator,
                bot: self.bot,
            },
            nick: self.nickname,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}
