use anyhow::Result;
use chronicle_types::{Emoji, GuildMember, Message, Reaction, Snowflake};
use tracing::debug;

use crate::Database;

/// The write side of the mirror, one operation per update kind.
///
/// Every operation is idempotent and synchronous: it has either been applied
/// or returned an error by the time it returns. Deletes of rows that do not
/// exist succeed.
pub trait MirrorStore: Send + Sync {
    fn add_message(&self, message: &Message) -> Result<()>;

    fn delete_message(&self, id: &Snowflake) -> Result<()>;

    fn add_reaction(&self, reaction: &Reaction) -> Result<()>;

    fn delete_reaction(
        &self,
        message_id: &Snowflake,
        author_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<()>;

    fn add_member(&self, member: &GuildMember) -> Result<()>;

    fn update_member(&self, member: &GuildMember) -> Result<()>;

    fn delete_member(&self, user_id: &Snowflake) -> Result<()>;
}

impl MirrorStore for Database {
    fn add_message(&self, message: &Message) -> Result<()> {
        self.upsert_message(message)
    }

    fn delete_message(&self, id: &Snowflake) -> Result<()> {
        if !self.remove_message(id)? {
            debug!(message_id = %id, "Delete for unknown message, nothing to do");
        }
        Ok(())
    }

    fn add_reaction(&self, reaction: &Reaction) -> Result<()> {
        self.upsert_reaction(reaction)
    }

    fn delete_reaction(
        &self,
        message_id: &Snowflake,
        author_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<()> {
        if !self.remove_reaction(message_id, author_id, emoji)? {
            debug!(message_id = %message_id, author_id = %author_id, emoji = %emoji, "Delete for unknown reaction, nothing to do");
        }
        Ok(())
    }

    fn add_member(&self, member: &GuildMember) -> Result<()> {
        self.upsert_member(member)
    }

    fn update_member(&self, member: &GuildMember) -> Result<()> {
        self.upsert_member(member)
    }

    fn delete_member(&self, user_id: &Snowflake) -> Result<()> {
        if !self.remove_member(user_id)? {
            debug!(user_id = %user_id, "Delete for unknown member, nothing to do");
        }
        Ok(())
    }
}
