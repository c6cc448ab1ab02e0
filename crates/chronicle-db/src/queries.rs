use crate::models::{MemberRow, MentionRow, MessageRow, ReactionRow};
use crate::Database;
use anyhow::{Context, Result, bail};
use chronicle_types::{Emoji, GuildMember, Message, Reaction, Snowflake};
use rusqlite::Connection;

impl Database {
    // -- Messages --

    /// Insert or overwrite a message. Mentions and captured reaction emoji are
    /// replaced wholesale (one mention per user, each emoji once); reactions
    /// stored separately are left untouched.
    pub fn upsert_message(&self, msg: &Message) -> Result<()> {
        for emoji in &msg.reaction_emoji {
            emoji
                .validate()
                .with_context(|| format!("Message {} carries an unstorable emoji", msg.id))?;
        }

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            // ON CONFLICT rather than INSERT OR REPLACE: a REPLACE deletes the
            // old row first and would cascade away its reactions.
            tx.execute(
                "INSERT INTO messages (id, channel_id, author_id, non_user_author, timestamp_ms, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    channel_id = excluded.channel_id,
                    author_id = excluded.author_id,
                    non_user_author = excluded.non_user_author,
                    timestamp_ms = excluded.timestamp_ms,
                    content = excluded.content",
                rusqlite::params![
                    msg.id.as_str(),
                    msg.channel_id.as_str(),
                    msg.author_id.as_str(),
                    msg.non_user_author,
                    msg.timestamp_ms,
                    msg.content,
                ],
            )?;

            tx.execute(
                "DELETE FROM message_mentions WHERE message_id = ?1",
                [msg.id.as_str()],
            )?;
            for mention in msg.distinct_mentions() {
                tx.execute(
                    "INSERT INTO message_mentions (message_id, user_id, position) VALUES (?1, ?2, ?3)",
                    rusqlite::params![msg.id.as_str(), mention.user_id.as_str(), mention.position],
                )?;
            }

            tx.execute(
                "DELETE FROM message_reaction_emoji WHERE message_id = ?1",
                [msg.id.as_str()],
            )?;
            for emoji in msg.distinct_reaction_emoji() {
                tx.execute(
                    "INSERT INTO message_reaction_emoji (message_id, emoji) VALUES (?1, ?2)",
                    rusqlite::params![msg.id.as_str(), emoji.reference()],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Delete a message and, via cascade, its reactions, mentions and emoji.
    /// Returns false when there was nothing to delete.
    pub fn remove_message(&self, id: &Snowflake) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id.as_str()])?;
            Ok(n > 0)
        })
    }

    pub fn get_message(&self, id: &Snowflake) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id.as_str()))
    }

    pub fn count_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    // -- Reactions --

    /// Insert a reaction keyed by (message, author, emoji). Fails when the host
    /// message has not been mirrored yet; the caller is expected to retry.
    pub fn upsert_reaction(&self, reaction: &Reaction) -> Result<()> {
        reaction.emoji.validate().with_context(|| {
            format!("Reaction on message {} has an unstorable emoji", reaction.message_id)
        })?;

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let host_exists = tx
                .query_row(
                    "SELECT 1 FROM messages WHERE id = ?1",
                    [reaction.message_id.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !host_exists {
                bail!(
                    "Message {} not mirrored yet, cannot attach reaction {}",
                    reaction.message_id,
                    reaction.emoji
                );
            }

            tx.execute(
                "INSERT INTO reactions (channel_id, message_id, author_id, emoji)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id, author_id, emoji) DO UPDATE SET
                    channel_id = excluded.channel_id",
                rusqlite::params![
                    reaction.channel_id.as_str(),
                    reaction.message_id.as_str(),
                    reaction.author_id.as_str(),
                    reaction.emoji.reference(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn remove_reaction(
        &self,
        message_id: &Snowflake,
        author_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND author_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id.as_str(), author_id.as_str(), emoji.reference()],
            )?;
            Ok(n > 0)
        })
    }

    /// All reactions on a message, oldest first.
    pub fn get_reactions(&self, message_id: &Snowflake) -> Result<Vec<Reaction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, message_id, author_id, emoji
                 FROM reactions WHERE message_id = ?1 ORDER BY rowid",
            )?;

            let rows = stmt
                .query_map([message_id.as_str()], |row| {
                    Ok(ReactionRow {
                        channel_id: row.get(0)?,
                        message_id: row.get(1)?,
                        author_id: row.get(2)?,
                        emoji: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ReactionRow::into_reaction).collect()
        })
    }

    // -- Members --

    /// Insert or overwrite a guild member, replacing nickname and roles.
    pub fn upsert_member(&self, member: &GuildMember) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let user = &member.user;

            tx.execute(
                "INSERT INTO members (user_id, username, discriminator, bot, nickname)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    username = excluded.username,
                    discriminator = excluded.discriminator,
                    bot = excluded.bot,
                    nickname = excluded.nickname",
                rusqlite::params![
                    user.id.as_str(),
                    user.username,
                    user.discriminator,
                    user.bot,
                    member.nick,
                ],
            )?;

            tx.execute("DELETE FROM member_roles WHERE user_id = ?1", [user.id.as_str()])?;
            for (position, role_id) in member.distinct_roles().into_iter().enumerate() {
                tx.execute(
                    "INSERT INTO member_roles (user_id, role_id, position) VALUES (?1, ?2, ?3)",
                    rusqlite::params![user.id.as_str(), role_id.as_str(), position as i64],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn remove_member(&self, user_id: &Snowflake) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM members WHERE user_id = ?1", [user_id.as_str()])?;
            Ok(n > 0)
        })
    }

    pub fn get_member(&self, user_id: &Snowflake) -> Result<Option<GuildMember>> {
        self.with_conn(|conn| query_member(conn, user_id.as_str()))
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<Message>> {
    let row = conn
        .query_row(
            "SELECT id, channel_id, author_id, non_user_author, timestamp_ms, content
             FROM messages WHERE id = ?1",
            [id],
            |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    channel_id: row.get(1)?,
                    author_id: row.get(2)?,
                    non_user_author: row.get(3)?,
                    timestamp_ms: row.get(4)?,
                    content: row.get(5)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT user_id, position FROM message_mentions WHERE message_id = ?1 ORDER BY rowid",
    )?;
    let mentions = stmt
        .query_map([id], |row| {
            Ok(MentionRow {
                user_id: row.get(0)?,
                position: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT emoji FROM message_reaction_emoji WHERE message_id = ?1 ORDER BY rowid",
    )?;
    let emoji = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    row.into_message(mentions, emoji).map(Some)
}

fn query_member(conn: &Connection, user_id: &str) -> Result<Option<GuildMember>> {
    let row = conn
        .query_row(
            "SELECT user_id, username, discriminator, bot, nickname FROM members WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(MemberRow {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    discriminator: row.get(2)?,
                    bot: row.get(3)?,
                    nickname: row.get(4)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT role_id FROM member_roles WHERE user_id = ?1 ORDER BY position")?;
    let roles = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(row.into_member(roles)))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
