use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform identifier. Kept as the string the platform sends; never parsed
/// into an integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(String);

impl Snowflake {
    /// Reserved value meaning "no entity".
    pub const ABSENT: &'static str = "0";

    pub fn is_absent(&self) -> bool {
        self.0 == Self::ABSENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Snowflake {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Snowflake {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Snowflake {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// -- Emoji --

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmojiParseError {
    #[error("emoji reference is empty")]
    Empty,

    #[error("emoji reference {0:?} has an empty name")]
    MissingName(String),

    #[error("emoji reference {0:?} has an empty id")]
    MissingId(String),

    #[error("emoji reference {0:?} has more than one ':' separator")]
    TooManySeparators(String),

    #[error("emoji name {0:?} contains ':'")]
    SeparatorInName(String),

    #[error("emoji id {0:?} contains ':'")]
    SeparatorInId(String),
}

/// A reaction emoji. Built-in emoji have no id and are identified by their
/// display name; custom emoji carry the guild-scoped id as well.
///
/// Deserialization rejects emoji whose reference would not decode back to the
/// same value (empty name or id, or a `:` inside either).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEmoji")]
pub struct Emoji {
    pub id: Option<Snowflake>,
    pub name: String,
}

#[derive(Deserialize)]
struct RawEmoji {
    id: Option<Snowflake>,
    name: String,
}

impl TryFrom<RawEmoji> for Emoji {
    type Error = EmojiParseError;

    fn try_from(raw: RawEmoji) -> Result<Self, Self::Error> {
        let emoji = Self {
            id: raw.id,
            name: raw.name,
        };
        emoji.validate()?;
        Ok(emoji)
    }
}

impl Emoji {
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn custom(name: impl Into<String>, id: impl Into<Snowflake>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    /// Check that `reference()` decodes back to this exact emoji.
    pub fn validate(&self) -> Result<(), EmojiParseError> {
        if self.name.is_empty() {
            return Err(EmojiParseError::MissingName(self.reference()));
        }
        if self.name.contains(':') {
            return Err(EmojiParseError::SeparatorInName(self.name.clone()));
        }
        match &self.id {
            Some(id) if id.as_str().is_empty() => {
                Err(EmojiParseError::MissingId(self.reference()))
            }
            Some(id) if id.as_str().contains(':') => {
                Err(EmojiParseError::SeparatorInId(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Compact text form: `name` for built-in emoji, `name:id` for custom ones.
    /// Used as the reaction key column and as a map key.
    pub fn reference(&self) -> String {
        match &self.id {
            Some(id) => format!("{}:{}", self.name, id),
            None => self.name.clone(),
        }
    }

    pub fn from_reference(reference: &str) -> Result<Self, EmojiParseError> {
        if reference.is_empty() {
            return Err(EmojiParseError::Empty);
        }

        let mut parts = reference.split(':');
        let name = parts.next().unwrap_or_default();
        let id = parts.next();
        if parts.next().is_some() {
            return Err(EmojiParseError::TooManySeparators(reference.to_string()));
        }
        if name.is_empty() {
            return Err(EmojiParseError::MissingName(reference.to_string()));
        }

        match id {
            None => Ok(Self::builtin(name)),
            Some("") => Err(EmojiParseError::MissingId(reference.to_string())),
            Some(id) => Ok(Self::custom(name, id)),
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

impl FromStr for Emoji {
    type Err = EmojiParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reference(s)
    }
}

// -- Messages --

/// A user mentioned by a message. `position` is the character offset of the
/// first literal mention in the content, or -1 when the content does not
/// contain it (e.g. a reply ping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: Snowflake,
    pub position: i64,
}

impl Mention {
    pub const NOT_FOUND: i64 = -1;

    /// Build a mention record by searching `content` for `<@id>` or `<@!id>`.
    pub fn locate(content: &str, user_id: Snowflake) -> Self {
        let plain = format!("<@{}>", user_id);
        let nick = format!("<@!{}>", user_id);

        let byte_offset = [content.find(&plain), content.find(&nick)]
            .into_iter()
            .flatten()
            .min();

        let position = match byte_offset {
            Some(offset) => content[..offset].chars().count() as i64,
            None => Self::NOT_FOUND,
        };

        Self { user_id, position }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author_id: Snowflake,
    /// True when the author is not a platform user (webhooks, system posts).
    pub non_user_author: bool,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub content: String,
    /// Emoji that had reactions when the message was captured. Informational.
    #[serde(default)]
    pub reaction_emoji: Vec<Emoji>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl Message {
    /// One mention per user, keeping the first record seen.
    pub fn distinct_mentions(&self) -> Vec<&Mention> {
        let mut seen = HashSet::new();
        self.mentions.iter().filter(|m| seen.insert(&m.user_id)).collect()
    }

    /// Captured emoji with duplicates dropped, keeping first occurrence order.
    pub fn distinct_reaction_emoji(&self) -> Vec<&Emoji> {
        let mut seen = HashSet::new();
        self.reaction_emoji.iter().filter(|e| seen.insert(*e)).collect()
    }
}

// -- Reactions --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub author_id: Snowflake,
    pub emoji: Emoji,
}

// -- Guild members --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: User,
    pub nick: Option<String>,
    /// Role ids in the order the platform reports them, without duplicates.
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

impl GuildMember {
    /// Roles with duplicates dropped, keeping first occurrence order.
    pub fn distinct_roles(&self) -> Vec<&Snowflake> {
        let mut seen = HashSet::new();
        self.roles.iter().filter(|r| seen.insert(*r)).collect()
    }
}
