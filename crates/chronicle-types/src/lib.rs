pub mod events;
pub mod models;
pub mod updates;

pub use events::GatewayEvent;
pub use models::{Emoji, EmojiParseError, GuildMember, Mention, Message, Reaction, Snowflake, User};
pub use updates::{Update, UpdateKind};
