use anyhow::Result;
use chronicle_types::Update;

use crate::store::MirrorStore;

/// Route an update to the store operation for its kind.
pub fn apply(store: &dyn MirrorStore, update: &Update) -> Result<()> {
    match update {
        Update::AddMessage(message) => store.add_message(message),
        Update::DeleteMessage { id } => store.delete_message(id),
        Update::AddReaction(reaction) => store.add_reaction(reaction),
        Update::DeleteReaction {
            message_id,
            author_id,
            emoji,
        } => store.delete_reaction(message_id, author_id, emoji),
        Update::AddMember(member) => store.add_member(member),
        Update::DeleteMember { user_id } => store.delete_member(user_id),
        Update::UpdateMember(member) => store.update_member(member),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chronicle_types::{Emoji, GuildMember, Message, Reaction, User};

    fn msg() -> Message {
        Message {
            id: "1".into(),
            channel_id: "100".into(),
            author_id: "7".into(),
            non_user_author: true,
            timestamp_ms: 0,
            content: "from a webhook".into(),
            reaction_emoji: vec![],
            mentions: vec![],
        }
    }

    fn member(nick: &str) -> GuildMember {
        GuildMember {
            user: User {
                id: "42".into(),
                username: "ada".into(),
                discriminator: "0001".into(),
                bot: true,
            },
            nick: Some(nick.into()),
            roles: vec![],
        }
    }

    #[test]
    fn every_kind_reaches_the_store() {
        let db = Database::open_in_memory().unwrap();
        let smile = Emoji::builtin("smile");

        apply(&db, &Update::AddMessage(msg())).unwrap();
        apply(
            &db,
            &Update::AddReaction(Reaction {
                channel_id: "100".into(),
                message_id: "1".into(),
                author_id: "9".into(),
                emoji: smile.clone(),
            }),
        )
        .unwrap();
        assert_eq!(db.get_reactions(&"1".into()).unwrap().len(), 1);

        apply(
            &db,
            &Update::DeleteReaction {
                message_id: "1".into(),
                author_id: "9".into(),
                emoji: smile,
            },
        )
        .unwrap();
        assert!(db.get_reactions(&"1".into()).unwrap().is_empty());

        apply(&db, &Update::DeleteMessage { id: "1".into() }).unwrap();
        assert!(db.get_message(&"1".into()).unwrap().is_none());

        apply(&db, &Update::AddMember(member("a"))).unwrap();
        apply(&db, &Update::UpdateMember(member("b"))).unwrap();
        let stored = db.get_member(&"42".into()).unwrap().unwrap();
        assert_eq!(stored.nick.as_deref(), Some("b"));

        apply(&db, &Update::DeleteMember { user_id: "42".into() }).unwrap();
        assert!(db.get_member(&"42".into()).unwrap().is_none());
    }

    #[test]
    fn deletes_of_unknown_rows_succeed() {
        let db = Database::open_in_memory().unwrap();
        apply(&db, &Update::DeleteMessage { id: "404".into() }).unwrap();
        apply(&db, &Update::DeleteMember { user_id: "404".into() }).unwrap();
        apply(
            &db,
            &Update::DeleteReaction {
                message_id: "404".into(),
                author_id: "1".into(),
                emoji: Emoji::builtin("smile"),
            },
        )
        .unwrap();
    }
}
