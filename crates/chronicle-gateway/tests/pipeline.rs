//! End-to-end: feed → capture → queue → replay → SQLite mirror.
//!
//! The feed deliberately delivers a reaction before its message, and includes
//! events from a channel and a guild that are not mirrored.

use std::sync::Arc;

use chronicle_db::Database;
use chronicle_gateway::{AllowList, Capture, jsonl_events};
use chronicle_queue::{ReplayConfig, Replayer, UpdateQueue};
use chronicle_types::{Emoji, Snowflake};
use tokio_util::sync::CancellationToken;

const FEED: &str = r#"
{"type":"ReactionAdd","data":{"guild_id":"1","reaction":{"channel_id":"10","message_id":"500","author_id":"9","emoji":{"id":"77","name":"pepe"}}}}
{"type":"MessageCreate","data":{"guild_id":"1","message":{"id":"500","channel_id":"10","author_id":"7","non_user_author":false,"timestamp_ms":1600000000000,"content":"hi <@42>","reaction_emoji":[{"id":"77","name":"pepe"}],"mentions":[{"user_id":"42","position":3}]}}}
{"type":"MessageCreate","data":{"guild_id":"1","message":{"id":"501","channel_id":"99","author_id":"7","non_user_author":false,"timestamp_ms":1600000000001,"content":"elsewhere"}}}
{"type":"GuildMemberAdd","data":{"guild_id":"1","member":{"user":{"id":"42","username":"ada","discriminator":"0001"},"nick":"Ada","roles":["5"]}}}
{"type":"GuildMemberAdd","data":{"guild_id":"2","member":{"user":{"id":"43","username":"bob","discriminator":"0002"},"nick":null,"roles":[]}}}
"#;

#[tokio::test]
async fn out_of_order_reaction_is_retried_until_its_message_exists() {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(UpdateQueue::open(dir.path().join("queue.json")).await.unwrap());
    let db = Arc::new(Database::open(&dir.path().join("mirror.db")).unwrap());

    let allow = AllowList::new("1".into(), [Snowflake::from("10")]);
    let capture = Capture::new(allow, queue.clone());
    let stats = capture
        .run(jsonl_events(FEED.as_bytes()), CancellationToken::new())
        .await;
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.filtered, 2);

    let replayer = Replayer::new(queue.clone(), db.clone(), ReplayConfig::default());

    // First cycle: the reaction precedes its message and fails; the message
    // and member apply.
    let report = replayer.try_drain().await.unwrap().unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.remaining, 1);

    let message = db.get_message(&"500".into()).unwrap().unwrap();
    assert_eq!(message.content, "hi <@42>");
    assert_eq!(message.reaction_emoji, vec![Emoji::custom("pepe", "77")]);
    assert!(db.get_reactions(&"500".into()).unwrap().is_empty());
    assert!(db.get_message(&"501".into()).unwrap().is_none());

    let member = db.get_member(&"42".into()).unwrap().unwrap();
    assert_eq!(member.nick.as_deref(), Some("Ada"));
    assert!(db.get_member(&"43".into()).unwrap().is_none());

    let stuck = queue.snapshot_pending().await;
    assert_eq!(stuck[0].update.key(), "reaction:500/9/pepe:77");

    // Second cycle: the host message now exists.
    let report = replayer.try_drain().await.unwrap().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.remaining, 0);

    let reactions = db.get_reactions(&"500".into()).unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].emoji, Emoji::custom("pepe", "77"));
}

#[tokio::test]
async fn pending_updates_survive_restart_and_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let queue_path = dir.path().join("queue.json");
    let db = Arc::new(Database::open(&dir.path().join("mirror.db")).unwrap());

    {
        let queue = Arc::new(UpdateQueue::open(&queue_path).await.unwrap());
        let capture = Capture::new(AllowList::new("1".into(), [Snowflake::from("10")]), queue);
        capture
            .run(jsonl_events(FEED.as_bytes()), CancellationToken::new())
            .await;
    }

    let queue = Arc::new(UpdateQueue::open(&queue_path).await.unwrap());
    assert_eq!(queue.len().await, 3);

    let replayer = Replayer::new(queue.clone(), db.clone(), ReplayConfig::default());
    replayer.try_drain().await.unwrap().unwrap();
    replayer.try_drain().await.unwrap().unwrap();

    assert!(queue.is_empty().await);
    assert_eq!(db.count_messages().unwrap(), 1);
    assert_eq!(db.get_reactions(&"500".into()).unwrap().len(), 1);
}
