use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Mirror DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                channel_id      TEXT NOT NULL,
                author_id       TEXT NOT NULL,
                non_user_author INTEGER NOT NULL DEFAULT 0,
                timestamp_ms    INTEGER NOT NULL,
                content         TEXT NOT NULL
            );

            CREATE INDEX idx_messages_channel
                ON messages(channel_id, timestamp_ms);

            CREATE TABLE message_mentions (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                position    INTEGER NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            CREATE TABLE message_reaction_emoji (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                emoji       TEXT NOT NULL,
                PRIMARY KEY (message_id, emoji)
            );

            CREATE TABLE reactions (
                channel_id  TEXT NOT NULL,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL,
                emoji       TEXT NOT NULL,
                PRIMARY KEY (message_id, author_id, emoji)
            );

            CREATE TABLE members (
                user_id         TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                discriminator   TEXT NOT NULL,
                bot             INTEGER NOT NULL DEFAULT 0,
                nickname        TEXT
            );

            CREATE TABLE member_roles (
                user_id     TEXT NOT NULL REFERENCES members(user_id) ON DELETE CASCADE,
                role_id     TEXT NOT NULL,
                position    INTEGER NOT NULL,
                PRIMARY KEY (user_id, role_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Mirror DB migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
