//! Idempotent schema setup

use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::info;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS boards (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        manager BIGINT
    )",
    "CREATE TABLE IF NOT EXISTS topics (
        id BIGINT PRIMARY KEY,
        board_id BIGINT NOT NULL REFERENCES boards (id),
        name TEXT NOT NULL,
        nci_reviewer BIGINT
    )",
    "CREATE TABLE IF NOT EXISTS articles (
        id BIGINT PRIMARY KEY,
        source_id TEXT NOT NULL,
        title TEXT NOT NULL,
        authors JSONB NOT NULL DEFAULT '[]',
        journal_title TEXT NOT NULL,
        brief_journal_title TEXT NOT NULL,
        source_journal_id TEXT NOT NULL,
        core_journal BOOLEAN NOT NULL DEFAULT FALSE,
        year INTEGER,
        full_text_file TEXT,
        full_text_retrieved TIMESTAMPTZ,
        tags JSONB NOT NULL DEFAULT '[]',
        imported TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS article_topics (
        article_id BIGINT NOT NULL REFERENCES articles (id),
        topic_id BIGINT NOT NULL REFERENCES topics (id),
        cycle DATE NOT NULL,
        tags JSONB NOT NULL DEFAULT '[]',
        PRIMARY KEY (article_id, topic_id)
    )",
    "CREATE TABLE IF NOT EXISTS journal_exclusions (
        board_id BIGINT NOT NULL REFERENCES boards (id),
        source_journal_id TEXT NOT NULL,
        PRIMARY KEY (board_id, source_journal_id)
    )",
    "CREATE TABLE IF NOT EXISTS states (
        id BIGSERIAL PRIMARY KEY,
        article_id BIGINT NOT NULL,
        topic_id BIGINT NOT NULL,
        board_id BIGINT NOT NULL,
        value TEXT NOT NULL,
        current BOOLEAN NOT NULL,
        entered TIMESTAMPTZ NOT NULL,
        actor BIGINT NOT NULL,
        extra JSONB NOT NULL DEFAULT '{}',
        FOREIGN KEY (article_id, topic_id) REFERENCES article_topics (article_id, topic_id)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS states_one_current
        ON states (article_id, topic_id) WHERE current",
    "CREATE INDEX IF NOT EXISTS states_value_topic
        ON states (value, current, topic_id)",
    "CREATE INDEX IF NOT EXISTS states_value_board
        ON states (value, current, board_id)",
    "CREATE INDEX IF NOT EXISTS states_pair_history
        ON states (article_id, topic_id, entered, id)",
    "CREATE TABLE IF NOT EXISTS saved_queues (
        id UUID PRIMARY KEY,
        queue_type TEXT NOT NULL,
        owner BIGINT NOT NULL,
        filters JSONB NOT NULL,
        display JSONB NOT NULL,
        staged JSONB NOT NULL DEFAULT '[]',
        created TIMESTAMPTZ NOT NULL,
        retired TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS packets (
        id BIGSERIAL PRIMARY KEY,
        topic_id BIGINT NOT NULL REFERENCES topics (id),
        name TEXT NOT NULL,
        created TIMESTAMPTZ NOT NULL,
        created_by BIGINT NOT NULL,
        reviewers JSONB NOT NULL,
        summaries JSONB NOT NULL DEFAULT '[]',
        active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS packet_articles (
        id BIGSERIAL PRIMARY KEY,
        packet_id BIGINT NOT NULL REFERENCES packets (id),
        article_id BIGINT NOT NULL REFERENCES articles (id),
        dropped BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (packet_id, article_id)
    )",
    "CREATE TABLE IF NOT EXISTS reviews (
        id BIGSERIAL PRIMARY KEY,
        packet_article_id BIGINT NOT NULL REFERENCES packet_articles (id),
        reviewer BIGINT NOT NULL,
        posted TIMESTAMPTZ NOT NULL,
        dispositions JSONB NOT NULL,
        reasons JSONB NOT NULL DEFAULT '[]',
        comments TEXT,
        recorded_by BIGINT
    )",
    "CREATE INDEX IF NOT EXISTS reviews_packet_article
        ON reviews (packet_article_id)",
];

/// Create tables and indexes that do not exist yet
pub async fn apply_schema(conn: &DatabaseConnection) -> Result<()> {
    for statement in STATEMENTS {
        conn.execute_unprepared(statement).await?;
    }
    info!(statements = STATEMENTS.len(), "Schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_flag_is_guarded_by_partial_unique_index() {
        let index = STATEMENTS
            .iter()
            .find(|s| s.contains("states_one_current"))
            .unwrap();
        assert!(index.contains("UNIQUE"));
        assert!(index.trim_end().ends_with("WHERE current"));
    }

    #[test]
    fn test_statements_are_idempotent() {
        for statement in STATEMENTS {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }
}
