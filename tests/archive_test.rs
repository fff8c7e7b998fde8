mod helpers;

use chrono::{Duration, Utc};
use evna::context::types::{ClientType, Role};
use evna::store::{HistoricalQuery, HistoricalSearch};

fn query(text: &str) -> HistoricalQuery {
    HistoricalQuery {
        query: text.into(),
        limit: 10,
        project: None,
        since: None,
        threshold: 0.0,
    }
}

#[tokio::test]
async fn expired_messages_move_to_archive() {
    let store = helpers::test_store();
    let stream = helpers::stream(&store);

    stream
        .capture_message(
            "conv-old",
            Role::User,
            "stale thought about caching",
            helpers::minutes_ago(60 * 100),
            Some(ClientType::Desktop),
        )
        .await
        .unwrap();
    stream
        .capture_message(
            "conv-new",
            Role::User,
            "fresh thought about caching",
            helpers::minutes_ago(10),
            None,
        )
        .await
        .unwrap();

    let moved = store
        .archive_expired(Utc::now() - Duration::hours(72))
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let active = stream.query_context(10, None, None, None).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].content, "fresh thought about caching");

    let archived = store.search(&query("caching")).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].message.content, "stale thought about caching");
    assert_eq!(archived[0].message.client_type, Some(ClientType::Desktop));
    assert_eq!(archived[0].conversation.conv_id, "conv-old");
    assert!(archived[0].conversation.title.is_none());
}

#[tokio::test]
async fn archival_is_idempotent() {
    let store = helpers::test_store();
    helpers::stream(&store)
        .capture_message("c", Role::User, "old", helpers::minutes_ago(60 * 100), None)
        .await
        .unwrap();

    let cutoff = Utc::now() - Duration::hours(72);
    assert_eq!(store.archive_expired(cutoff).await.unwrap(), 1);
    assert_eq!(store.archive_expired(cutoff).await.unwrap(), 0);
}

#[tokio::test]
async fn messages_share_one_conversation_row() {
    let store = helpers::test_store();
    for content in ["first archived line", "second archived line"] {
        let message = helpers::message("shared", Role::User, content, helpers::minutes_ago(30));
        store.archive_message(&message, Some("Shared thread")).await.unwrap();
    }

    let conn = store.connection();
    let count: i64 = conn
        .lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM conversations WHERE conv_id = 'shared'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);

    let results = store.search(&query("archived")).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.conversation.title.as_deref() == Some("Shared thread")));
}

#[tokio::test]
async fn archiving_same_message_twice_is_ignored() {
    let store = helpers::test_store();
    let message = helpers::message("c", Role::User, "only once", helpers::minutes_ago(5));
    assert!(store.archive_message(&message, None).await.unwrap());
    assert!(!store.archive_message(&message, None).await.unwrap());
    assert_eq!(store.search(&query("once")).await.unwrap().len(), 1);
}
