mod helpers;

use evna::context::session::ClientAwareSession;
use evna::context::types::{ClientType, Role};
use std::sync::Arc;

async fn seed(stream: &evna::context::active::ActiveContextStream) {
    let entries = [
        (50, ClientType::Desktop, "desktop planning"),
        (40, ClientType::ClaudeCode, "terminal edit one"),
        (30, ClientType::Desktop, "desktop review"),
        (20, ClientType::ClaudeCode, "terminal edit two"),
    ];
    for (minutes, client, content) in entries {
        stream
            .capture_message(
                "conv",
                Role::User,
                content,
                helpers::minutes_ago(minutes),
                Some(client),
            )
            .await
            .unwrap();
    }
}

fn contents(messages: &[evna::context::types::Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn first_message_sees_every_client() {
    let store = helpers::test_store();
    let stream = Arc::new(helpers::stream(&store));
    seed(&stream).await;

    let mut session = ClientAwareSession::new(stream, 0);
    session.set_session("conv", ClientType::ClaudeCode);

    let first = session.get_client_aware_context(true, None, 10).await.unwrap();
    assert_eq!(first.len(), 4);
}

#[tokio::test]
async fn later_messages_see_only_current_client() {
    let store = helpers::test_store();
    let stream = Arc::new(helpers::stream(&store));
    seed(&stream).await;

    let mut session = ClientAwareSession::new(stream, 0);
    session.set_session("conv", ClientType::ClaudeCode);

    let later = session.get_client_aware_context(false, None, 10).await.unwrap();
    assert_eq!(contents(&later), vec!["terminal edit two", "terminal edit one"]);
}

#[tokio::test]
async fn cross_client_tail_adds_newest_other_client_message() {
    let store = helpers::test_store();
    let stream = Arc::new(helpers::stream(&store));
    seed(&stream).await;

    let mut session = ClientAwareSession::new(stream, 1);
    session.set_session("conv", ClientType::ClaudeCode);

    let later = session.get_client_aware_context(false, None, 10).await.unwrap();
    assert_eq!(
        contents(&later),
        vec!["terminal edit two", "desktop review", "terminal edit one"]
    );
}

#[tokio::test]
async fn bound_capture_tags_client() {
    let store = helpers::test_store();
    let stream = Arc::new(helpers::stream(&store));

    let mut session = ClientAwareSession::new(stream, 0);
    session.set_session("desk-conv", ClientType::Desktop);
    let captured = session
        .capture(Role::Assistant, "hello from desktop")
        .await
        .unwrap();

    assert_eq!(captured.conversation_id, "desk-conv");
    assert_eq!(captured.client_type, Some(ClientType::Desktop));
}

#[tokio::test]
async fn tail_shares_the_limit_with_own_messages() {
    let store = helpers::test_store();
    let stream = Arc::new(helpers::stream(&store));
    seed(&stream).await;

    let mut session = ClientAwareSession::new(stream, 2);
    session.set_session("conv", ClientType::ClaudeCode);

    let later = session.get_client_aware_context(false, None, 2).await.unwrap();
    assert_eq!(later.len(), 2);
    assert_eq!(contents(&later), vec!["desktop review", "desktop planning"]);
}
