//! Client contract: persist-then-broadcast, history reconciliation, HTTP store.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use orderchat::{
    client::{ChatView, ClientError},
    store::{Conversation, HttpStore, MessageRecord, MessageStore, StoreError, StoreResult},
};
use serde_json::json;
use uuid::Uuid;

use common::{next_frame, start_test_server};

const WAIT: Duration = Duration::from_millis(300);

async fn recv_within(view: &mut ChatView<impl MessageStore>) -> Option<MessageRecord> {
    tokio::time::timeout(WAIT, view.recv()).await.ok().flatten()
}

#[tokio::test]
async fn buyer_and_seller_see_each_others_messages() {
    let server = start_test_server().await;

    let mut buyer = ChatView::open(server.store.clone(), &server.ws_url(), "order-42", "buyer").await.unwrap();
    let mut seller = ChatView::open(server.store.clone(), &server.ws_url(), "order-42", "seller").await.unwrap();
    assert_eq!(buyer.conversation_id(), seller.conversation_id());
    server.wait_for_room_size("order-42", 2).await;

    let sent = buyer.send("is the logo ready?").await.unwrap();

    let received = recv_within(&mut seller).await.unwrap();
    assert_eq!(received, sent);
    assert!(!seller.is_mine(&received));

    // The buyer's own echo is already on screen and gets skipped.
    assert_eq!(recv_within(&mut buyer).await, None);
    assert_eq!(buyer.messages().len(), 1);
    assert!(buyer.is_mine(&buyer.messages()[0]));
}

#[tokio::test]
async fn reopening_loads_ordered_history() {
    let server = start_test_server().await;

    let mut first = ChatView::open(server.store.clone(), &server.ws_url(), "order-7", "buyer").await.unwrap();
    for body in ["one", "two", "three"] {
        first.send(body).await.unwrap();
    }
    first.close().await.unwrap();

    let later = ChatView::open(server.store.clone(), &server.ws_url(), "order-7", "seller").await.unwrap();
    let bodies: Vec<&str> = later.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(bodies, ["one", "two", "three"]);
}

#[tokio::test]
async fn resync_after_missed_messages_dedupes() {
    let server = start_test_server().await;

    let mut seller = ChatView::open(server.store.clone(), &server.ws_url(), "order-8", "seller").await.unwrap();
    let mut buyer = ChatView::open(server.store.clone(), &server.ws_url(), "order-8", "buyer").await.unwrap();
    server.wait_for_room_size("order-8", 2).await;

    buyer.send("first").await.unwrap();
    assert!(recv_within(&mut seller).await.is_some());

    // Written while the seller was not listening on the relay.
    let conversation = server.store.get_or_create_conversation("order-8").await.unwrap();
    server.store.create_message(conversation.id, "buyer", "offline note").await.unwrap();

    seller.reconnect(&server.ws_url()).await.unwrap();
    let bodies: Vec<&str> = seller.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(bodies, ["first", "offline note"]);
    assert!(seller.is_live());
}

#[derive(Clone)]
struct FailingWrites<S>(S);

#[async_trait]
impl<S: MessageStore> MessageStore for FailingWrites<S> {
    async fn get_or_create_conversation(&self, order_id: &str) -> StoreResult<Conversation> {
        self.0.get_or_create_conversation(order_id).await
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        self.0.list_messages(conversation_id).await
    }

    async fn create_message(&self, _: Uuid, _: &str, _: &str) -> StoreResult<MessageRecord> {
        Err(StoreError::Malformed("disk full".to_owned()))
    }
}

#[tokio::test]
async fn failed_persist_is_never_broadcast() {
    let server = start_test_server().await;

    let mut watcher = server.connect().await;
    common::emit(&mut watcher, json!({ "event": "joinRoom", "data": "order-9" })).await;

    let mut view = ChatView::open(FailingWrites(server.store.clone()), &server.ws_url(), "order-9", "buyer")
        .await
        .unwrap();
    server.wait_for_room_size("order-9", 2).await;

    let err = view.send("lost?").await.unwrap_err();
    assert!(matches!(err, ClientError::Store(_)));
    assert!(view.messages().is_empty());
    assert_eq!(next_frame(&mut watcher, WAIT).await, None);
}

#[tokio::test]
async fn blank_message_is_neither_stored_nor_broadcast() {
    let server = start_test_server().await;

    let mut watcher = server.connect().await;
    common::emit(&mut watcher, json!({ "event": "joinRoom", "data": "order-10" })).await;

    let mut view = ChatView::open(server.store.clone(), &server.ws_url(), "order-10", "buyer").await.unwrap();
    server.wait_for_room_size("order-10", 2).await;

    for blank in ["", "   ", "\n\t "] {
        assert!(matches!(view.send(blank).await, Err(ClientError::EmptyMessage)));
    }
    assert!(view.messages().is_empty());
    assert!(server.store.list_messages(view.conversation_id()).await.unwrap().is_empty());
    assert_eq!(next_frame(&mut watcher, WAIT).await, None);

    let sent = view.send("  padded  ").await.unwrap();
    assert_eq!(sent.content, "padded");
    let frame = next_frame(&mut watcher, WAIT).await.unwrap();
    assert_eq!(frame["data"]["content"], "padded");
}

#[tokio::test]
async fn http_store_handles_awkward_order_ids() {
    let server = start_test_server().await;

    let store = HttpStore::new(server.base_url()).unwrap();
    store.sign_in("buyer").await.unwrap();

    for order_id in ["team/42", "order#7", "what?x=1", "50% off"] {
        let over_http = store.get_or_create_conversation(order_id).await.unwrap();
        assert_eq!(over_http.order_id, order_id);

        let direct = server.store.get_or_create_conversation(order_id).await.unwrap();
        assert_eq!(direct.id, over_http.id);
    }
}

#[tokio::test]
async fn http_store_drives_a_chat_view() {
    let server = start_test_server().await;

    let store = HttpStore::new(server.base_url()).unwrap();
    store.sign_in("buyer").await.unwrap();

    let mut view = ChatView::open(store.clone(), &server.ws_url(), "order-11", "buyer").await.unwrap();
    server.wait_for_room_size("order-11", 1).await;

    let sent = view.send("  hello over http  ").await.unwrap();
    assert_eq!(sent.content, "hello over http");
    assert_eq!(sent.sender_id, "buyer");

    let history = store.list_messages(view.conversation_id()).await.unwrap();
    assert_eq!(history, vec![sent]);

    assert!(matches!(
        store.list_messages(Uuid::now_v7()).await,
        Err(StoreError::ConversationNotFound(_))
    ));
}

#[tokio::test]
async fn http_api_checks_identity_and_input() {
    let server = start_test_server().await;
    let base = server.base_url();
    let http = reqwest::Client::builder().cookie_store(true).build().unwrap();

    let res = http.post(format!("{base}/orders/order-1/conversation")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(http.get(format!("{base}/identity")).send().await.unwrap().status(), 401);

    let res = http.post(format!("{base}/identity")).json(&json!({ "user_id": " " })).send().await.unwrap();
    assert_eq!(res.status(), 400);

    http.post(format!("{base}/identity"))
        .json(&json!({ "user_id": "seller" }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    let me: serde_json::Value = http.get(format!("{base}/identity")).send().await.unwrap().json().await.unwrap();
    assert_eq!(me, json!({ "id": "seller" }));

    let conversation: Conversation = http
        .post(format!("{base}/orders/order-1/conversation"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages_url = format!("{base}/conversations/{}/messages", conversation.id);

    let res = http.post(&messages_url).json(&json!({ "sender_id": "buyer", "content": "hi" })).send().await.unwrap();
    assert_eq!(res.status(), 403);

    let res = http.post(&messages_url).json(&json!({ "sender_id": "seller", "content": "   " })).send().await.unwrap();
    assert_eq!(res.status(), 400);

    let res = http
        .post(format!("{base}/conversations/{}/messages", Uuid::now_v7()))
        .json(&json!({ "sender_id": "seller", "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}
