use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::{
    bson::doc,
    error::ErrorKind,
    operation::{Find, FindAndModify, ListDatabases, RunCommand},
    options::{
        ClientOptions,
        ReadConcern,
        ReadConcernLevel,
        ReadPreference,
        SelectionCriteria,
        WriteConcern,
    },
    test::{util::cursor_reply, MockCluster, MockReply},
    Client,
    Namespace,
    OperationContext,
    WriteOutcome,
};

fn delete_one() -> FindAndModify {
    FindAndModify::with_delete(Namespace::new("test", "c"), doc! { "_id": 1 }, Vec::new())
}

#[tokio::test]
async fn configured_write_concern_is_applied() {
    let cluster = MockCluster::new();
    cluster.push_reply(doc! { "ok": 1, "value": null });
    let client = Client::new(
        cluster.topology(),
        ClientOptions::builder()
            .write_concern(WriteConcern::majority())
            .build(),
    );

    let outcome = client.find_and_modify(delete_one()).await.unwrap();

    assert!(outcome.is_acknowledged());
    assert_eq!(
        cluster.sent()[0].get_document("writeConcern").unwrap(),
        &doc! { "w": "majority" }
    );
    assert_eq!(cluster.criteria(), vec![SelectionCriteria::writable()]);
}

#[tokio::test]
async fn configured_unacknowledged_write_concern() {
    let cluster = MockCluster::new();
    cluster.push_reply(doc! { "ok": 1 });
    let client = Client::new(
        cluster.topology(),
        ClientOptions::builder()
            .write_concern(WriteConcern::unacknowledged())
            .build(),
    );

    let outcome = client.find_and_modify(delete_one()).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Unacknowledged);
    cluster.wait_for_releases(1).await;
}

#[tokio::test]
async fn reads_follow_configured_read_preference() {
    let cluster = MockCluster::new();
    cluster.push_reply(cursor_reply(0, "test.c", "firstBatch", Vec::new()));
    cluster.push_reply(doc! { "ok": 1, "databases": [] });
    let client = Client::new(
        cluster.topology(),
        ClientOptions::builder()
            .read_preference(ReadPreference::Secondary)
            .read_concern(ReadConcern::new(ReadConcernLevel::Majority))
            .build(),
    );

    client
        .find(Find::new(Namespace::new("test", "c"), doc! {}, Vec::new()))
        .await
        .unwrap();
    client
        .list_databases(ListDatabases::default())
        .await
        .unwrap();

    assert_eq!(
        cluster.criteria(),
        vec![
            SelectionCriteria::from(ReadPreference::Secondary),
            SelectionCriteria::writable(),
        ]
    );
    assert_eq!(
        cluster.sent()[0].get_document("readConcern").unwrap(),
        &doc! { "level": "majority" }
    );
}

#[tokio::test(start_paused = true)]
async fn server_selection_times_out() {
    let cluster = MockCluster::new();
    cluster.hang_selection();
    let client = Client::new(
        cluster.topology(),
        ClientOptions::builder()
            .server_selection_timeout(Duration::from_millis(100))
            .build(),
    );

    let error = client
        .run_command(RunCommand::new("admin", doc! { "ping": 1 }, Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(*error.kind, ErrorKind::ServerSelection { .. }));
    assert_eq!(cluster.checkouts(), 0);
}

#[tokio::test(start_paused = true)]
async fn operation_timeout_cancels_exchange() {
    let cluster = MockCluster::new();
    cluster.push_reply(MockReply::Hang);
    let client = Client::new(
        cluster.topology(),
        ClientOptions::builder()
            .timeout(Duration::from_millis(500))
            .build(),
    );

    let error = client
        .run_command(RunCommand::new("admin", doc! { "ping": 1 }, Vec::new()))
        .await
        .unwrap_err();

    assert!(error.is_cancellation());
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn caller_context_is_honoured() {
    let cluster = MockCluster::new();
    let client = Client::new(cluster.topology(), ClientOptions::default());

    let ctx = OperationContext::new();
    ctx.token().cancel();
    let error = client
        .find_and_modify_with_context(&ctx, delete_one())
        .await
        .unwrap_err();

    assert!(error.is_cancellation());
    assert_eq!(cluster.checkouts(), 0);
}

#[test]
fn debug_shows_options_but_not_topology() {
    let client = Client::new(
        MockCluster::new().topology(),
        ClientOptions::builder()
            .read_preference(ReadPreference::Nearest)
            .build(),
    );
    let clone = client.clone();

    let debug = format!("{:?}", clone);
    assert!(debug.starts_with("Client"));
    assert!(debug.contains("Nearest"));
    assert!(!debug.contains("topology"));
    assert_eq!(clone.options(), client.options());
}
