use std::collections::VecDeque;

use futures::TryStreamExt;
use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Document},
    context::OperationContext,
    error::ErrorKind,
    operation::CursorSpecification,
    selection_criteria::SelectionCriteria,
    test::{util::cursor_reply, MockCluster, MockReply},
    Cursor,
    Namespace,
};

fn docs(ids: impl IntoIterator<Item = i32>) -> Vec<Document> {
    ids.into_iter().map(|id| doc! { "_id": id }).collect()
}

async fn open_cursor(cluster: &MockCluster, id: i64, first_batch: Vec<Document>) -> Cursor {
    let criteria = SelectionCriteria::writable();
    let server = cluster.topology().select_server(&criteria).await.unwrap();
    let lease = server.checkout_connection().await.unwrap();
    let spec = CursorSpecification {
        ns: Namespace::new("test", "c"),
        id,
        initial_buffer: VecDeque::from(first_batch),
        batch_size: Some(2),
    };
    Cursor::new(
        OperationContext::new(),
        server.description().clone(),
        criteria,
        spec,
        lease,
    )
}

#[tokio::test]
async fn iterates_across_batches() {
    let cluster = MockCluster::new();
    cluster.push_reply(cursor_reply(7, "test.c", "nextBatch", docs([3, 4])));
    cluster.push_reply(cursor_reply(0, "test.c", "nextBatch", docs([5])));

    let mut cursor = open_cursor(&cluster, 7, docs([1, 2])).await;
    let mut seen = Vec::new();
    while let Some(document) = cursor.next().await.unwrap() {
        seen.push(document);
    }

    assert_eq!(seen, docs(1..=5));
    assert!(cursor.is_exhausted());
    assert_eq!(cluster.releases(), 1);
    assert_eq!(
        cluster.sent(),
        vec![
            doc! { "getMore": 7_i64, "collection": "c", "batchSize": 2, "$db": "test" },
            doc! { "getMore": 7_i64, "collection": "c", "batchSize": 2, "$db": "test" },
        ]
    );

    // exhausted cursors keep reporting the end without touching the server
    assert_eq!(cursor.next().await.unwrap(), None);
    drop(cursor);
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn connection_released_once_server_cursor_is_done() {
    let cluster = MockCluster::new();
    let mut cursor = open_cursor(&cluster, 0, docs([1])).await;

    assert_eq!(cluster.releases(), 1);
    assert_eq!(cursor.next().await.unwrap(), Some(doc! { "_id": 1 }));
    assert_eq!(cursor.next().await.unwrap(), None);
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn close_kills_cursor_and_releases_once() {
    let cluster = MockCluster::new();
    cluster.push_reply(doc! { "ok": 1, "cursorsKilled": [9_i64] });

    let mut cursor = open_cursor(&cluster, 9, docs([1, 2])).await;
    assert_eq!(cursor.next().await.unwrap(), Some(doc! { "_id": 1 }));

    cursor.close().await;
    assert!(cursor.is_closed());
    assert_eq!(cluster.releases(), 1);
    assert_eq!(
        cluster.sent(),
        vec![doc! { "killCursors": "c", "cursors": [9_i64], "$db": "test" }]
    );

    let error = cursor.next().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::CursorClosed));

    cursor.close().await;
    drop(cursor);
    assert_eq!(cluster.releases(), 1);
    assert_eq!(cluster.sent().len(), 1);
}

#[tokio::test]
async fn get_more_failure_closes_cursor() {
    let cluster = MockCluster::new();
    cluster.push_reply(MockReply::ReceiveFailure);

    let mut cursor = open_cursor(&cluster, 7, Vec::new()).await;
    let error = cursor.next().await.unwrap_err();
    assert!(error.is_transport_error());
    assert!(cursor.is_closed());
    assert_eq!(cluster.releases(), 1);

    let error = cursor.next().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::CursorClosed));
    drop(cursor);
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn get_more_server_error_closes_cursor() {
    let cluster = MockCluster::new();
    cluster.push_reply(doc! {
        "ok": 0,
        "code": 43,
        "codeName": "CursorNotFound",
        "errmsg": "gone",
    });

    let mut cursor = open_cursor(&cluster, 7, Vec::new()).await;
    let error = cursor.next().await.unwrap_err();
    assert!(error.is_server_error());
    assert!(cursor.is_closed());
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn dropping_open_cursor_kills_it_in_background() {
    let cluster = MockCluster::new();
    cluster.push_reply(doc! { "ok": 1 });

    let cursor = open_cursor(&cluster, 11, docs([1])).await;
    drop(cursor);

    cluster.wait_for_releases(1).await;
    assert_eq!(cluster.releases(), 1);
    assert_eq!(
        cluster.sent(),
        vec![doc! { "killCursors": "c", "cursors": [11_i64], "$db": "test" }]
    );
}

#[tokio::test]
async fn stream_yields_every_document() {
    let cluster = MockCluster::new();
    cluster.push_reply(cursor_reply(0, "test.c", "nextBatch", docs([3])));

    let cursor = open_cursor(&cluster, 7, docs([1, 2])).await;
    let all: Vec<Document> = cursor.into_stream().try_collect().await.unwrap();

    assert_eq!(all, docs(1..=3));
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn stream_ends_after_error() {
    let cluster = MockCluster::new();
    cluster.push_reply(MockReply::ReceiveFailure);

    let cursor = open_cursor(&cluster, 7, docs([1])).await;
    let results: Vec<_> = futures::StreamExt::collect(cursor.into_stream()).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].as_ref().unwrap_err().is_transport_error());
    assert_eq!(cluster.releases(), 1);
}
