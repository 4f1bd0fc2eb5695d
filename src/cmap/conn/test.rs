use pretty_assertions::assert_eq;

use super::{Command, Connection, ConnectionLease, StreamConnection};
use crate::{
    bson::{doc, rawdoc},
    cmap::Message,
    sdam::{ServerDescription, ServerType},
    selection_criteria::{ReadPreference, SelectionCriteria},
    test::MockCluster,
};

async fn lease(cluster: &MockCluster) -> ConnectionLease {
    let server = cluster
        .topology()
        .select_server(&SelectionCriteria::writable())
        .await
        .unwrap();
    server.checkout_connection().await.unwrap()
}

#[tokio::test]
async fn lease_releases_once_when_dropped() {
    let cluster = MockCluster::new();
    let connection = lease(&cluster).await;
    assert_eq!(cluster.releases(), 0);

    drop(connection);
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn explicit_release_is_idempotent() {
    let cluster = MockCluster::new();
    let mut connection = lease(&cluster).await;

    connection.release();
    connection.release();
    drop(connection);

    assert_eq!(cluster.checkouts(), 1);
    assert_eq!(cluster.releases(), 1);
}

#[tokio::test]
async fn released_lease_cannot_exchange_messages() {
    let cluster = MockCluster::new();
    let mut connection = lease(&cluster).await;
    connection.release();

    let message = Message::from_document(rawdoc! { "ping": 1 });
    let error = connection.send_message(message).await.unwrap_err();
    assert!(error.is_transport_error());
    let error = connection.receive_message().await.unwrap_err();
    assert!(error.is_transport_error());
    assert!(cluster.sent().is_empty());
}

#[test]
fn envelope_carries_target_database() {
    let command = Command::new_write("insert", "test", doc! { "insert": "c" });
    assert_eq!(
        command.to_document(&ServerDescription::new_testing()),
        doc! { "insert": "c", "$db": "test" }
    );
}

#[test]
fn read_preference_only_sent_to_mongos() {
    let command = Command::new_read(
        "find",
        "test",
        Some(ReadPreference::SecondaryPreferred),
        doc! { "find": "c" },
    );

    let mongos = ServerDescription::new("localhost:27017", ServerType::Mongos);
    assert_eq!(
        command.to_document(&mongos),
        doc! {
            "find": "c",
            "$db": "test",
            "$readPreference": { "mode": "secondaryPreferred" },
        }
    );

    let secondary = ServerDescription::new("localhost:27017", ServerType::RsSecondary);
    assert_eq!(
        command.to_document(&secondary),
        doc! { "find": "c", "$db": "test" }
    );
}

#[test]
fn primary_and_write_commands_omit_read_preference() {
    let mongos = ServerDescription::new("localhost:27017", ServerType::Mongos);

    let read = Command::new_read(
        "find",
        "test",
        Some(ReadPreference::Primary),
        doc! { "find": "c" },
    );
    assert_eq!(read.to_document(&mongos), doc! { "find": "c", "$db": "test" });

    let mut write = Command::new_write("delete", "test", doc! { "delete": "c" });
    write.read_pref = Some(ReadPreference::Secondary);
    assert_eq!(write.to_document(&mongos), doc! { "delete": "c", "$db": "test" });
}

#[test]
fn every_message_gets_a_fresh_request_id() {
    let description = ServerDescription::new_testing();
    let first = Command::new_write("ping", "admin", doc! { "ping": 1 })
        .into_message(&description)
        .unwrap();
    let second = Command::new_write("ping", "admin", doc! { "ping": 1 })
        .into_message(&description)
        .unwrap();

    assert!(first.request_id().is_some());
    assert_ne!(first.request_id(), second.request_id());
}

#[tokio::test]
async fn stream_connection_exchanges_messages() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut connection = StreamConnection::new(client);

    let server_task = tokio::spawn(async move {
        let request = Message::read_from(&mut server, None).await.unwrap();
        Message::from_document(rawdoc! { "ok": 1 })
            .with_response_to(request.request_id().unwrap())
            .write_to(&mut server)
            .await
            .unwrap();
        request.get_command_document()
    });

    let message = Command::new_write("ping", "admin", doc! { "ping": 1 })
        .into_message(&ServerDescription::new_testing())
        .unwrap();
    let request_id = message.request_id().unwrap();
    connection.send_message(message).await.unwrap();
    let reply = connection.receive_message().await.unwrap();

    assert_eq!(reply.response_to(), request_id);
    assert_eq!(reply.get_command_document(), doc! { "ok": 1 });
    assert_eq!(
        server_task.await.unwrap(),
        doc! { "ping": 1, "$db": "admin" }
    );
}

#[tokio::test]
async fn stream_connection_rejects_oversized_replies() {
    let (client, mut server) = tokio::io::duplex(4096);
    let mut connection = StreamConnection::new(client).with_max_message_size_bytes(64);

    Message::from_document(rawdoc! { "ok": 1, "payload": "x".repeat(128) })
        .write_to(&mut server)
        .await
        .unwrap();

    assert!(connection.receive_message().await.is_err());
}

#[tokio::test]
async fn released_stream_connection_is_closed() {
    let (client, _server) = tokio::io::duplex(64);
    let mut connection = StreamConnection::new(client);
    connection.release();

    let error = connection
        .send_message(Message::from_document(rawdoc! { "ping": 1 }))
        .await
        .unwrap_err();
    assert!(error.is_transport_error());
}
