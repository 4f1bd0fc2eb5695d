use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{Notify, Semaphore};

use crate::{
    bson::{doc, Document},
    cmap::{Connection, Message},
    error::{Error, ErrorKind, Result},
    sdam::{ConnectionSource, SelectedServer, ServerDescription, ServerType, Topology},
    selection_criteria::SelectionCriteria,
};

/// A scripted behaviour for the next exchange on a mock connection.
#[derive(Clone, Debug)]
pub(crate) enum MockReply {
    /// Reply with this document.
    Document(Document),
    /// Fail the write with an I/O error.
    SendFailure,
    /// Fail the read with an I/O error.
    ReceiveFailure,
    /// Never reply.
    Hang,
    /// Panic while reading.
    Panic,
}

impl From<Document> for MockReply {
    fn from(document: Document) -> Self {
        MockReply::Document(document)
    }
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<MockReply>,
    sent: Vec<Document>,
    criteria: Vec<SelectionCriteria>,
    selection_error: Option<Error>,
    checkout_error: Option<Error>,
    hang_selection: bool,
}

struct Inner {
    description: Mutex<ServerDescription>,
    state: Mutex<State>,
    selections: AtomicUsize,
    checkouts: AtomicUsize,
    releases: AtomicUsize,
    released: Notify,
    sent: Notify,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// A topology of a single server whose connections replay a shared script of replies and count
/// every selection, checkout and release.
#[derive(Clone)]
pub(crate) struct MockCluster {
    inner: Arc<Inner>,
}

impl MockCluster {
    pub(crate) fn new() -> Self {
        Self::with_description(ServerDescription::new_testing())
    }

    pub(crate) fn with_server_type(server_type: ServerType) -> Self {
        Self::with_description(
            ServerDescription::new("localhost:27017", server_type).with_wire_versions(0, 9),
        )
    }

    fn with_description(description: ServerDescription) -> Self {
        Self {
            inner: Arc::new(Inner {
                description: Mutex::new(description),
                state: Mutex::new(State::default()),
                selections: AtomicUsize::new(0),
                checkouts: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                released: Notify::new(),
                sent: Notify::new(),
                gate: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn topology(&self) -> Arc<dyn Topology> {
        Arc::new(self.clone())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap()
    }

    /// Appends a scripted behaviour for the next exchange.
    pub(crate) fn push_reply(&self, reply: impl Into<MockReply>) {
        self.state().replies.push_back(reply.into());
    }

    pub(crate) fn fail_selection(&self, error: Error) {
        self.state().selection_error = Some(error);
    }

    pub(crate) fn fail_checkout(&self, error: Error) {
        self.state().checkout_error = Some(error);
    }

    pub(crate) fn hang_selection(&self) {
        self.state().hang_selection = true;
    }

    /// Holds every send until [`MockCluster::open_gate`] is called.
    pub(crate) fn close_gate(&self) {
        *self.inner.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = self.inner.gate.lock().unwrap().as_ref() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub(crate) fn selections(&self) -> usize {
        self.inner.selections.load(Ordering::SeqCst)
    }

    pub(crate) fn checkouts(&self) -> usize {
        self.inner.checkouts.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }

    /// The criteria of every selection, in order.
    pub(crate) fn criteria(&self) -> Vec<SelectionCriteria> {
        self.state().criteria.clone()
    }

    /// The request documents sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<Document> {
        self.state().sent.clone()
    }

    /// Waits until at least `count` connections have been released.
    pub(crate) async fn wait_for_releases(&self, count: usize) {
        let wait = async {
            loop {
                let notified = self.inner.released.notified();
                if self.releases() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for connection release");
    }

    /// Waits until at least `count` requests have been sent.
    pub(crate) async fn wait_for_sent(&self, count: usize) {
        let wait = async {
            loop {
                let notified = self.inner.sent.notified();
                if self.state().sent.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for a request");
    }
}

impl Topology for MockCluster {
    fn select_server<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
    ) -> BoxFuture<'a, Result<SelectedServer>> {
        async move {
            self.inner.selections.fetch_add(1, Ordering::SeqCst);
            let (error, hang) = {
                let mut state = self.state();
                state.criteria.push(criteria.clone());
                (state.selection_error.clone(), state.hang_selection)
            };
            if hang {
                std::future::pending::<()>().await;
            }
            if let Some(error) = error {
                return Err(error);
            }
            let description = self.inner.description.lock().unwrap().clone();
            Ok(SelectedServer::new(description, Arc::new(self.clone())))
        }
        .boxed()
    }
}

impl ConnectionSource for MockCluster {
    fn check_out(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        async move {
            if let Some(error) = self.state().checkout_error.clone() {
                return Err(error);
            }
            self.inner.checkouts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                cluster: self.clone(),
                last_request_id: None,
                released: false,
            }) as Box<dyn Connection>)
        }
        .boxed()
    }
}

struct MockConnection {
    cluster: MockCluster,
    last_request_id: Option<i32>,
    released: bool,
}

impl Connection for MockConnection {
    fn send_message(&mut self, message: Message) -> BoxFuture<'_, Result<()>> {
        async move {
            let gate = self.cluster.inner.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await;
            }

            let mut state = self.cluster.state();
            if let Some(MockReply::SendFailure) = state.replies.front() {
                state.replies.pop_front();
                return Err(ErrorKind::from(std::io::ErrorKind::BrokenPipe).into());
            }
            state.sent.push(message.get_command_document());
            drop(state);
            self.cluster.inner.sent.notify_waiters();

            self.last_request_id = message.request_id();
            Ok(())
        }
        .boxed()
    }

    fn receive_message(&mut self) -> BoxFuture<'_, Result<Message>> {
        async move {
            let reply = self.cluster.state().replies.pop_front();
            match reply {
                Some(MockReply::Document(document)) => {
                    let raw = crate::bson::to_raw_document_buf(&document)?;
                    Ok(Message::from_document(raw)
                        .with_response_to(self.last_request_id.unwrap_or_default()))
                }
                Some(MockReply::Hang) => std::future::pending().await,
                Some(MockReply::Panic) => panic!("injected failure while reading a reply"),
                Some(MockReply::ReceiveFailure) | Some(MockReply::SendFailure) => {
                    Err(ErrorKind::from(std::io::ErrorKind::ConnectionReset).into())
                }
                None => Err(ErrorKind::from(std::io::ErrorKind::UnexpectedEof).into()),
            }
        }
        .boxed()
    }

    fn release(&mut self) {
        assert!(!self.released, "connection released more than once");
        self.released = true;
        self.cluster.inner.releases.fetch_add(1, Ordering::SeqCst);
        self.cluster.inner.released.notify_waiters();
    }
}

/// A canned successful cursor reply.
pub(crate) fn cursor_reply(id: i64, ns: &str, batch_key: &str, docs: Vec<Document>) -> Document {
    doc! {
        "ok": 1,
        "cursor": {
            "id": id,
            "ns": ns,
            batch_key: docs,
        },
    }
}
