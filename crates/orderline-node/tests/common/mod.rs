//! Shared helpers for node integration tests: an in-memory client connection,
//! envelope builders and a tracing subscriber.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{sink, stream, Sink, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use orderline_core::error::{Result, Status};
use orderline_core::protocol::{ConfigurationEnvelope, Envelope, Payload};
use orderline_node::{BroadcastHandler, BroadcastResponse};

pub const WAIT: Duration = Duration::from_secs(1);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client end of an in-memory connection.
pub struct Client {
    tx: Option<mpsc::UnboundedSender<Envelope>>,
    rx: mpsc::UnboundedReceiver<BroadcastResponse>,
}

impl Client {
    pub fn send(&self, env: Envelope) {
        self.tx
            .as_ref()
            .expect("client already hung up")
            .send(env)
            .expect("connection gone");
    }

    /// Next reply, in receipt order.
    pub async fn status(&mut self) -> Status {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("no reply in time")
            .expect("connection closed before reply")
            .status
    }

    /// Close the inbound stream.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}

/// Server ends of an in-memory connection.
pub fn connection() -> (
    Client,
    impl Stream<Item = Envelope> + Send + 'static,
    impl Sink<BroadcastResponse, Error = String> + Send + 'static,
) {
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<BroadcastResponse>();

    let inbound = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|env| (env, rx))
    });
    let outbound = sink::unfold(
        out_tx,
        |tx: mpsc::UnboundedSender<BroadcastResponse>, resp: BroadcastResponse| async move {
            tx.send(resp).map_err(|e| e.to_string())?;
            Ok::<_, String>(tx)
        },
    );

    (
        Client {
            tx: Some(in_tx),
            rx: out_rx,
        },
        inbound,
        outbound,
    )
}

/// Open a connection served by `handler` on its own task.
pub fn serve(handler: &Arc<BroadcastHandler>) -> (Client, JoinHandle<Result<()>>) {
    let (client, inbound, outbound) = connection();
    let handler = Arc::clone(handler);
    let task = tokio::spawn(async move { handler.handle(inbound, outbound).await });
    (client, task)
}

/// Wait for a served connection to finish.
pub async fn finished(task: JoinHandle<Result<()>>) -> Result<()> {
    tokio::time::timeout(WAIT, task)
        .await
        .expect("connection did not terminate")
        .expect("connection task panicked")
}

pub fn message(chain_id: &str, body: &str) -> Envelope {
    Payload::message(chain_id, &body)
        .unwrap()
        .to_envelope()
        .unwrap()
}

pub fn config_tx(config: &ConfigurationEnvelope) -> Envelope {
    Payload::configuration(config).unwrap().to_envelope().unwrap()
}

pub fn empty_envelope() -> Envelope {
    Envelope::new(Bytes::new(), Bytes::new())
}

pub fn garbage_envelope() -> Envelope {
    Envelope::new(Bytes::from_static(b"\x00not json"), Bytes::from_static(b"sig"))
}
