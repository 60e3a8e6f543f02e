//! The blocking `serve` loop and the client half a transport feeds it from.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::Backend;
use crate::domain::Response;
use crate::errors::{Error, Result};

/// One request in flight together with the channel its response goes back on
#[derive(Debug)]
pub struct Envelope {
    pub request: Value,
    pub reply: oneshot::Sender<Response>,
}

/// Sending half of the request channel
#[derive(Debug, Clone)]
pub struct BackendClient {
    tx: mpsc::Sender<Envelope>,
}

impl BackendClient {
    /// Submit a raw request and wait for its response
    pub async fn call(&self, request: Value) -> Result<Response> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| Error::transport("backend is no longer accepting requests"))?;
        response.await.map_err(|_| Error::transport("backend dropped the request without responding"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a bounded request channel
pub fn channel(capacity: usize) -> (BackendClient, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BackendClient { tx }, rx)
}

/// Accept requests until every [`BackendClient`] is dropped.
///
/// Each request runs on its own task. Dropping the receiving half of an
/// envelope's reply channel cancels that request's handler. Returns once the
/// channel has closed and all in-flight requests have finished.
pub async fn serve(backend: Arc<Backend>, mut rx: mpsc::Receiver<Envelope>) {
    let mut tasks = JoinSet::new();
    info!("Backend accepting requests");

    loop {
        tokio::select! {
            envelope = rx.recv() => match envelope {
                Some(envelope) => {
                    tasks.spawn(respond(Arc::clone(&backend), envelope));
                }
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Request task failed");
                }
            }
        }
    }

    debug!(in_flight = tasks.len(), "Request channel closed; draining");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Request task failed");
        }
    }
    info!("Backend stopped serving");
}

async fn respond(backend: Arc<Backend>, envelope: Envelope) {
    let Envelope { request, mut reply } = envelope;

    let response = tokio::select! {
        response = backend.handle(request) => Some(response),
        _ = reply.closed() => None,
    };

    match response {
        Some(response) => {
            if reply.send(response).is_err() {
                debug!("Caller went away before the response was delivered");
            }
        }
        None => debug!("Caller dropped the reply channel; request cancelled"),
    }
}
