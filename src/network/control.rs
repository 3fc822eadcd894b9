//! Command channel into the network cache.
//!
//! Commands are processed one at a time in arrival order by a single worker
//! task; [`ControlHandle::clear_all`] waits for the worker to acknowledge.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::interceptor::CachingTransport;
use super::partition::PartitionError;

#[derive(Debug)]
pub enum ControlCommand {
    /// Run activation right away instead of waiting for the next start.
    ActivateNow,
    /// Fetch and store the listed URLs.
    Populate(Vec<String>),
    ClearAll(oneshot::Sender<Result<(), PartitionError>>),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("network cache worker is not running")]
    Closed,
    #[error(transparent)]
    Clear(#[from] PartitionError),
}

#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub async fn activate_now(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::ActivateNow).await
    }

    pub async fn populate(&self, urls: Vec<String>) -> Result<(), ControlError> {
        self.send(ControlCommand::Populate(urls)).await
    }

    /// Remove every partition and wait until the worker has done so.
    pub async fn clear_all(&self) -> Result<(), ControlError> {
        let (reply, done) = oneshot::channel();
        self.send(ControlCommand::ClearAll(reply)).await?;
        done.await.map_err(|_| ControlError::Closed)??;
        Ok(())
    }

    async fn send(&self, command: ControlCommand) -> Result<(), ControlError> {
        self.tx.send(command).await.map_err(|_| ControlError::Closed)
    }
}

/// Start the worker. It exits once every handle has been dropped and the
/// queue is drained.
pub fn spawn_control(transport: CachingTransport, buffer: usize) -> (ControlHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer.max(1));
    let worker = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            debug!(?command, "network control command");
            match command {
                ControlCommand::ActivateNow => {
                    if let Err(err) = transport.activate().await {
                        warn!(error = %err, "activation failed");
                    }
                }
                ControlCommand::Populate(urls) => {
                    transport.populate(&urls).await;
                }
                ControlCommand::ClearAll(reply) => {
                    let result = transport.registry().clear_all().await;
                    if reply.send(result).is_err() {
                        debug!("clear acknowledged after caller went away");
                    }
                }
            }
        }
    });
    (ControlHandle { tx }, worker)
}
