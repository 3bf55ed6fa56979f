use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{
    error::PhaJayError, listeners::ListenerRegistry, transport::ChannelStream, types::PaymentEvent,
};

/// Kinds of signals an open channel dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelEventKind {
    Payment,
    Closed,
}

/// Signal dispatched to the listeners of an open channel
#[derive(Debug, Clone)]
pub enum ChannelSignal {
    /// A payment event was pushed by the gateway
    Payment(PaymentEvent),

    /// The channel ended without being asked to
    Closed(String),
}

impl ChannelSignal {
    pub fn kind(&self) -> ChannelEventKind {
        match self {
            ChannelSignal::Payment(_) => ChannelEventKind::Payment,
            ChannelSignal::Closed(_) => ChannelEventKind::Closed,
        }
    }
}

pub type ChannelListeners = ListenerRegistry<ChannelEventKind, ChannelSignal>;

/// Handle on an open channel
///
/// Owns the task pumping the transport stream into the listener registry.
/// Closing (or dropping) the handle detaches every listener and stops the pump.
pub(crate) struct ChannelConnection {
    listeners: Arc<ChannelListeners>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ChannelConnection {
    /// Start pumping `stream`; listeners must already be registered
    pub(crate) fn spawn(
        transaction_id: String,
        stream: ChannelStream,
        listeners: Arc<ChannelListeners>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(Self::run_pump(
            transaction_id,
            stream,
            Arc::clone(&listeners),
            shutdown_rx,
        ));

        Self {
            listeners,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Detach all listeners and stop the pump; nothing is dispatched afterwards
    pub(crate) fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.listeners.remove_all_listeners(None);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    async fn run_pump(
        transaction_id: String,
        mut stream: ChannelStream,
        listeners: Arc<ChannelListeners>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    debug!(transaction_id = %transaction_id, "Channel shutdown signal received");
                    return;
                }
                item = stream.next() => {
                    let signal = match item {
                        Some(Ok(event)) => {
                            debug!(
                                transaction_id = %transaction_id,
                                event_transaction_id = %event.transaction_id,
                                status = %event.status,
                                "Received payment event"
                            );
                            ChannelSignal::Payment(event)
                        }
                        Some(Err(PhaJayError::ConnectionLost(reason))) => ChannelSignal::Closed(reason),
                        Some(Err(e)) => ChannelSignal::Closed(e.to_string()),
                        None => ChannelSignal::Closed("channel stream ended".to_string()),
                    };

                    let closed = matches!(signal, ChannelSignal::Closed(_));
                    if closed {
                        info!(transaction_id = %transaction_id, "Channel closed by remote");
                    }
                    listeners.emit(&signal.kind(), &signal);
                    if closed {
                        return;
                    }
                }
            }
        }
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
