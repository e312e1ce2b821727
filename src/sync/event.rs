use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tracing::warn;

/// One key changing state between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Key was created or its value changed
    Put { key: String, value: String },
    /// Key no longer exists
    Delete { key: String },
}

impl ChangeEvent {
    pub fn put(
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        ChangeEvent::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        ChangeEvent::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            ChangeEvent::Put { key, .. } | ChangeEvent::Delete { key } => key,
        }
    }

    /// Metric label of the event
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Put { .. } => "put",
            ChangeEvent::Delete { .. } => "delete",
        }
    }
}

/// Receiver of change events
///
/// The watch loop awaits each dispatch before handing over the next event, so
/// an implementation observes events in emission order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventDispatcher: Send + Sync + 'static {
    async fn dispatch(
        &self,
        event: ChangeEvent,
    );
}

#[async_trait]
impl EventDispatcher for mpsc::Sender<ChangeEvent> {
    async fn dispatch(
        &self,
        event: ChangeEvent,
    ) {
        if let Err(e) = self.send(event).await {
            warn!("event receiver dropped, discarding {:?}", e.0);
        }
    }
}

#[async_trait]
impl EventDispatcher for mpsc::UnboundedSender<ChangeEvent> {
    async fn dispatch(
        &self,
        event: ChangeEvent,
    ) {
        if let Err(e) = self.send(event) {
            warn!("event receiver dropped, discarding {:?}", e.0);
        }
    }
}
