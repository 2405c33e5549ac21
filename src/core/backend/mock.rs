use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BackendError, BackendStream, RecognitionBackend, RecognitionConfig, StreamEndpoint};

/// Backend that hands every opened endpoint to the test.
pub(crate) struct MockBackend {
    opened: AtomicUsize,
    endpoints: mpsc::UnboundedSender<StreamEndpoint>,
    open_delay: Option<Duration>,
    open_error: Option<BackendError>,
}

impl MockBackend {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<StreamEndpoint>) {
        let (endpoints, rx) = mpsc::unbounded_channel();
        (
            Self {
                opened: AtomicUsize::new(0),
                endpoints,
                open_delay: None,
                open_error: None,
            },
            rx,
        )
    }

    pub(crate) fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub(crate) fn failing(mut self, error: BackendError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionBackend for MockBackend {
    async fn open_stream(&self, _config: &RecognitionConfig) -> Result<BackendStream, BackendError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref error) = self.open_error {
            return Err(error.clone());
        }

        let (stream, endpoint) = BackendStream::pair();
        self.opened.fetch_add(1, Ordering::SeqCst);
        let _ = self.endpoints.send(endpoint);
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
