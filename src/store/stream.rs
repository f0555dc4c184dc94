use tokio::task::JoinHandle;

/// Handle to a stream bound to a store with
/// [`Store::execute_stream`](crate::Store::execute_stream).
///
/// Dropping the handle leaves the subscription running; the store tears it
/// down in [`Store::release`](crate::Store::release).
#[derive(Debug)]
pub struct StreamSubscription {
    task: JoinHandle<()>,
}

impl StreamSubscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop consuming the stream and wait until the consumer is gone.
    pub async fn cancel(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    /// Wait for the stream to complete on its own.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}
