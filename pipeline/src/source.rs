use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::{Mutex, mpsc};

/// Where the producer reads its update lines from.
#[async_trait]
pub trait LineSource: Send {
    /// `Ok(None)` at end of input.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

/// Lines forwarded from another task, e.g. a thread blocked on stdin.
#[async_trait]
impl LineSource for mpsc::Receiver<String> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.recv().await)
    }
}

/// A source shared between a long-lived reader (e.g. a menu) and pipeline
/// runs. The pipeline owns its clone for the duration of the run; lines are
/// read under the lock, so whoever reads next gets the next line.
#[async_trait]
impl<S> LineSource for Arc<Mutex<S>>
where
    S: LineSource,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lock().await.next_line().await
    }
}
