//! Finite, single-pass stream of progress events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::events::ProgressEvent;

/// Events of one worker round.
///
/// The stream ends after the first terminal event
/// ([`RunFinished`](ProgressEvent::RunFinished) or
/// [`RunError`](ProgressEvent::RunError)) or when the producer goes away.
/// It cannot be restarted.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<ProgressEvent>,
    finished: bool,
}

impl EventStream {
    pub fn new(rx: mpsc::Receiver<ProgressEvent>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Stream replaying a fixed list of events.
    pub fn from_events(events: impl IntoIterator<Item = ProgressEvent>) -> Self {
        let events: Vec<ProgressEvent> = events.into_iter().collect();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event.
            let _ = tx.try_send(event);
        }
        Self::new(rx)
    }

    /// Waits for the next event; `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        self.observe(event.as_ref());
        event
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: Option<&ProgressEvent>) {
        match event {
            Some(event) if !event.is_terminal() => {}
            _ => {
                self.finished = true;
                self.rx.close();
            }
        }
    }
}

impl Stream for EventStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ProgressEvent>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(event) => {
                self.observe(event.as_ref());
                Poll::Ready(event)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let coord = TileCoord { zoom: 0, x: 0, y: 0 };
        let mut stream = EventStream::from_events(vec![
            ProgressEvent::TileCompleted { coord },
            ProgressEvent::RunFinished {
                success_count: 1,
                fail_count: 0,
            },
            ProgressEvent::Diagnostic {
                line: "after the end".into(),
            },
        ]);

        assert_eq!(stream.next().await, Some(ProgressEvent::TileCompleted { coord }));
        assert!(stream.next().await.unwrap().is_terminal());
        assert!(stream.is_finished());
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_trait_collects() {
        let stream = EventStream::from_events(vec![
            ProgressEvent::Diagnostic { line: "hi".into() },
            ProgressEvent::cancelled(),
        ]);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_cancelled());
    }

    #[tokio::test]
    async fn test_stream_without_terminal_event_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(1);
        let mut stream = EventStream::new(rx);
        drop(tx);
        assert_eq!(stream.next().await, None);
        assert!(stream.is_finished());
    }
}
