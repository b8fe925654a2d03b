//! Heart rate samples as an async [`Stream`].
//!
//! [`HeartRateStream`] bridges a [`HeartRateMonitor`]'s event feed to a
//! bounded channel. When the consumer falls behind and the buffer fills up,
//! the monitor is paused; it is started again once the consumer has drained
//! some samples. The stream ends when the monitor emits
//! [`DeviceEvent::End`] or when the stream is closed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::HeartRateMonitor;
use crate::error::{Error, Result};
use crate::events::{DeviceEvent, EventDispatcher, EventReceiver};
use crate::radio::Radio;

/// Options for heart rate streams.
///
/// ```
/// use hrm_core::StreamOptions;
///
/// let options = StreamOptions::builder()
///     .buffer_size(4)
///     .restart_on_disconnect(false)
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Samples buffered before the monitor is paused.
    /// Default: 16.
    pub buffer_size: usize,
    /// Start the monitor again after the peripheral drops the connection.
    /// Default: true.
    pub restart_on_disconnect: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: 16,
            restart_on_disconnect: true,
        }
    }
}

impl StreamOptions {
    pub fn builder() -> StreamOptionsBuilder {
        StreamOptionsBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid_config("buffer_size must be > 0"));
        }
        Ok(())
    }
}

/// Builder for StreamOptions.
#[derive(Debug, Clone, Default)]
pub struct StreamOptionsBuilder {
    options: StreamOptions,
}

impl StreamOptionsBuilder {
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.options.buffer_size = size;
        self
    }

    #[must_use]
    pub fn restart_on_disconnect(mut self, restart: bool) -> Self {
        self.options.restart_on_disconnect = restart;
        self
    }

    #[must_use]
    pub fn build(self) -> StreamOptions {
        self.options
    }
}

/// A stream of heart rate samples (beats per minute).
///
/// Every event other than [`DeviceEvent::Data`] is relayed to
/// [`HeartRateStream::events`] subscribers.
pub struct HeartRateStream {
    receiver: mpsc::Receiver<u8>,
    handle: tokio::task::JoinHandle<()>,
    cancel_token: CancellationToken,
    events: EventDispatcher,
}

impl HeartRateStream {
    /// Start `monitor` and stream its samples.
    pub async fn new<R: Radio>(
        monitor: Arc<HeartRateMonitor<R>>,
        options: StreamOptions,
    ) -> Result<Self> {
        options.validate()?;

        let (tx, rx) = mpsc::channel(options.buffer_size);
        let cancel_token = CancellationToken::new();
        let relay = EventDispatcher::default();
        let subscription = monitor.subscribe();
        monitor.start().await?;

        let handle = tokio::spawn(pump(
            monitor,
            subscription,
            tx,
            relay.clone(),
            cancel_token.clone(),
            options,
        ));

        Ok(Self {
            receiver: rx,
            handle,
            cancel_token,
            events: relay,
        })
    }

    /// Non-sample events from the underlying monitor.
    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Stop relaying. The monitor is left as it is.
    pub fn close(self) {
        self.cancel_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for HeartRateStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl Stream for HeartRateStream {
    type Item = u8;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn resume<R: Radio>(monitor: &HeartRateMonitor<R>) {
    if let Err(e) = monitor.start().await {
        warn!("Failed to start heart rate monitor: {}", e);
    }
}

async fn pump<R: Radio>(
    monitor: Arc<HeartRateMonitor<R>>,
    mut events: EventReceiver,
    tx: mpsc::Sender<u8>,
    relay: EventDispatcher,
    cancel_token: CancellationToken,
    options: StreamOptions,
) {
    let mut paused = false;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Stream cancelled, stopping gracefully");
                break;
            }
            permit = tx.reserve(), if paused => {
                if permit.is_err() {
                    break;
                }
                drop(permit);
                debug!("Buffer drained, resuming");
                paused = false;
                resume(&monitor).await;
            }
            event = events.recv() => match event {
                Ok(DeviceEvent::Data { bpm }) => match tx.try_send(bpm) {
                    Ok(()) => {
                        if tx.capacity() == 0 && !paused {
                            debug!("Buffer full, pausing");
                            paused = true;
                            if let Err(e) = monitor.pause().await {
                                warn!("Failed to pause heart rate monitor: {}", e);
                            }
                        }
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Buffer full, dropping {} bpm", bpm);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Stream receiver dropped, stopping");
                        break;
                    }
                },
                Ok(DeviceEvent::End) => {
                    relay.send(DeviceEvent::End);
                    break;
                }
                Ok(event @ DeviceEvent::Disconnected { .. }) => {
                    relay.send(event);
                    if options.restart_on_disconnect && !paused {
                        info!("Device disconnected, starting again");
                        resume(&monitor).await;
                    }
                }
                Ok(event) => relay.send(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
