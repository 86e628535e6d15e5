//! Control channel with a periodic heartbeat

use super::InboundRouter;
use crate::peer::PeerHandle;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

/// Elapsed-time bookkeeping for the ping loop.
///
/// The first tick stamps 0 and anchors the epoch; later ticks stamp
/// milliseconds since that first tick, so successive stamps never decrease.
pub(crate) struct HeartbeatState {
    started: Option<Instant>,
}

impl HeartbeatState {
    pub(crate) fn new() -> Self {
        Self { started: None }
    }

    pub(crate) fn stamp(&mut self) -> u64 {
        match self.started {
            None => {
                self.started = Some(Instant::now());
                0
            }
            Some(epoch) => epoch.elapsed().as_millis() as u64,
        }
    }
}

/// The session's control channel.
///
/// Opens a data channel on the peer transport with ordered delivery
/// requested, starts a ping timer once the channel opens, and routes inbound
/// payloads. The timer lives in its own task; the session owns it through
/// this handle and cancels it as the first teardown step.
pub struct HeartbeatChannel {
    channel: Arc<RTCDataChannel>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HeartbeatChannel {
    /// Label of the control channel, matching the server's expectation
    pub const CHANNEL_LABEL: &'static str = "chat";

    /// Open the control channel on `handle`
    pub(crate) async fn open(
        handle: &PeerHandle,
        interval: Duration,
        router: Arc<InboundRouter>,
    ) -> Result<Self> {
        // Ordered delivery is a preference, not a transport requirement
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };

        let channel = handle
            .connection()
            .create_data_channel(Self::CHANNEL_LABEL, Some(init))
            .await
            .map_err(|e| Error::DataChannel(format!("Failed to create control channel: {}", e)))?;

        let timer: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));

        {
            // Weak reference: the handler lives inside the channel, so a
            // strong capture would keep the channel alive forever.
            let dc = Arc::downgrade(&channel);
            let timer = Arc::clone(&timer);
            channel.on_open(Box::new(move || {
                let dc = dc.clone();
                let timer = Arc::clone(&timer);
                Box::pin(async move {
                    let Some(dc) = dc.upgrade() else { return };
                    debug!(label = %dc.label(), "control channel open");
                    let task = tokio::spawn(Self::ping_loop(dc, interval));
                    if let Some(previous) = timer.lock().unwrap().replace(task) {
                        previous.abort();
                    }
                })
            }));
        }

        {
            let timer = Arc::clone(&timer);
            channel.on_close(Box::new(move || {
                let timer = Arc::clone(&timer);
                Box::pin(async move {
                    debug!("control channel closed");
                    if let Some(task) = timer.lock().unwrap().take() {
                        task.abort();
                    }
                })
            }));
        }

        channel.on_error(Box::new(move |err| {
            Box::pin(async move {
                error!("control channel error: {}", err);
            })
        }));

        super::attach_inbound(&channel, router);

        Ok(Self { channel, timer })
    }

    /// Periodic ping sender.
    ///
    /// The stamp is taken every tick so the elapsed epoch stays anchored to
    /// the first tick; a channel that is not open skips the send, not the
    /// stamp.
    async fn ping_loop(channel: Arc<RTCDataChannel>, interval: Duration) {
        let mut heartbeat = HeartbeatState::new();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            ticker.tick().await;

            let message = format!("ping {}", heartbeat.stamp());

            if channel.ready_state() != RTCDataChannelState::Open {
                continue;
            }

            if let Err(e) = channel.send_text(message).await {
                debug!("heartbeat send failed: {}", e);
            }
        }
    }

    /// Cancel the ping timer; a no-op when it never started or was already
    /// cancelled
    pub fn cancel_timer(&self) {
        if let Some(task) = self.timer.lock().unwrap().take() {
            debug!("cancelling heartbeat timer");
            task.abort();
        }
    }

    /// True while the ping timer task is installed
    pub fn timer_running(&self) -> bool {
        self.timer.lock().unwrap().is_some()
    }

    /// Close the underlying data channel
    pub async fn close(&self) -> Result<()> {
        self.channel
            .close()
            .await
            .map_err(|e| Error::DataChannel(format!("Failed to close control channel: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stamp_is_zero() {
        let mut state = HeartbeatState::new();
        assert_eq!(state.stamp(), 0);
    }

    #[test]
    fn test_stamps_are_monotonic() {
        let mut state = HeartbeatState::new();
        let mut previous = state.stamp();

        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(2));
            let next = state.stamp();
            assert!(next >= previous);
            previous = next;
        }

        assert!(previous >= 2);
    }
}
