//! Receive path for host frames: decode each delivered chunk and hand the
//! valid messages to the application over a bounded channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::decoder::FrameDecoder;
use super::frame::DecodedMessage;
use crate::serial::FrameConsumer;

/// Consumer registered with the host serial link
#[derive(Debug)]
pub struct HostReceiver {
    decoder: Arc<FrameDecoder>,
    messages: mpsc::Sender<DecodedMessage>,
    dropped: u64,
}

impl HostReceiver {
    /// Create a receiver forwarding into `messages`
    pub fn new(decoder: Arc<FrameDecoder>, messages: mpsc::Sender<DecodedMessage>) -> Self {
        Self {
            decoder,
            messages,
            dropped: 0,
        }
    }

    /// Messages decoded but not delivered because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

impl FrameConsumer for HostReceiver {
    fn on_frame_received(&mut self, buffer: &[u8], length: u16) {
        let message = match self.decoder.decode_frame(buffer, length) {
            Ok(message) => message,
            Err(e) => {
                debug!("Host chunk rejected: {}", e);
                return;
            }
        };

        if let Err(e) = self.messages.try_send(message) {
            self.dropped += 1;
            warn!(dropped = self.dropped, "Decoded host message not delivered: {}", e);
        }
    }
}
