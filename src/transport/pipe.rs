//! In-memory duplex byte pipe for local two-peer simulation.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use super::{BytePort, LinkError};

/// One end of an in-memory duplex byte link.
///
/// Stands in for the physical serial connection when both peers run on the
/// same machine; the two ends may live on different threads. The link is
/// lossless and order-preserving, so packet loss has to be injected above
/// it (see the `sim` module).
#[derive(Debug)]
pub struct PipePort {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl PipePort {
    /// Create a connected pair of pipe ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl BytePort for PipePort {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.tx.send(bytes.to_vec()).map_err(|_| LinkError::Closed)
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, LinkError> {
        let mut appended = 0;
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => {
                    appended += chunk.len();
                    buf.extend(chunk);
                }
                Err(TryRecvError::Empty) => return Ok(appended),
                Err(TryRecvError::Disconnected) => {
                    // Deliver what we already drained; the next read
                    // reports the closed link.
                    if appended > 0 {
                        return Ok(appended);
                    }
                    return Err(LinkError::Closed);
                }
            }
        }
    }
}
