//! At-most-once gate for the datagram transport.
//!
//! The device numbers its requests and retransmits a request until it sees a
//! response carrying the same index. The [`Sequencer`] makes those
//! retransmissions harmless: only the request with the expected index is
//! executed, anything else gets the cached response of the last executed one.
//!
//! ```text
//! nothing answered yet  -> adopt the index, Execute
//! seq == 0              -> reset, Execute (unless it repeats the one request answered)
//! seq == expected       -> Execute, then record() advances expected
//! otherwise             -> Resend(last response)
//! ```
//!
//! A device keeps counting across socket re-creation, so a session that
//! starts mid-sequence takes over the device's numbering instead of waiting
//! for index 0.

use bytes::Bytes;

/// What the connection loop should do with an arriving frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Dispatch the command, then call [`Sequencer::record`] with its response.
    Execute,
    /// Send these cached bytes again without executing anything.
    Resend(Bytes),
}

/// Last executed request and the response it produced.
#[derive(Debug, Clone)]
struct Exchange {
    request: Bytes,
    response: Bytes,
}

/// Per-session sequencing state.
#[derive(Debug, Default, Clone)]
pub struct Sequencer {
    expected_index: u32,
    last: Option<Exchange>,
}

impl Sequencer {
    /// Fresh state, ready to adopt the first index it sees.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next executed request must carry.
    pub fn expected_index(&self) -> u32 {
        self.expected_index
    }

    /// Most recently recorded response.
    pub fn last_response(&self) -> Option<&Bytes> {
        self.last.as_ref().map(|last| &last.response)
    }

    /// Decide whether `request`, numbered `sequence_index`, runs.
    ///
    /// Mismatched indices never change state.
    pub fn admit(&mut self, sequence_index: u32, request: &[u8]) -> Admission {
        let Some(last) = &self.last else {
            if sequence_index != self.expected_index {
                tracing::debug!("Adopting sequence index {}", sequence_index);
            }
            self.expected_index = sequence_index;
            return Admission::Execute;
        };

        if sequence_index == 0 {
            // Lost response to the very first request
            if self.expected_index == 1 && last.request[..] == *request {
                return Admission::Resend(last.response.clone());
            }
            if self.expected_index != 0 {
                tracing::debug!("Sequence restart (was expecting {})", self.expected_index);
            }
            self.expected_index = 0;
            return Admission::Execute;
        }

        if sequence_index == self.expected_index {
            return Admission::Execute;
        }

        tracing::debug!(
            "Out-of-sequence index {} (expecting {})",
            sequence_index,
            self.expected_index
        );
        Admission::Resend(last.response.clone())
    }

    /// Cache an executed request with its response and advance.
    pub fn record(&mut self, request: Bytes, response: Bytes) {
        self.last = Some(Exchange { request, response });
        self.expected_index = self.expected_index.wrapping_add(1);
    }

    /// Forget everything (peer went away).
    pub fn reset(&mut self) {
        self.expected_index = 0;
        self.last = None;
    }
}
