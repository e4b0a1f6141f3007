//! Seam toward the internal bus. Routing itself lives outside this crate; all
//! the gateway sees is datagrams addressed to it.

use bytes::Bytes;

use crate::channel::Channel;

// -----------------------------------------------------------------------------
// ----- Datagram --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    recipients: Vec<Channel>,
    payload: Bytes,
}

impl Datagram {
    pub fn new(recipients: Vec<Channel>, payload: impl Into<Bytes>) -> Self {
        Self {
            recipients,
            payload: payload.into(),
        }
    }

    pub fn recipients(&self) -> &[Channel] {
        &self.recipients
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

// -----------------------------------------------------------------------------
// ----- BusIngress ------------------------------------------------------------

/// Delivery hook the bus calls for every datagram addressed to a participant.
pub trait BusIngress: Send + Sync {
    fn handle_datagram(&self, datagram: &Datagram);
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
