//! Communications platform: bounded tx/rx queues, acknowledgements, and
//! monotonic message ids.
//!
//! The disruption-as-batch-kill rule in
//! [`CommsPlatform::put_data`] is the one piece of this module that is easy
//! to get wrong: a single [`DisruptionToken`](crate::emission::DisruptionToken)
//! anywhere in the inbound batch discards the *entire* batch for the step,
//! not just the bin it occupied.

use std::collections::VecDeque;

use crate::emission::{Ack, Emission, Header, Packet, Position, SourceType};
use crate::error::ConfigError;
use crate::platform::PlatformState;

/// A communications platform: transmits and receives user payloads,
/// optionally acknowledging receipt.
pub struct CommsPlatform<Id, P> {
    pub id: Id,
    pub state: PlatformState,
    /// Current outbound neighbors, recomputed by the environment at step
    /// boundaries from its adjacency matrix.
    pub dest_ids: Vec<Id>,
    pub do_ack: bool,
    tx_queue: VecDeque<Emission<Id, P>>,
    rx_queue: VecDeque<P>,
    max_size: usize,
    next_msg_id: u64,
}

impl<Id: Clone, P> CommsPlatform<Id, P> {
    /// Construct a platform with the given bounded queue capacity.
    ///
    /// Fails with [`ConfigError::InvalidQueueCapacity`] if `max_size < 1`,
    /// matching `CommsPlatform.__init__`'s `ValueError` in the original
    /// implementation.
    pub fn new(id: Id, max_size: usize, do_ack: bool, state: PlatformState) -> Result<Self, ConfigError> {
        if max_size < 1 {
            return Err(ConfigError::InvalidQueueCapacity(max_size));
        }
        Ok(CommsPlatform {
            id,
            state,
            dest_ids: Vec::new(),
            do_ack,
            tx_queue: VecDeque::new(),
            rx_queue: VecDeque::new(),
            max_size,
            next_msg_id: 1,
        })
    }

    /// Advance this platform's kinematics by `delta_t` seconds.
    pub fn step(&mut self, delta_t: f64) {
        self.state.step(delta_t);
    }

    fn next_msg_id(&mut self) -> u64 {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        id
    }

    fn enqueue_tx(&mut self, emission: Emission<Id, P>)
    where
        Id: std::fmt::Debug,
    {
        if self.tx_queue.len() >= self.max_size {
            log::warn!("tx queue for platform {:?} is full, dropping packet", self.id);
            return;
        }
        self.tx_queue.push_back(emission);
    }

    /// Enqueue `payload` for transmission to `dest_ids`. Destinations are
    /// not validated against connectivity. An unreachable destination
    /// simply fails to receive anything downstream.
    pub fn tx_data(&mut self, payload: P, dest_ids: Vec<Id>)
    where
        P: Clone,
        Id: std::fmt::Debug,
    {
        let msg_id = self.next_msg_id();
        let header = Header {
            source_id: self.id.clone(),
            dest_ids,
            source_type: SourceType::Comms,
            created_time: self.state.elapsed_time,
            emission_time: None,
            freq_bin: None,
            position: None,
        };
        let packet = Packet {
            header,
            payload: payload.clone(),
            msg_id,
        };
        self.enqueue_tx(Emission::Packet(packet));
    }

    /// Pop the next received payload, or `None` if the receive queue is
    /// empty. Returns an independent copy of the stored payload.
    pub fn rx_data(&mut self) -> Option<P>
    where
        P: Clone,
    {
        self.rx_queue.pop_front()
    }

    /// Coordinator-facing: pop the next emission ready for transmission.
    pub fn get_data(&mut self) -> Option<Emission<Id, P>> {
        self.tx_queue.pop_front()
    }

    /// Environment-facing: deliver one step's worth of inbound emissions.
    ///
    /// If any element is a disruption token, the entire batch is dropped.
    /// Otherwise acks are silently discarded, packets are enqueued to the
    /// receive queue (dropped with a warning on overflow), and an
    /// acknowledgement is transmitted back if `do_ack` is set.
    pub fn put_data(&mut self, emissions: Vec<Emission<Id, P>>)
    where
        P: Clone,
        Id: std::fmt::Debug,
    {
        if emissions.iter().any(Emission::is_disruption) {
            return;
        }

        for emission in emissions {
            let packet = match emission {
                Emission::Packet(p) => p,
                Emission::Ack(_) | Emission::Disruption(_) => continue,
            };

            if self.rx_queue.len() >= self.max_size {
                log::warn!("rx queue for platform {:?} is full, dropping packet", self.id);
                continue;
            }
            self.rx_queue.push_back(packet.payload.clone());

            if self.do_ack {
                let msg_id = self.next_msg_id();
                let header = Header {
                    source_id: self.id.clone(),
                    dest_ids: vec![packet.header.source_id.clone()],
                    source_type: SourceType::Comms,
                    created_time: self.state.elapsed_time,
                    emission_time: None,
                    freq_bin: None,
                    position: None,
                };
                let ack = Ack {
                    header,
                    acked_msg_id: packet.msg_id,
                    msg_id,
                };
                self.enqueue_tx(Emission::Ack(ack));
            }
        }
    }

    #[cfg(test)]
    fn tx_queue_len(&self) -> usize {
        self.tx_queue.len()
    }

    #[cfg(test)]
    fn rx_queue_len(&self) -> usize {
        self.rx_queue.len()
    }

    /// The platform's current position, used by the coordinator to stamp
    /// placed emissions.
    pub(crate) fn position(&self) -> Position {
        self.state.pos
    }
}
