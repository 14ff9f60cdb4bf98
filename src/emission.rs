//! The `Emission` sum type: everything that can occupy a frequency bin.
//!
//! A [`Packet`], an [`Ack`], or a [`DisruptionToken`] share a common
//! [`Header`]. They are modeled here as a tagged union ([`Emission`]) rather
//! than three unrelated structs so the environment can switch on the variant
//! without downcasting, and so Ack discrimination on reception is an
//! explicit `match` arm instead of an `isinstance` check.

use std::rc::Rc;

/// Which kind of platform produced an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Comms,
    Disruptor,
}

/// Fields shared by every emission variant.
///
/// `emission_time`, `freq_bin`, and `position` start unset and are filled in
/// exactly once: `freq_bin`/`position` by the coordinator or disruptor at
/// the moment the emission is placed into a bin, `emission_time` by the
/// environment shortly after. After that single mutation an emission is
/// never mutated again.
#[derive(Debug, Clone)]
pub struct Header<Id> {
    pub source_id: Id,
    pub dest_ids: Vec<Id>,
    pub source_type: SourceType,
    pub created_time: f64,
    pub emission_time: Option<f64>,
    pub freq_bin: Option<usize>,
    pub position: Option<Position>,
}

/// A 3-vector position, velocity, or acceleration component set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }
}

/// A data-carrying information unit transmitted from one comms platform to
/// one or more others.
#[derive(Debug, Clone)]
pub struct Packet<Id, P> {
    pub header: Header<Id>,
    pub payload: P,
    pub msg_id: u64,
}

/// An acknowledgement of a previously received [`Packet`].
///
/// Structurally a `Packet` whose payload is the acknowledged message's
/// `msg_id` rather than a user payload, and whose `dest_ids` is always the
/// single-element list `[original_source]`.
#[derive(Debug, Clone)]
pub struct Ack<Id> {
    pub header: Header<Id>,
    pub acked_msg_id: u64,
    pub msg_id: u64,
}

/// A disruptor's interference unit. Carries no payload and no message id.
#[derive(Debug, Clone)]
pub struct DisruptionToken<Id> {
    pub header: Header<Id>,
}

/// Anything that can be placed into a frequency bin.
#[derive(Debug, Clone)]
pub enum Emission<Id, P> {
    Packet(Packet<Id, P>),
    Ack(Ack<Id>),
    Disruption(DisruptionToken<Id>),
}

impl<Id, P> Emission<Id, P> {
    pub fn header(&self) -> &Header<Id> {
        match self {
            Emission::Packet(p) => &p.header,
            Emission::Ack(a) => &a.header,
            Emission::Disruption(d) => &d.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header<Id> {
        match self {
            Emission::Packet(p) => &mut p.header,
            Emission::Ack(a) => &mut a.header,
            Emission::Disruption(d) => &mut d.header,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.header().source_type
    }

    pub fn is_disruption(&self) -> bool {
        matches!(self, Emission::Disruption(_))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Emission::Ack(_))
    }

    /// Stamp the bin index and emitter position at placement time.
    pub fn place(&mut self, freq_bin: usize, position: Position) {
        let header = self.header_mut();
        header.freq_bin = Some(freq_bin);
        header.position = Some(position);
    }

    /// Stamp the time this emission was placed on the medium. Performed
    /// exactly once, by the environment, before any reader sees the cell.
    pub fn set_emission_time(&mut self, time: f64) {
        self.header_mut().emission_time = Some(time);
    }
}

/// One cell of the emission grid: empty, or a shared, immutable-after-place
/// emission record. `Rc` gives the environment's structural-copy-only
/// snapshot sharing for free. Cloning a cell clones the `Rc` handle, not
/// the emission.
pub type Cell<Id, P> = Option<Rc<Emission<Id, P>>>;

/// A full emission grid: one row per coordinator/disruptor, `num_bins`
/// columns per row.
pub type Bins<Id, P> = Vec<Vec<Cell<Id, P>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_accessors_dispatch_by_variant() {
        let header = Header {
            source_id: 1u32,
            dest_ids: vec![2, 3],
            source_type: SourceType::Comms,
            created_time: 0.0,
            emission_time: None,
            freq_bin: None,
            position: None,
        };
        let mut emission: Emission<u32, f64> = Emission::Packet(Packet {
            header,
            payload: 0.7,
            msg_id: 1,
        });

        assert_eq!(emission.source_type(), SourceType::Comms);
        assert!(!emission.is_disruption());

        emission.place(4, Position::new(1.0, 2.0, 3.0));
        assert_eq!(emission.header().freq_bin, Some(4));
        emission.set_emission_time(0.25);
        assert_eq!(emission.header().emission_time, Some(0.25));
    }

    #[test]
    fn disruption_token_has_no_payload_or_msg_id() {
        let token: Emission<&str, ()> = Emission::Disruption(DisruptionToken {
            header: Header {
                source_id: "d1",
                dest_ids: vec!["c1", "c2"],
                source_type: SourceType::Disruptor,
                created_time: 0.0,
                emission_time: None,
                freq_bin: None,
                position: None,
            },
        });
        assert!(token.is_disruption());
        assert_eq!(token.header().dest_ids, vec!["c1", "c2"]);
    }
}
