//! A discrete-event simulator for RF communications: comms platforms
//! exchanging messages over a frequency-binned medium, disruptor platforms
//! jamming it, and a central environment that steps both in lock-step.
//!
//! ## Module organization
//!
//! - [`emission`]: the `Emission` sum type (`Packet`/`Ack`/`DisruptionToken`)
//!   and the shared frequency-bin grid type
//! - [`platform`]: kinematic state shared by every platform kind
//! - [`comms`]: `CommsPlatform`, bounded tx/rx queues, acks, message ids
//! - [`disruptor`]: `DisruptorPlatform`, epoch token budgets, bin jamming
//! - [`coordinator`]: medium access control (round robin, TDMA, FDMA)
//! - [`environment`]: the step loop, delay queue, and traffic statistics
//! - [`error`]: configuration and step-time error types
//!
//! The top-level entry point is [`environment::Environment`]; everything
//! else is a building block it owns and steps.

pub mod comms;
pub mod coordinator;
pub mod disruptor;
pub mod emission;
pub mod environment;
pub mod error;
pub mod platform;

pub use comms::CommsPlatform;
pub use coordinator::{Coordinator, Mac};
pub use disruptor::DisruptorPlatform;
pub use emission::{Ack, Bins, Cell, DisruptionToken, Emission, Header, Packet, Position, SourceType};
pub use environment::{Environment, EnvironmentConfig};
pub use error::{ConfigError, StepError};
pub use platform::PlatformState;
