//! Medium access control: multiplexing comms platforms onto frequency bins.
//!
//! One coordinator currently manages the whole comms population.
//! Multi-coordinator routing over disjoint subsets is unsupported; see the
//! Open Question resolution in `DESIGN.md`.

use serde::{Deserialize, Serialize};

use crate::comms::CommsPlatform;
use crate::emission::Emission;
use crate::error::ConfigError;

/// The medium access control policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mac {
    #[serde(rename = "rr")]
    RoundRobin,
    #[serde(rename = "tdma")]
    Tdma,
    #[serde(rename = "fdma")]
    Fdma,
}

impl std::str::FromStr for Mac {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(Mac::RoundRobin),
            "tdma" => Ok(Mac::Tdma),
            "fdma" => Ok(Mac::Fdma),
            other => Err(ConfigError::UnknownMac(other.to_string())),
        }
    }
}

/// Coordinates a fixed, ordered group of comms platforms onto `num_bins`
/// frequency bins under one [`Mac`] policy.
pub struct Coordinator<Id> {
    platform_ids: Vec<Id>,
    num_bins: usize,
    mac: Mac,
    tdma_index: usize,
}

impl<Id: Clone + PartialEq> Coordinator<Id> {
    /// Construct a coordinator over `platform_ids`, validating the
    /// MAC-specific dimensional constraints up front so a bad configuration
    /// fails at construction rather than mid-run.
    pub fn new(platform_ids: Vec<Id>, num_bins: usize, mac: Mac) -> Result<Self, ConfigError> {
        if num_bins < 1 {
            return Err(ConfigError::InvalidFrequencyBins(num_bins));
        }
        match mac {
            Mac::Tdma if num_bins != 1 => {
                return Err(ConfigError::TdmaRequiresSingleBin { num_bins });
            }
            Mac::Fdma if num_bins < platform_ids.len() => {
                return Err(ConfigError::FdmaRequiresEnoughBins {
                    num_bins,
                    num_platforms: platform_ids.len(),
                });
            }
            _ => {}
        }
        Ok(Coordinator {
            platform_ids,
            num_bins,
            mac,
            tdma_index: 0,
        })
    }

    pub fn num_platforms(&self) -> usize {
        self.platform_ids.len()
    }

    /// Drain exactly one pending emission from each platform the policy
    /// selects this step, stamping `freq_bin` and `position` on every
    /// filled cell. Items left in a platform's tx queue stay at the head
    /// for the next step.
    pub fn step<P>(&mut self, platforms: &mut [CommsPlatform<Id, P>]) -> Vec<Option<Emission<Id, P>>> {
        debug_assert_eq!(platforms.len(), self.platform_ids.len());
        let mut bins: Vec<Option<Emission<Id, P>>> = (0..self.num_bins).map(|_| None).collect();

        match self.mac {
            Mac::RoundRobin => self.step_round_robin(platforms, &mut bins),
            Mac::Tdma => self.step_tdma(platforms, &mut bins),
            Mac::Fdma => self.step_fdma(platforms, &mut bins),
        }

        for (bin_index, cell) in bins.iter_mut().enumerate() {
            if let Some(emission) = cell {
                let source_index = self
                    .platform_ids
                    .iter()
                    .position(|candidate| *candidate == emission.header().source_id)
                    .expect("emission source must be one of this coordinator's platforms");
                emission.place(bin_index, platforms[source_index].position());
            }
        }

        bins
    }

    fn step_round_robin<P>(&mut self, platforms: &mut [CommsPlatform<Id, P>], bins: &mut [Option<Emission<Id, P>>]) {
        let mut index = 0;
        for platform in platforms.iter_mut() {
            if index == bins.len() {
                break;
            }
            if let Some(emission) = platform.get_data() {
                bins[index] = Some(emission);
                index += 1;
            }
        }
    }

    fn step_tdma<P>(&mut self, platforms: &mut [CommsPlatform<Id, P>], bins: &mut [Option<Emission<Id, P>>]) {
        bins[0] = platforms[self.tdma_index].get_data();
        self.tdma_index = (self.tdma_index + 1) % platforms.len();
    }

    fn step_fdma<P>(&mut self, platforms: &mut [CommsPlatform<Id, P>], bins: &mut [Option<Emission<Id, P>>]) {
        for (index, platform) in platforms.iter_mut().enumerate() {
            bins[index] = platform.get_data();
        }
    }
}
