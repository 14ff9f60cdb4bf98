//! Disruptor platform: a per-epoch token budget spent on jamming frequency
//! bins, informed by a delayed view of the environment.
//!
//! The bin-selection policy implemented in
//! [`DisruptorPlatform::get_disruptions`] is an intentionally weak baseline
//! so scenarios stay deterministic modulo a seed. It does not yet consult
//! `observed_env`; a smarter policy that leverages the observed snapshot is
//! future work.

use rand::seq::index::sample;
use rand::Rng;

use crate::emission::{Bins, DisruptionToken, Header, Emission, SourceType};
use crate::error::ConfigError;
use crate::platform::PlatformState;

/// A disruptor platform: spends a token budget each epoch jamming bins.
pub struct DisruptorPlatform<Id, P> {
    pub id: Id,
    pub state: PlatformState,
    pub max_tokens: u32,
    pub tokens_remaining: u32,
    pub num_bins: usize,
    pub steps_per_epoch: u64,
    /// Current observable comms platforms, recomputed by the environment at
    /// step boundaries.
    pub comms_dest_ids: Vec<Id>,
    /// The delayed snapshot of the emission grid most recently delivered by
    /// the environment. `None` until the first step.
    pub observed_env: Option<Bins<Id, P>>,
}

impl<Id: Clone, P> DisruptorPlatform<Id, P> {
    /// Construct a disruptor. Fails if `num_bins < 1` or
    /// `steps_per_epoch < 1`, matching the original's `DisruptorPlatform`
    /// constructor checks.
    pub fn new(
        id: Id,
        max_tokens: u32,
        num_bins: usize,
        steps_per_epoch: u64,
        state: PlatformState,
    ) -> Result<Self, ConfigError> {
        if num_bins < 1 {
            return Err(ConfigError::InvalidFrequencyBins(num_bins));
        }
        if steps_per_epoch < 1 {
            return Err(ConfigError::InvalidStepsPerEpoch(steps_per_epoch));
        }
        Ok(DisruptorPlatform {
            id,
            state,
            max_tokens,
            tokens_remaining: max_tokens,
            num_bins,
            steps_per_epoch,
            comms_dest_ids: Vec::new(),
            observed_env: None,
        })
    }

    /// Advance kinematics, then reset the token budget if the new
    /// `elapsed_steps` count starts a fresh epoch. The check runs after
    /// kinematics, so the reset lands on step calls 10, 20, 30, and so on
    /// for a 10-step epoch, visible before `get_disruptions` is called for
    /// this step.
    pub fn step(&mut self, delta_t: f64) {
        self.state.step(delta_t);
        if self.state.elapsed_steps % self.steps_per_epoch == 0 {
            self.tokens_remaining = self.max_tokens;
        }
    }

    /// Allocate this step's disruption tokens across the `num_bins`
    /// frequency bins, returning one slot per bin (`None` where unused).
    ///
    /// Baseline policy: spend `min(tokens_remaining, 1, num_bins)` tokens,
    /// placed into that many uniformly sampled, distinct bins.
    pub fn get_disruptions<R: Rng>(&mut self, rng: &mut R) -> Vec<Option<Emission<Id, P>>> {
        let n = self.tokens_remaining.min(1).min(self.num_bins as u32) as usize;
        debug_assert!(n as u32 <= self.tokens_remaining, "requested more tokens than remain");
        debug_assert!(n <= self.num_bins, "requested more tokens than there are bins");

        self.tokens_remaining -= n as u32;

        let mut tokens: Vec<Option<Emission<Id, P>>> = (0..self.num_bins).map(|_| None).collect();
        let chosen = sample(rng, self.num_bins, n);
        for bin_index in chosen.iter() {
            let header = Header {
                source_id: self.id.clone(),
                dest_ids: self.comms_dest_ids.clone(),
                source_type: SourceType::Disruptor,
                created_time: self.state.elapsed_time,
                emission_time: None,
                freq_bin: Some(bin_index),
                position: Some(self.state.pos),
            };
            tokens[bin_index] = Some(Emission::Disruption(DisruptionToken { header }));
        }
        tokens
    }
}
