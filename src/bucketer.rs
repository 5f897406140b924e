//! Deterministic assignment of users to experiment variations.
//!
//! A user's bucket is derived from a murmur hash of `user_id` + parent
//! entity id, scaled into `[0, 10_000)`. Mutually exclusive groups apply
//! their own traffic allocation first (hashing against the group id) and
//! only then is the variation chosen (hashing against the experiment id),
//! so a user lands in at most one experiment of a group.

use crate::hashing::murmurhash3_x86_32;
use crate::logging::{messages, DecisionLogger};
use crate::models::{Experiment, GroupPolicy, ProjectConfig, TrafficAllocation, Variation};

/// Seed shared by every client implementation.
pub const HASH_SEED: u32 = 1;

/// Traffic allocations partition `[0, MAX_TRAFFIC_VALUE)`.
pub const MAX_TRAFFIC_VALUE: u32 = 10_000;

const MAX_HASH_VALUE: f64 = 4_294_967_296.0; // 2^32

/// Maps a bucketing id to a bucket value in `[0, MAX_TRAFFIC_VALUE)`.
///
/// The default source is the pinned murmur hash; tests substitute
/// scripted sources to drive allocation edges that real hashing cannot
/// reach.
pub trait BucketValueSource {
    fn bucket_value(&self, bucketing_id: &str) -> u32;
}

/// Production source: murmur hash scaled into the traffic range.
#[derive(Debug, Clone, Copy, Default)]
pub struct MurmurBucketValueSource;

impl BucketValueSource for MurmurBucketValueSource {
    fn bucket_value(&self, bucketing_id: &str) -> u32 {
        let hash = murmurhash3_x86_32(bucketing_id.as_bytes(), HASH_SEED);
        let ratio = f64::from(hash) / MAX_HASH_VALUE;
        (ratio * f64::from(MAX_TRAFFIC_VALUE)).floor() as u32
    }
}

/// Buckets users into experiment variations.
pub struct Bucketer<'a, S: BucketValueSource = MurmurBucketValueSource> {
    config: &'a ProjectConfig,
    source: S,
}

impl<'a> Bucketer<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self {
            config,
            source: MurmurBucketValueSource,
        }
    }
}

impl<'a, S: BucketValueSource> Bucketer<'a, S> {
    pub fn with_source(config: &'a ProjectConfig, source: S) -> Self {
        Self { config, source }
    }

    /// Bucket `user_id` into a variation of `experiment`.
    ///
    /// Returns `None` when the user falls outside the experiment's traffic,
    /// when the group's allocation selects a different experiment, or when
    /// a forced-variation key does not resolve. The forced-variation path
    /// never hashes.
    pub fn bucket<'e, L: DecisionLogger>(
        &self,
        experiment: &'e Experiment,
        user_id: &str,
        logger: &L,
    ) -> Option<&'e Variation> {
        if let Some(forced_key) = experiment.forced_variations.get(user_id) {
            let variation = experiment.variation_by_key(forced_key);
            if let Some(variation) = variation {
                logger.info(&messages::user_forced_in_variation(user_id, &variation.key));
            }
            return variation;
        }

        if let Some(group) = experiment
            .group_id
            .as_deref()
            .and_then(|group_id| self.config.group(group_id))
        {
            if group.policy == GroupPolicy::Random {
                let chosen =
                    self.find_bucket(user_id, &group.id, &group.traffic_allocation, logger);
                match chosen {
                    None => {
                        logger.info(&messages::user_in_no_experiment(user_id));
                        return None;
                    }
                    Some(experiment_id) if experiment_id != experiment.id => {
                        logger.info(&messages::user_not_in_experiment_of_group(
                            user_id,
                            &experiment.key,
                            &group.id,
                        ));
                        return None;
                    }
                    Some(_) => {
                        logger.info(&messages::user_in_experiment_of_group(
                            user_id,
                            &experiment.key,
                            &group.id,
                        ));
                    }
                }
            }
        }

        let variation = self
            .find_bucket(user_id, &experiment.id, &experiment.traffic_allocation, logger)
            .and_then(|variation_id| experiment.variation_by_id(variation_id));
        match variation {
            Some(variation) => {
                logger.info(&messages::user_in_variation(
                    user_id,
                    &variation.key,
                    &experiment.key,
                ));
                Some(variation)
            }
            None => {
                logger.info(&messages::user_in_no_variation(user_id));
                None
            }
        }
    }

    /// Hash the user against `parent_id` and resolve the owning entity of
    /// the resulting bucket, if any.
    ///
    /// `traffic_allocations` must be ordered by ascending `end_of_range`;
    /// each entry owns `[previous_end, end_of_range)`.
    pub fn find_bucket<'t, L: DecisionLogger>(
        &self,
        user_id: &str,
        parent_id: &str,
        traffic_allocations: &'t [TrafficAllocation],
        logger: &L,
    ) -> Option<&'t str> {
        let bucketing_id = format!("{user_id}{parent_id}");
        let bucket_value = self.source.bucket_value(&bucketing_id);
        logger.debug(&messages::assigned_bucket(bucket_value, user_id));

        traffic_allocations
            .iter()
            .find(|allocation| allocation.end_of_range > bucket_value)
            .map(|allocation| allocation.entity_id.as_str())
    }

    /// The bucket value for a fully formed bucketing id.
    pub fn generate_bucket_value(&self, bucketing_id: &str) -> u32 {
        self.source.bucket_value(bucketing_id)
    }
}
