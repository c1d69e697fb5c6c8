//! Bayesian optimisation of timing parameters.
//!
//! Each epoch the host reports the reward earned with the current timing
//! parameters ([`BayesianOptimizer::observe`]) and asks what to try next
//! ([`BayesianOptimizer::suggest`]). The first suggestions are uniform random
//! draws. After that a Gaussian process is fitted over the stored
//! observations and the best of a batch of random candidates under the
//! acquisition function is returned.
//!
//! Fitting costs O(n³) in the number of stored observations, so the store is
//! a bounded FIFO. Its capacity is the deployment knob trading fit quality for
//! wall-clock time per epoch.

pub mod gp;
pub mod linalg;
pub mod space;

use std::collections::VecDeque;

use quanta::Instant;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use gp::{FittedGp, GaussianProcess, RbfKernel};
pub use linalg::{Cholesky, LinalgError, Matrix};
pub use space::{ParamBounds, ParamSpace, TimingParams};

/// EI below this is treated as "nothing left to gain".
const MIN_USEFUL_EI: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    ExpectedImprovement { xi: f64 },
    UpperConfidenceBound { kappa: f64 },
}

impl Default for Acquisition {
    fn default() -> Self {
        Acquisition::ExpectedImprovement { xi: 0.01 }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Observation capacity; oldest evicted first.
    pub max_observations: usize,
    /// Suggestions drawn uniformly before the GP is consulted.
    pub initial_random: usize,
    /// Random candidates scored per model-based suggestion.
    pub candidates: usize,
    pub acquisition: Acquisition,
    pub gp: GaussianProcess,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_observations: 80,
            initial_random: 10,
            candidates: 200,
            acquisition: Acquisition::default(),
            gp: GaussianProcess::default(),
        }
    }
}

/// A parameter vector (unit cube) and the reward it earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub params: Vec<f64>,
    pub reward: f64,
}

/// Persisted optimizer state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub observations: Vec<Observation>,
    pub best: Option<Observation>,
    pub suggestions: u64,
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    Random,
    Model,
}

#[derive(Debug, Clone)]
pub struct BayesianOptimizer {
    space: ParamSpace,
    config: OptimizerConfig,
    observations: VecDeque<Observation>,
    best: Option<Observation>,
    suggestions: u64,
    last_source: SuggestionSource,
}

impl BayesianOptimizer {
    pub fn new(space: ParamSpace, mut config: OptimizerConfig) -> Self {
        config.max_observations = config.max_observations.max(2);
        config.candidates = config.candidates.max(1);
        BayesianOptimizer {
            space,
            observations: VecDeque::with_capacity(config.max_observations),
            config,
            best: None,
            suggestions: 0,
            last_source: SuggestionSource::Random,
        }
    }

    pub fn restore(space: ParamSpace, config: OptimizerConfig, state: OptimizerState) -> Self {
        let mut opt = BayesianOptimizer::new(space, config);
        let dim = opt.space.dim();
        let valid = |o: &Observation| o.params.len() == dim && o.reward.is_finite();
        let kept: Vec<Observation> = state.observations.into_iter().filter(valid).collect();
        let skip = kept.len().saturating_sub(opt.config.max_observations);
        opt.observations.extend(kept.into_iter().skip(skip));
        opt.best = state.best.filter(valid);
        opt.suggestions = state.suggestions;
        opt
    }

    pub fn state(&self) -> OptimizerState {
        OptimizerState {
            observations: self.observations.iter().cloned().collect(),
            best: self.best.clone(),
            suggestions: self.suggestions,
        }
    }

    pub fn space(&self) -> &ParamSpace {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.max_observations
    }

    /// Stored observations, oldest first, in unit-cube coordinates.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Best parameters ever observed (in parameter units) and their reward.
    /// Survives eviction of the observation itself.
    pub fn best(&self) -> Option<(Vec<f64>, f64)> {
        self.best
            .as_ref()
            .map(|o| (self.space.denormalize(&o.params), o.reward))
    }

    pub fn last_source(&self) -> SuggestionSource {
        self.last_source
    }

    /// Record the reward earned with `params` (parameter units).
    pub fn observe(&mut self, params: &[f64], reward: f64) {
        if params.len() != self.space.dim() {
            warn!(
                expected = self.space.dim(),
                got = params.len(),
                "ignoring observation with wrong dimension"
            );
            return;
        }
        if !reward.is_finite() {
            warn!(reward, "ignoring non-finite reward");
            return;
        }
        let obs = Observation {
            params: self.space.normalize(params),
            reward,
        };
        if self.best.as_ref().is_none_or(|b| reward > b.reward) {
            self.best = Some(obs.clone());
        }
        while self.observations.len() >= self.config.max_observations {
            self.observations.pop_front();
        }
        self.observations.push_back(obs);
    }

    /// Next parameters to try, in parameter units.
    pub fn suggest(&mut self, rng: &mut impl Rng) -> Vec<f64> {
        let call = self.suggestions;
        self.suggestions = self.suggestions.saturating_add(1);

        if call < self.config.initial_random as u64 || self.observations.len() < 2 {
            return self.random_suggestion(rng);
        }

        let xs: Vec<Vec<f64>> = self.observations.iter().map(|o| o.params.clone()).collect();
        let ys: Vec<f64> = self.observations.iter().map(|o| o.reward).collect();

        let start = Instant::now();
        let fitted = match self.config.gp.fit(&xs, &ys) {
            Ok(fitted) => fitted,
            Err(e) => {
                warn!(error = %e, observations = xs.len(), "GP fit failed, exploring at random");
                return self.random_suggestion(rng);
            }
        };
        debug!(
            observations = xs.len(),
            jitter = fitted.jitter,
            fit_us = start.elapsed().as_micros() as u64,
            "GP fitted"
        );

        let best_reward = self
            .best
            .as_ref()
            .map_or_else(|| ys.iter().copied().fold(f64::MIN, f64::max), |b| b.reward);

        let mut best: Option<(Vec<f64>, f64)> = None;
        for _ in 0..self.config.candidates {
            let candidate = self.space.sample_unit(rng);
            let (mean, var) = fitted.predict(&candidate);
            let score = acquisition_score(self.config.acquisition, mean, var.sqrt(), best_reward);
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score))
                if !matches!(self.config.acquisition, Acquisition::ExpectedImprovement { .. })
                    || score >= MIN_USEFUL_EI =>
            {
                self.last_source = SuggestionSource::Model;
                self.space.denormalize(&candidate)
            }
            _ => {
                debug!("no candidate with useful expected improvement, exploring at random");
                self.random_suggestion(rng)
            }
        }
    }

    fn random_suggestion(&mut self, rng: &mut impl Rng) -> Vec<f64> {
        self.last_source = SuggestionSource::Random;
        let u = self.space.sample_unit(rng);
        self.space.denormalize(&u)
    }
}

fn acquisition_score(acq: Acquisition, mean: f64, std: f64, best: f64) -> f64 {
    match acq {
        Acquisition::UpperConfidenceBound { kappa } => mean + kappa * std,
        Acquisition::ExpectedImprovement { xi } => {
            let improvement = mean - best - xi;
            if std <= 1e-12 {
                return improvement.max(0.0);
            }
            let z = improvement / std;
            improvement * normal_cdf(z) + std * normal_pdf(z)
        }
    }
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn line_space() -> ParamSpace {
        ParamSpace::new(vec![ParamBounds::new("x", 0.0, 10.0)])
    }

    fn optimizer(max: usize, initial: usize) -> BayesianOptimizer {
        BayesianOptimizer::new(
            line_space(),
            OptimizerConfig {
                max_observations: max,
                initial_random: initial,
                ..OptimizerConfig::default()
            },
        )
    }

    #[test]
    fn fifo_eviction_by_identity() {
        let max = 10;
        let mut opt = optimizer(max, 0);
        for i in 0..(max + 5) {
            opt.observe(&[i as f64 * 0.5], i as f64);
        }
        assert_eq!(opt.len(), max);
        let rewards: Vec<f64> = opt.observations().map(|o| o.reward).collect();
        let expected: Vec<f64> = (5..(max + 5)).map(|i| i as f64).collect();
        assert_eq!(rewards, expected);
    }

    #[test]
    fn best_survives_eviction() {
        let mut opt = optimizer(3, 0);
        opt.observe(&[4.0], 9.0);
        for i in 0..5 {
            opt.observe(&[i as f64], 1.0);
        }
        assert!(opt.observations().all(|o| o.reward < 9.0));
        let (params, reward) = opt.best().unwrap();
        assert_eq!(reward, 9.0);
        assert!((params[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn initial_suggestions_are_random() {
        let mut opt = optimizer(20, 3);
        for i in 0..5 {
            opt.observe(&[i as f64], i as f64);
        }
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..3 {
            opt.suggest(&mut rng);
            assert_eq!(opt.last_source(), SuggestionSource::Random);
        }
        opt.suggest(&mut rng);
        assert_eq!(opt.last_source(), SuggestionSource::Model);
    }

    #[test]
    fn too_few_observations_fall_back_to_random() {
        let mut opt = optimizer(20, 0);
        let mut rng = StdRng::seed_from_u64(5);
        opt.observe(&[1.0], 1.0);
        let x = opt.suggest(&mut rng);
        assert_eq!(opt.last_source(), SuggestionSource::Random);
        assert!((0.0..=10.0).contains(&x[0]));
    }

    #[test]
    fn model_moves_toward_the_optimum() {
        // Reward peaks at x = 7.
        let f = |x: f64| -(x - 7.0).powi(2) / 10.0;
        let mut opt = optimizer(40, 0);
        for x in [0.0, 2.5, 5.0, 6.0, 8.0, 10.0] {
            opt.observe(&[x], f(x));
        }
        let mut rng = StdRng::seed_from_u64(11);
        let mut last = Vec::new();
        for _ in 0..15 {
            let x = opt.suggest(&mut rng);
            opt.observe(&x, f(x[0]));
            last = x;
        }
        let (best, _) = opt.best().unwrap();
        assert!((best[0] - 7.0).abs() < 1.0, "best {best:?}, last {last:?}");
    }

    #[test]
    fn ucb_prefers_unexplored_regions() {
        let mut opt = BayesianOptimizer::new(
            line_space(),
            OptimizerConfig {
                initial_random: 0,
                acquisition: Acquisition::UpperConfidenceBound { kappa: 2.0 },
                ..OptimizerConfig::default()
            },
        );
        // Flat reward, all samples in the left tenth of the domain.
        for x in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
            opt.observe(&[x], 0.0);
        }
        let mut rng = StdRng::seed_from_u64(3);
        let x = opt.suggest(&mut rng);
        assert_eq!(opt.last_source(), SuggestionSource::Model);
        assert!(x[0] > 2.0, "suggested {x:?}");
    }

    #[test]
    fn invalid_observations_ignored() {
        let mut opt = optimizer(5, 0);
        opt.observe(&[1.0, 2.0], 1.0);
        opt.observe(&[1.0], f64::NAN);
        assert!(opt.is_empty());
    }

    #[test]
    fn state_roundtrip_respects_capacity() {
        let mut opt = optimizer(10, 0);
        for i in 0..10 {
            opt.observe(&[i as f64], i as f64);
        }
        let state = opt.state();
        let json = serde_json::to_string(&state).unwrap();
        let back: OptimizerState = serde_json::from_str(&json).unwrap();
        let smaller = BayesianOptimizer::restore(
            line_space(),
            OptimizerConfig {
                max_observations: 4,
                ..OptimizerConfig::default()
            },
            back,
        );
        assert_eq!(smaller.len(), 4);
        let rewards: Vec<f64> = smaller.observations().map(|o| o.reward).collect();
        assert_eq!(rewards, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(smaller.best().unwrap().1, 9.0);
    }

    #[test]
    fn erf_matches_reference_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
    }

    #[test]
    fn expected_improvement_is_non_negative() {
        let acq = Acquisition::default();
        for (mean, std) in [(0.0, 1.0), (-5.0, 0.1), (2.0, 0.0), (-1.0, 0.0)] {
            assert!(acquisition_score(acq, mean, std, 1.0) >= 0.0);
        }
    }
}
