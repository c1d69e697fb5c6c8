//! Bounded parameter spaces and the timing parameters tuned by default.

use rand::Rng;
use rand::RngExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    pub name: &'static str,
    pub low: f64,
    pub high: f64,
}

impl ParamBounds {
    pub const fn new(name: &'static str, low: f64, high: f64) -> Self {
        ParamBounds { name, low, high }
    }

    fn span(&self) -> f64 {
        self.high - self.low
    }
}

/// Recon and TTL timings, seconds.
pub const TIMING_BOUNDS: [ParamBounds; 5] = [
    ParamBounds::new("recon_time", 5.0, 120.0),
    ParamBounds::new("hop_recon_time", 2.0, 60.0),
    ParamBounds::new("min_recon_time", 1.0, 30.0),
    ParamBounds::new("ap_ttl", 30.0, 600.0),
    ParamBounds::new("sta_ttl", 30.0, 600.0),
];

/// A box of named parameters. The optimizer works on its unit cube.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpace {
    params: Vec<ParamBounds>,
}

impl ParamSpace {
    pub fn new(params: Vec<ParamBounds>) -> Self {
        ParamSpace { params }
    }

    pub fn timing() -> Self {
        ParamSpace::new(TIMING_BOUNDS.to_vec())
    }

    pub fn dim(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamBounds] {
        &self.params
    }

    /// Map a point into `[0, 1]^d`, clamping values outside the bounds.
    pub fn normalize(&self, x: &[f64]) -> Vec<f64> {
        self.params
            .iter()
            .zip(x)
            .map(|(p, v)| {
                if p.span() <= 0.0 {
                    0.0
                } else {
                    ((v - p.low) / p.span()).clamp(0.0, 1.0)
                }
            })
            .collect()
    }

    pub fn denormalize(&self, u: &[f64]) -> Vec<f64> {
        self.params
            .iter()
            .zip(u)
            .map(|(p, v)| p.low + v.clamp(0.0, 1.0) * p.span())
            .collect()
    }

    /// Uniform draw from the unit cube.
    pub fn sample_unit(&self, rng: &mut impl Rng) -> Vec<f64> {
        (0..self.dim()).map(|_| rng.random::<f64>()).collect()
    }
}

/// Timing parameters handed to the host after each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingParams {
    pub recon_time: f64,
    pub hop_recon_time: f64,
    pub min_recon_time: f64,
    pub ap_ttl: f64,
    pub sta_ttl: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        TimingParams {
            recon_time: 30.0,
            hop_recon_time: 10.0,
            min_recon_time: 5.0,
            ap_ttl: 120.0,
            sta_ttl: 300.0,
        }
    }
}

impl TimingParams {
    /// `None` unless `v` has exactly one value per timing parameter.
    pub fn from_slice(v: &[f64]) -> Option<Self> {
        match *v {
            [recon_time, hop_recon_time, min_recon_time, ap_ttl, sta_ttl] => Some(TimingParams {
                recon_time,
                hop_recon_time,
                min_recon_time,
                ap_ttl,
                sta_ttl,
            }),
            _ => None,
        }
    }

    /// Reset every field that is not inside its [`TIMING_BOUNDS`] entry to the
    /// default. Returns the names of the fields that were reset.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut values = self.to_vec();
        let mut reset = Vec::new();
        for ((v, default), bounds) in values
            .iter_mut()
            .zip(TimingParams::default().to_vec())
            .zip(&TIMING_BOUNDS)
        {
            if !(bounds.low..=bounds.high).contains(v) {
                *v = default;
                reset.push(bounds.name);
            }
        }
        if let Some(timing) = TimingParams::from_slice(&values) {
            *self = timing;
        }
        reset
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.recon_time,
            self.hop_recon_time,
            self.min_recon_time,
            self.ap_ttl,
            self.sta_ttl,
        ]
    }
}
