//! Beta posterior sampling.
//!
//! A Beta draw is the ratio of two unit-scale Gamma draws. Pseudo-counts are
//! fractional (warm-start priors), so Gamma shapes below 1 occur.

use rand::Rng;
use rand::RngExt;

/// Parameters of a Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaParams {
    /// Success pseudo-count (α).
    pub alpha: f64,
    /// Failure pseudo-count (β).
    pub beta: f64,
}

impl BetaParams {
    /// Uninformative prior: Beta(1, 1) = uniform.
    pub fn uninformative() -> Self {
        BetaParams {
            alpha: 1.0,
            beta: 1.0,
        }
    }

    /// Posterior after `successes` and `failures` on top of Beta(1, 1).
    pub fn posterior(successes: f64, failures: f64) -> Self {
        BetaParams {
            alpha: 1.0 + successes.max(0.0),
            beta: 1.0 + failures.max(0.0),
        }
    }

    /// Expected value E[X] = α / (α + β).
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Draw `X / (X + Y)` with `X ~ Gamma(α)` and `Y ~ Gamma(β)`.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        let x = Gamma::new(self.alpha).draw(rng);
        let y = Gamma::new(self.beta).draw(rng);
        let total = x + y;
        if total > 0.0 { x / total } else { 0.5 }
    }
}

/// Unit-scale Gamma sampler: squeeze-and-reject on a cubed normal. A shape
/// below 1 draws from `shape + 1` and scales by `U^(1/shape)`.
struct Gamma {
    d: f64,
    c: f64,
    boost: Option<f64>,
}

impl Gamma {
    fn new(shape: f64) -> Self {
        // Non-positive or NaN shapes collapse to draws of 0.
        let shape = if shape > 0.0 { shape } else { f64::MIN_POSITIVE };
        let (base, boost) = if shape < 1.0 {
            (shape + 1.0, Some(shape.recip()))
        } else {
            (shape, None)
        };
        let d = base - 1.0 / 3.0;
        Gamma {
            d,
            c: (9.0 * d).sqrt().recip(),
            boost,
        }
    }

    fn draw(&self, rng: &mut impl Rng) -> f64 {
        let g = loop {
            let z = polar_normal(rng);
            let t = 1.0 + self.c * z;
            if t <= 0.0 {
                continue;
            }
            let v = t * t * t;
            let z2 = z * z;
            let u: f64 = rng.random();
            if u < 1.0 - 0.0331 * z2 * z2 || u.ln() < 0.5 * z2 + self.d * (1.0 - v + v.ln()) {
                break self.d * v;
            }
        };
        match self.boost {
            Some(exponent) => g * rng.random::<f64>().powf(exponent),
            None => g,
        }
    }
}

/// Standard normal by the polar method.
fn polar_normal(rng: &mut impl Rng) -> f64 {
    loop {
        let x = 2.0 * rng.random::<f64>() - 1.0;
        let y = 2.0 * rng.random::<f64>() - 1.0;
        let s = x * x + y * y;
        if s > 0.0 && s < 1.0 {
            return x * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sample_in_unit_interval() {
        let params = BetaParams {
            alpha: 2.0,
            beta: 5.0,
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let s = params.sample(&mut rng);
            assert!((0.0..=1.0).contains(&s), "Beta sample out of range: {s}");
        }
    }

    #[test]
    fn empirical_mean_tracks_analytic_mean() {
        let params = BetaParams::posterior(8.0, 2.0);
        assert!((params.mean() - 0.75).abs() < 1e-9);

        let mut rng = StdRng::seed_from_u64(7);
        let n = 5000;
        let avg: f64 = (0..n).map(|_| params.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((avg - 0.75).abs() < 0.02, "empirical mean {avg}");
    }

    #[test]
    fn fractional_pseudo_counts_sample() {
        // α below 1 exercises the shape boost path.
        let params = BetaParams {
            alpha: 0.3,
            beta: 0.7,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let s = params.sample(&mut rng);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn degenerate_shapes_terminate() {
        let mut rng = StdRng::seed_from_u64(5);
        for (alpha, beta) in [(0.0, 0.0), (-2.0, 1.0), (f64::NAN, 3.0)] {
            let s = BetaParams { alpha, beta }.sample(&mut rng);
            assert!((0.0..=1.0).contains(&s), "Beta({alpha}, {beta}) gave {s}");
        }
    }

    #[test]
    fn gamma_mean_matches_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        for shape in [0.4, 1.0, 3.5] {
            let gamma = Gamma::new(shape);
            let n = 8000;
            let avg = (0..n).map(|_| gamma.draw(&mut rng)).sum::<f64>() / n as f64;
            assert!((avg - shape).abs() < 0.1 * shape.max(1.0), "shape {shape}: {avg}");
        }
    }
}
