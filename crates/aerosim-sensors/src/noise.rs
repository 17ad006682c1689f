//! Additive white Gaussian noise for 3-axis velocity readings.

use aerosim_types::SimError;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Three independent zero-mean normal distributions (x, y horizontal; z
/// vertical) drawing from one generator.
///
/// Each call to [`sample`][Self::sample] draws a fresh, uncorrelated sample
/// per axis.
#[derive(Debug, Clone)]
pub struct VelocityNoise {
    axes: [Normal<f64>; 3],
    rng: StdRng,
}

impl VelocityNoise {
    /// Build the generators.  `seed` makes the sequence reproducible; `None`
    /// seeds from the operating system.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Noise`] for a negative or non-finite standard
    /// deviation.
    pub fn new(hor_std_dev: f64, ver_std_dev: f64, seed: Option<u64>) -> Result<Self, SimError> {
        let horizontal = normal(hor_std_dev)?;
        let vertical = normal(ver_std_dev)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            axes: [horizontal, horizontal, vertical],
            rng,
        })
    }

    pub fn sample(&mut self) -> Vector3<f64> {
        Vector3::new(
            self.axes[0].sample(&mut self.rng),
            self.axes[1].sample(&mut self.rng),
            self.axes[2].sample(&mut self.rng),
        )
    }

    /// Configured standard deviation per axis.
    pub fn std_devs(&self) -> Vector3<f64> {
        Vector3::new(
            self.axes[0].std_dev(),
            self.axes[1].std_dev(),
            self.axes[2].std_dev(),
        )
    }
}

fn normal(std_dev: f64) -> Result<Normal<f64>, SimError> {
    if !std_dev.is_finite() {
        return Err(SimError::Noise(format!("standard deviation {std_dev} is not finite")));
    }
    if std_dev < 0.0 {
        return Err(SimError::Noise(format!("standard deviation {std_dev} is negative")));
    }
    Normal::new(0.0, std_dev).map_err(|e| SimError::Noise(format!("standard deviation {std_dev}: {e}")))
}
