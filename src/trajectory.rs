//! Resampling a polyline into points that are evenly spaced in time.
//!
//! The input vertices can be arbitrarily dense in some places and sparse in
//! others, so we walk the path by arc length rather than by vertex.

use crate::error::{ConfigError, ValidationError};
use crate::layout::Point;

/// A point on the path and when the motion should reach it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Seconds since the start of the motion
    pub time_offset: f64,
    /// Where the phantom should be at that time
    pub position: Point,
}

/// Reject paths containing NaN, infinite, or negative coordinates.
pub fn validate_path(path: &[Point]) -> Result<(), ValidationError> {
    for (index, p) in path.iter().enumerate() {
        if !p.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { index });
        }
        if p.x < 0.0 || p.y < 0.0 {
            return Err(ValidationError::NegativeCoordinate { index });
        }
    }
    Ok(())
}

/// Total length of the polyline through `path`.
pub fn path_length(path: &[Point]) -> f64 {
    path.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Samples a path so that consecutive samples are at most `max_interval`
/// seconds apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySampler {
    max_interval: f64,
}

impl TrajectorySampler {
    /// Make a sampler. `max_interval` is in seconds and must be positive.
    pub fn new(max_interval: f64) -> Result<Self, ConfigError> {
        if !(max_interval.is_finite() && max_interval > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "max_interval",
                value: max_interval,
            });
        }
        Ok(Self { max_interval })
    }

    /// The largest gap between consecutive samples, in seconds.
    pub fn max_interval(&self) -> f64 {
        self.max_interval
    }

    /// How many samples a motion lasting `total_time` needs: one more than
    /// the number of `max_interval` steps it takes to cover it, and never
    /// fewer than two.
    pub fn sample_count(&self, total_time: f64) -> usize {
        // The small slack keeps exact multiples like 0.7 / 0.07 from
        // rounding up to an extra step.
        let steps = (total_time / self.max_interval - 1e-9).ceil().max(1.0);
        steps as usize + 1
    }

    /// Resample `path` over `total_time` seconds. The first sample is at the
    /// first vertex at `t = 0` and the last at the final vertex at
    /// `t = total_time`.
    ///
    /// A single-point path yields one sample at `t = 0`. A path whose points
    /// all coincide yields that point at every sample time.
    pub fn sample(
        &self,
        path: &[Point],
        total_time: f64,
    ) -> Result<Vec<TrajectorySample>, ValidationError> {
        validate_path(path)?;
        if !(total_time.is_finite() && total_time > 0.0) {
            return Err(ValidationError::NonPositiveTime {
                name: "travel time",
                value: total_time,
            });
        }

        match path {
            [] => return Err(ValidationError::InsufficientPoints(0)),
            [only] => {
                return Ok(vec![TrajectorySample {
                    time_offset: 0.0,
                    position: *only,
                }])
            }
            _ => {}
        }

        let mut cumulative = Vec::with_capacity(path.len());
        cumulative.push(0.0);
        for w in path.windows(2) {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + w[0].distance(&w[1]));
        }
        let total_length = cumulative[cumulative.len() - 1];

        let n = self.sample_count(total_time);
        let mut segment = 0;
        let samples = (0..n)
            .map(|i| {
                let fraction = i as f64 / (n - 1) as f64;
                let time_offset = fraction * total_time;

                if total_length == 0.0 {
                    return TrajectorySample {
                        time_offset,
                        position: path[0],
                    };
                }

                let target = fraction * total_length;
                // Samples are visited in order, so the segment only moves
                // forward.
                while segment < path.len() - 2 && cumulative[segment + 1] < target {
                    segment += 1;
                }
                let (start, end) = (cumulative[segment], cumulative[segment + 1]);
                let position = if end > start {
                    let t = ((target - start) / (end - start)).clamp(0.0, 1.0);
                    path[segment].lerp(&path[segment + 1], t)
                } else {
                    path[segment]
                };

                TrajectorySample {
                    time_offset,
                    position,
                }
            })
            .collect();

        Ok(samples)
    }
}
