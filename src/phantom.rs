//! Phantom ("virtual") actuators.
//!
//! Driving two or three neighbouring actuators at once produces a single
//! sensation somewhere between them. Where exactly depends on how the
//! intensity is split. The energy-summation model says the perceived
//! intensity `Av` of the phantom satisfies
//!
//! ```text
//! Av^2 = A1^2 + A2^2 (+ A3^2)
//! ```
//!
//! and that each actuator's share of the energy is inversely proportional
//! to its distance from the phantom. On a segment that gives
//! `A1 = sqrt(d2 / (d1 + d2)) * Av`; in general,
//! `Ai = sqrt((1 / di) / sum(1 / dj)) * Av`.

use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{ConfigError, SynthesisError, ValidationError};
use crate::layout::{is_on_segment, point_in_triangle, triangle_area, Actuator, ActuatorId, ActuatorLayout, Point};

/// Tuning for the [PhantomSynthesizer].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomConfig {
    /// Positions closer than this to an actuator drive it alone
    pub direct_hit_epsilon: f64,
    /// How far off a segment a position may be and still use two actuators
    pub segment_tolerance: f64,
    /// Smallest distance used in the inverse-distance weights
    pub distance_floor: f64,
    /// Top of the intensity scale, e.g. `1.0` normalised or `15.0` raw duty
    pub max_intensity: f64,
    /// Only render three-actuator phantoms inside an actuator triangle
    pub strict_triangle_containment: bool,
}

impl Default for PhantomConfig {
    fn default() -> Self {
        Self {
            direct_hit_epsilon: 1e-3,
            segment_tolerance: 1.0,
            distance_floor: 0.1,
            max_intensity: 1.0,
            strict_triangle_containment: false,
        }
    }
}

/// A request for one phantom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhantomRequest {
    /// Where the sensation should be felt
    pub virtual_position: Point,
    /// How strong it should feel
    pub desired_intensity: f64,
}

/// Which rendering rule produced a [PhantomResult].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhantomKind {
    /// The position sits on an actuator
    Direct,
    /// Two actuators, the position lies on their segment
    Segment,
    /// Up to three actuators weighted by inverse distance
    Triangle,
}

/// One actuator's share of a phantom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    /// Which actuator
    pub actuator_id: ActuatorId,
    /// How hard to drive it
    pub intensity: f64,
}

/// The actuators (one to three, ascending by id) that render a phantom.
#[derive(Debug, Clone, PartialEq)]
pub struct PhantomResult {
    /// Rule that was used
    pub kind: PhantomKind,
    /// Per-actuator intensities
    pub contributions: Vec<Contribution>,
}

impl PhantomResult {
    /// `sqrt(sum(Ai^2))`, the intensity the phantom should be felt at.
    pub fn perceived_intensity(&self) -> f64 {
        self.contributions
            .iter()
            .map(|c| c.intensity * c.intensity)
            .sum::<f64>()
            .sqrt()
    }
}

/// Maps phantom requests to actuator intensities on a fixed layout.
#[derive(Debug, Clone)]
pub struct PhantomSynthesizer {
    layout: ActuatorLayout,
    config: PhantomConfig,
}

impl PhantomSynthesizer {
    /// Build a synthesizer. The layout must have at least one actuator and
    /// every tolerance must be positive.
    pub fn new(layout: ActuatorLayout, config: PhantomConfig) -> Result<Self, ConfigError> {
        if layout.is_empty() {
            return Err(ConfigError::EmptyLayout);
        }
        let positive = [
            ("direct_hit_epsilon", config.direct_hit_epsilon),
            ("segment_tolerance", config.segment_tolerance),
            ("distance_floor", config.distance_floor),
            ("max_intensity", config.max_intensity),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        Ok(Self { layout, config })
    }

    /// The layout phantoms are rendered on.
    pub fn layout(&self) -> &ActuatorLayout {
        &self.layout
    }

    /// The active configuration.
    pub fn config(&self) -> &PhantomConfig {
        &self.config
    }

    /// Reject intensities outside `[0, max_intensity]`.
    pub fn check_intensity(&self, intensity: f64) -> Result<(), ValidationError> {
        if (0.0..=self.config.max_intensity).contains(&intensity) {
            Ok(())
        } else {
            Err(ValidationError::IntensityOutOfRange {
                value: intensity,
                max: self.config.max_intensity,
            })
        }
    }

    /// Pick the actuators for a phantom and split the intensity between
    /// them. Tries, in order, a direct hit, a two-actuator segment phantom,
    /// and a three-actuator phantom.
    pub fn synthesize(&self, request: &PhantomRequest) -> Result<PhantomResult, SynthesisError> {
        let PhantomRequest {
            virtual_position: position,
            desired_intensity: intensity,
        } = *request;

        self.check_intensity(intensity)?;
        if !position.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { index: 0 }.into());
        }

        let nearest = self.layout.k_nearest(position, 3)?;

        let result = if let Some(hit) = self.direct_hit(&nearest) {
            PhantomResult {
                kind: PhantomKind::Direct,
                contributions: vec![Contribution {
                    actuator_id: hit.id,
                    intensity,
                }],
            }
        } else if let Some((a, b)) = self.segment_pair(position) {
            PhantomResult {
                kind: PhantomKind::Segment,
                contributions: self.split_on_segment(position, &a, &b, intensity),
            }
        } else {
            let corners = self.triangle_for(position, &nearest)?;
            PhantomResult {
                kind: PhantomKind::Triangle,
                contributions: self.split_inverse_distance(position, &corners, intensity),
            }
        };

        debug!(
            "Phantom at {} ({:?}): {:?}",
            position, result.kind, result.contributions
        );
        Ok(self.clamped(result))
    }

    fn direct_hit(&self, nearest: &[(Actuator, f64)]) -> Option<Actuator> {
        nearest
            .first()
            .filter(|(_, d)| *d <= self.config.direct_hit_epsilon)
            .map(|(a, _)| *a)
    }

    /// The qualifying pair with the shortest path through the position,
    /// which prefers adjacent actuators over ones further along the line.
    fn segment_pair(&self, position: Point) -> Option<(Actuator, Actuator)> {
        self.layout
            .pairs()
            .filter(|(a, b)| is_on_segment(position, a, b, self.config.segment_tolerance).is_some())
            .map(|(a, b)| {
                let span = a.position.distance(&position) + b.position.distance(&position);
                (span, a, b)
            })
            .min_by(|(l, ..), (r, ..)| l.partial_cmp(r).unwrap_or(Ordering::Equal))
            .map(|(_, a, b)| (a, b))
    }

    fn split_on_segment(&self, position: Point, a: &Actuator, b: &Actuator, av: f64) -> Vec<Contribution> {
        let d1 = a.position.distance(&position);
        let d2 = b.position.distance(&position);
        let total = d1 + d2;
        // Only reachable with coincident actuators, which the direct-hit
        // check catches first unless the position is off to the side.
        if total <= 0.0 {
            return vec![Contribution {
                actuator_id: a.id,
                intensity: av,
            }];
        }

        vec![
            Contribution {
                actuator_id: a.id,
                intensity: (d2 / total).sqrt() * av,
            },
            Contribution {
                actuator_id: b.id,
                intensity: (d1 / total).sqrt() * av,
            },
        ]
    }

    /// The actuators for a general phantom: the nearest three, unless the
    /// strict containment policy asks for a triangle around the position.
    fn triangle_for(
        &self,
        position: Point,
        nearest: &[(Actuator, f64)],
    ) -> Result<Vec<Actuator>, SynthesisError> {
        let corners: Vec<Actuator> = nearest.iter().map(|(a, _)| *a).collect();
        if !self.config.strict_triangle_containment {
            return Ok(corners);
        }

        if let [a, b, c] = corners[..] {
            let tri = [a, b, c];
            if triangle_area(&tri) > 0.0 && point_in_triangle(position, &tri) {
                return Ok(corners);
            }
        }

        self.layout
            .triples()
            .filter(|tri| triangle_area(tri) > 0.0 && point_in_triangle(position, tri))
            .map(|tri| {
                let spread: f64 = tri.iter().map(|a| a.position.distance(&position)).sum();
                (spread, tri)
            })
            .min_by(|(l, _), (r, _)| l.partial_cmp(r).unwrap_or(Ordering::Equal))
            .map(|(_, tri)| tri.to_vec())
            .ok_or(SynthesisError::OutsideTriangles(position))
    }

    fn split_inverse_distance(&self, position: Point, corners: &[Actuator], av: f64) -> Vec<Contribution> {
        let inverse: Vec<f64> = corners
            .iter()
            .map(|a| 1.0 / a.position.distance(&position).max(self.config.distance_floor))
            .collect();
        let sum: f64 = inverse.iter().sum();

        let mut contributions: Vec<Contribution> = corners
            .iter()
            .zip(&inverse)
            .map(|(a, w)| Contribution {
                actuator_id: a.id,
                intensity: (w / sum).sqrt() * av,
            })
            .collect();
        contributions.sort_by_key(|c| c.actuator_id);
        contributions
    }

    fn clamped(&self, mut result: PhantomResult) -> PhantomResult {
        for c in result.contributions.iter_mut() {
            c.intensity = c.intensity.clamp(0.0, self.config.max_intensity);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn line() -> PhantomSynthesizer {
        let layout = ActuatorLayout::new(vec![
            Actuator::new(0, 0.0, 0.0),
            Actuator::new(1, 60.0, 0.0),
            Actuator::new(2, 120.0, 0.0),
            Actuator::new(3, 180.0, 0.0),
        ])
        .unwrap();
        PhantomSynthesizer::new(layout, PhantomConfig::default()).unwrap()
    }

    fn grid(strict: bool) -> PhantomSynthesizer {
        let actuators = (0..3)
            .flat_map(|row| (0..3).map(move |col| Actuator::new(row * 3 + col, col as f64 * 60.0, row as f64 * 60.0)))
            .collect();
        let layout = ActuatorLayout::new(actuators).unwrap();
        let config = PhantomConfig {
            strict_triangle_containment: strict,
            ..PhantomConfig::default()
        };
        PhantomSynthesizer::new(layout, config).unwrap()
    }

    fn request(x: f64, y: f64, intensity: f64) -> PhantomRequest {
        PhantomRequest {
            virtual_position: Point::new(x, y),
            desired_intensity: intensity,
        }
    }

    fn energy(result: &PhantomResult) -> f64 {
        result.contributions.iter().map(|c| c.intensity.powi(2)).sum()
    }

    #[test]
    fn midpoint_splits_evenly() {
        let res = line().synthesize(&request(30.0, 0.0, 0.8)).unwrap();
        assert_eq!(res.kind, PhantomKind::Segment);
        assert_eq!(res.contributions.len(), 2);
        assert_eq!(res.contributions[0].actuator_id, 0);
        assert_eq!(res.contributions[1].actuator_id, 1);

        let expected = 0.5_f64.sqrt() * 0.8;
        for c in &res.contributions {
            assert!((c.intensity - expected).abs() < 1e-9);
        }
        assert!((energy(&res) - 0.64).abs() < 1e-9);
    }

    #[test]
    fn closer_actuator_gets_more() {
        let res = line().synthesize(&request(75.0, 0.0, 1.0)).unwrap();
        let ids: Vec<_> = res.contributions.iter().map(|c| c.actuator_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(res.contributions[0].intensity > res.contributions[1].intensity);
        assert!((res.contributions[0].intensity - 0.75_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn direct_hit_on_every_actuator() {
        let synth = grid(false);
        for actuator in synth.layout().actuators() {
            let res = synth
                .synthesize(&PhantomRequest {
                    virtual_position: actuator.position,
                    desired_intensity: 0.7,
                })
                .unwrap();
            assert_eq!(res.kind, PhantomKind::Direct);
            assert_eq!(
                res.contributions,
                vec![Contribution {
                    actuator_id: actuator.id,
                    intensity: 0.7
                }]
            );
        }
    }

    #[test]
    fn direct_hit_on_the_line() {
        let res = line().synthesize(&request(60.0, 0.0, 0.5)).unwrap();
        assert_eq!(res.kind, PhantomKind::Direct);
        assert_eq!(res.contributions[0].actuator_id, 1);
        assert_eq!(res.contributions[0].intensity, 0.5);
    }

    #[test]
    fn off_line_uses_three() {
        let res = grid(false).synthesize(&request(20.0, 25.0, 1.0)).unwrap();
        assert_eq!(res.kind, PhantomKind::Triangle);
        assert_eq!(res.contributions.len(), 3);
        assert!((energy(&res) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn energy_is_conserved_everywhere() {
        let synth = grid(false);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let x = rng.gen_range(0.0..120.0);
            let y = rng.gen_range(0.0..120.0);
            let av = rng.gen_range(0.0..=1.0);
            let res = synth.synthesize(&request(x, y, av)).unwrap();
            assert!((1..=3).contains(&res.contributions.len()));
            assert!(res.contributions.iter().all(|c| c.intensity >= 0.0));
            let expected = av * av;
            assert!(
                (energy(&res) - expected).abs() <= 1e-6 * expected.max(1e-12),
                "({}, {}) {:?}",
                x,
                y,
                res
            );
        }
    }

    #[test]
    fn intensity_out_of_range() {
        let synth = line();
        assert!(matches!(
            synth.synthesize(&request(30.0, 0.0, 1.5)),
            Err(SynthesisError::Invalid(ValidationError::IntensityOutOfRange { .. }))
        ));
        assert!(synth.synthesize(&request(30.0, 0.0, -0.1)).is_err());
        assert!(synth.synthesize(&request(30.0, 0.0, f64::NAN)).is_err());
    }

    #[test]
    fn raw_device_units() {
        let layout = ActuatorLayout::new(vec![Actuator::new(0, 0.0, 0.0), Actuator::new(1, 60.0, 0.0)]).unwrap();
        let config = PhantomConfig {
            max_intensity: 15.0,
            ..PhantomConfig::default()
        };
        let synth = PhantomSynthesizer::new(layout, config).unwrap();
        let res = synth.synthesize(&request(30.0, 0.0, 12.0)).unwrap();
        assert!((res.perceived_intensity() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn empty_layout_is_a_config_error() {
        let layout = ActuatorLayout::new(vec![]).unwrap();
        assert!(matches!(
            PhantomSynthesizer::new(layout, PhantomConfig::default()),
            Err(ConfigError::EmptyLayout)
        ));
    }

    #[test]
    fn single_actuator_layout() {
        let layout = ActuatorLayout::new(vec![Actuator::new(5, 10.0, 10.0)]).unwrap();
        let synth = PhantomSynthesizer::new(layout, PhantomConfig::default()).unwrap();
        let res = synth.synthesize(&request(40.0, 40.0, 0.6)).unwrap();
        assert_eq!(res.contributions.len(), 1);
        assert!((res.contributions[0].intensity - 0.6).abs() < 1e-12);
    }

    #[test]
    fn strict_containment_rejects_outside_points() {
        let synth = grid(true);
        assert!(matches!(
            synth.synthesize(&request(200.0, 200.0, 1.0)),
            Err(SynthesisError::OutsideTriangles(_))
        ));
        // The loose policy renders it anyway
        assert!(grid(false).synthesize(&request(200.0, 200.0, 1.0)).is_ok());
    }

    #[test]
    fn strict_containment_finds_an_enclosing_triangle() {
        let synth = grid(true);
        let p = Point::new(20.0, 25.0);
        let res = synth.synthesize(&request(p.x, p.y, 1.0)).unwrap();
        assert_eq!(res.kind, PhantomKind::Triangle);

        let corners: Vec<Actuator> = res
            .contributions
            .iter()
            .map(|c| *synth.layout().get(c.actuator_id).unwrap())
            .collect();
        assert!(point_in_triangle(p, &[corners[0], corners[1], corners[2]]));
        assert!((energy(&res) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bad_tolerances_are_rejected() {
        let layout = ActuatorLayout::new(vec![Actuator::new(0, 0.0, 0.0)]).unwrap();
        let config = PhantomConfig {
            distance_floor: 0.0,
            ..PhantomConfig::default()
        };
        assert!(matches!(
            PhantomSynthesizer::new(layout, config),
            Err(ConfigError::InvalidParameter {
                name: "distance_floor",
                ..
            })
        ));
    }
}
