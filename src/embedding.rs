// gait metrics -> unit 3-vector
//
// feature order: [cadence, heel_strike, vertical_oscillation]
// the upload path and the query path must both go through `embed`, otherwise
// similarity scores stored in the index are meaningless

use crate::error::{GaitError, Result};
use std::fmt::Display;

pub const DIMENSION: usize = 3;

/// Steps per minute.
pub const CADENCE_BOUNDS: FeatureBounds = FeatureBounds {
    min: 50.0,
    max: 250.0,
};

/// Centimetres.
pub const VERTICAL_OSCILLATION_BOUNDS: FeatureBounds = FeatureBounds {
    min: 6.0,
    max: 20.0,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeatureBounds {
    pub min: f32,
    pub max: f32,
}

impl FeatureBounds {
    pub fn normalize(&self, value: f32) -> Result<f32> {
        normalize_feature(value, self.min, self.max)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GaitMetrics {
    pub cadence: f32,
    pub heel_strike: f32,
    pub vertical_oscillation: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GaitEmbedding([f32; DIMENSION]);

impl GaitEmbedding {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Display for GaitEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}, {:.3}, {:.3}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Scales `value` so that `min` maps to 0 and `max` maps to 1.
///
/// Values outside the bounds are not clamped and land outside `[0, 1]`.
pub fn normalize_feature(value: f32, min: f32, max: f32) -> Result<f32> {
    if !min.is_finite() || !max.is_finite() || min == max {
        return Err(GaitError::InvalidRange { min, max });
    }
    Ok((value - min) / (max - min))
}

fn magnitude(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales `vector` to unit length. The zero vector is returned unchanged.
pub fn normalize_vector(vector: [f32; DIMENSION]) -> [f32; DIMENSION] {
    let mag = magnitude(&vector);
    if mag == 0.0 {
        return vector;
    }
    vector.map(|x| x / mag)
}

pub fn embed(metrics: &GaitMetrics) -> Result<GaitEmbedding> {
    let vector = [
        CADENCE_BOUNDS.normalize(metrics.cadence)?,
        // already on a 0..1 scale
        metrics.heel_strike,
        VERTICAL_OSCILLATION_BOUNDS.normalize(metrics.vertical_oscillation)?,
    ];
    Ok(GaitEmbedding(normalize_vector(vector)))
}
