//! Effect parameters
//!
//! Every value is clamped into its declared range at the point of
//! assignment, so nothing downstream ever sees an out-of-range control.
//! Out-of-range writes are never rejected: these are continuous visual
//! controls, not validated input.

use std::ops::RangeInclusive;

/// Valid macroblock edge lengths in pixels
pub const BLOCK_SIZE_RANGE: RangeInclusive<u32> = 1..=128;
/// Valid entropy values
pub const ENTROPY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Valid velocity scale values
pub const VELOCITY_SCALE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
/// Valid diffusion values
pub const DIFFUSION_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Loosely typed value written through the named option surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl ParameterValue {
    /// Get the value as f32 (bools map to 0.0 / 1.0)
    pub fn as_f32(&self) -> f32 {
        match self {
            ParameterValue::Float(v) => *v,
            ParameterValue::Int(v) => *v as f32,
            ParameterValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Get the value as i32 (floats are rounded; NaN becomes 0)
    pub fn as_i32(&self) -> i32 {
        match self {
            ParameterValue::Int(v) => *v,
            ParameterValue::Float(v) => v.round() as i32,
            ParameterValue::Bool(v) => i32::from(*v),
        }
    }

    /// Get the value as bool (floats above 0.5 and nonzero ints are true)
    pub fn as_bool(&self) -> bool {
        match self {
            ParameterValue::Bool(v) => *v,
            ParameterValue::Float(v) => *v > 0.5,
            ParameterValue::Int(v) => *v != 0,
        }
    }
}

/// Describes a parameter for a host UI (doesn't hold the value)
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    /// Internal name, used as the key for `DatamoshParams::set`
    pub name: &'static str,
    /// Display label
    pub label: &'static str,
    pub tooltip: &'static str,
    pub default: ParameterValue,
    /// Minimum value (numeric parameters only)
    pub min: Option<f32>,
    /// Maximum value (numeric parameters only)
    pub max: Option<f32>,
}

impl ParameterMeta {
    fn float(
        name: &'static str,
        label: &'static str,
        tooltip: &'static str,
        default: f32,
        range: &RangeInclusive<f32>,
    ) -> Self {
        Self {
            name,
            label,
            tooltip,
            default: ParameterValue::Float(default),
            min: Some(*range.start()),
            max: Some(*range.end()),
        }
    }
}

/// Clamp a float into a range; NaN lands on the lower bound
fn clamp_f32(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

fn clamp_block_size(value: i64) -> u32 {
    let min = i64::from(*BLOCK_SIZE_RANGE.start());
    let max = i64::from(*BLOCK_SIZE_RANGE.end());
    // Both bounds fit in u32, so the narrowing cannot truncate.
    value.clamp(min, max) as u32
}

/// Clamped snapshot of the effect's tunable inputs
#[derive(Debug, Clone, PartialEq)]
pub struct DatamoshParams {
    enabled: bool,
    block_size: u32,
    entropy: f32,
    velocity_scale: f32,
    diffusion: f32,
}

impl Default for DatamoshParams {
    fn default() -> Self {
        Self {
            enabled: false,
            block_size: 32,
            entropy: 0.5,
            velocity_scale: 0.8,
            diffusion: 0.4,
        }
    }
}

impl DatamoshParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Macroblock edge length; also divides the displacement buffer resolution
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Higher entropy means stronger noise
    pub fn entropy(&self) -> f32 {
        self.entropy
    }

    pub fn velocity_scale(&self) -> f32 {
        self.velocity_scale
    }

    pub fn diffusion(&self) -> f32 {
        self.diffusion
    }

    /// Kernel-facing quality, the inverse of entropy
    pub fn quality(&self) -> f32 {
        1.0 - self.entropy
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_block_size(&mut self, block_size: i64) {
        self.block_size = clamp_block_size(block_size);
    }

    pub fn set_entropy(&mut self, entropy: f32) {
        self.entropy = clamp_f32(entropy, &ENTROPY_RANGE);
    }

    pub fn set_velocity_scale(&mut self, velocity_scale: f32) {
        self.velocity_scale = clamp_f32(velocity_scale, &VELOCITY_SCALE_RANGE);
    }

    pub fn set_diffusion(&mut self, diffusion: f32) {
        self.diffusion = clamp_f32(diffusion, &DIFFUSION_RANGE);
    }

    /// Set a parameter by name
    ///
    /// Returns `false` for unknown names; the store is left unchanged.
    pub fn set(&mut self, name: &str, value: ParameterValue) -> bool {
        match name {
            "enabled" => self.set_enabled(value.as_bool()),
            "block_size" => self.set_block_size(i64::from(value.as_i32())),
            "entropy" => self.set_entropy(value.as_f32()),
            "velocity_scale" => self.set_velocity_scale(value.as_f32()),
            "diffusion" => self.set_diffusion(value.as_f32()),
            _ => return false,
        }
        true
    }

    /// Read a parameter by name
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        let value = match name {
            "enabled" => ParameterValue::Bool(self.enabled),
            "block_size" => ParameterValue::Int(self.block_size as i32),
            "entropy" => ParameterValue::Float(self.entropy),
            "velocity_scale" => ParameterValue::Float(self.velocity_scale),
            "diffusion" => ParameterValue::Float(self.diffusion),
            _ => return None,
        };
        Some(value)
    }

    /// Metadata for every parameter, in display order
    pub fn descriptors() -> Vec<ParameterMeta> {
        let defaults = Self::default();
        vec![
            ParameterMeta {
                name: "enabled",
                label: "Enabled",
                tooltip: "Toggles the effect on and off",
                default: ParameterValue::Bool(defaults.enabled),
                min: None,
                max: None,
            },
            ParameterMeta {
                name: "block_size",
                label: "Block Size",
                tooltip: "Size of compression macroblock",
                default: ParameterValue::Int(defaults.block_size as i32),
                min: Some(*BLOCK_SIZE_RANGE.start() as f32),
                max: Some(*BLOCK_SIZE_RANGE.end() as f32),
            },
            ParameterMeta::float(
                "entropy",
                "Entropy",
                "Entropy coefficient. The larger value makes the stronger noise",
                defaults.entropy,
                &ENTROPY_RANGE,
            ),
            ParameterMeta::float(
                "velocity_scale",
                "Velocity Scale",
                "Scale factor for velocity vectors",
                defaults.velocity_scale,
                &VELOCITY_SCALE_RANGE,
            ),
            ParameterMeta::float(
                "diffusion",
                "Diffusion",
                "Amount of random displacement",
                defaults.diffusion,
                &DIFFUSION_RANGE,
            ),
        ]
    }
}
