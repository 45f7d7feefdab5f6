use crate::foundation::error::{CompositeError, CompositeResult};
use serde::{Deserialize, Serialize};

/// Pixels at or below this HSV value are never keyed; near-black hue is mostly noise.
pub const VALUE_FLOOR: f32 = 0.15;

/// Soft-edge alphas below this snap to fully transparent to avoid translucent halos.
const SOFT_ALPHA_SNAP: f32 = 0.2;

/// Backdrop channel the key is built around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyChannel {
    /// Green screen.
    #[default]
    Green,
    /// Blue screen.
    Blue,
}

/// How key pixels are turned into alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Linear falloff on how strongly the key channel dominates.
    #[default]
    Soft,
    /// Every key pixel becomes fully transparent.
    Hard,
}

/// Declarative HSV rule describing the backdrop color.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyColorSpec {
    /// Dominant backdrop channel.
    pub channel: KeyChannel,
    /// Lower hue bound in degrees.
    pub min_hue: f32,
    /// Upper hue bound in degrees. When below `min_hue` the range wraps through 0.
    pub max_hue: f32,
    /// Saturation must be strictly above this, in `0..=1`.
    pub min_saturation: f32,
    /// The key channel must exceed each other channel multiplied by this factor.
    pub threshold: f32,
}

impl Default for KeyColorSpec {
    fn default() -> Self {
        Self::green()
    }
}

impl KeyColorSpec {
    /// Green-screen preset tuned for the avatar stream.
    pub fn green() -> Self {
        Self {
            channel: KeyChannel::Green,
            min_hue: 60.0,
            max_hue: 180.0,
            min_saturation: 0.1,
            threshold: 1.0,
        }
    }

    /// Blue-screen preset.
    pub fn blue() -> Self {
        Self {
            channel: KeyChannel::Blue,
            min_hue: 180.0,
            max_hue: 270.0,
            min_saturation: 0.1,
            threshold: 1.0,
        }
    }

    /// Reject values that would make the rule meaningless.
    pub fn validate(&self) -> CompositeResult<()> {
        let fields = [
            ("min_hue", self.min_hue),
            ("max_hue", self.max_hue),
            ("min_saturation", self.min_saturation),
            ("threshold", self.threshold),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(CompositeError::validation(format!(
                    "key {name} must be finite"
                )));
            }
        }
        if self.threshold <= 0.0 {
            return Err(CompositeError::validation("key threshold must be > 0"));
        }
        Ok(())
    }

    /// Hue bounds folded into `[0, 360)` and saturation clamped into `[0, 1]`.
    pub fn normalized(self) -> Self {
        Self {
            min_hue: self.min_hue.rem_euclid(360.0),
            max_hue: normalize_max_hue(self.max_hue),
            min_saturation: self.min_saturation.clamp(0.0, 1.0),
            ..self
        }
    }

    fn hue_matches(&self, h: f32) -> bool {
        if self.min_hue <= self.max_hue {
            h >= self.min_hue && h <= self.max_hue
        } else {
            h >= self.min_hue || h <= self.max_hue
        }
    }
}

// 360 stays meaningful as "up to the end of the wheel".
fn normalize_max_hue(h: f32) -> f32 {
    if h >= 360.0 && h.rem_euclid(360.0) == 0.0 {
        360.0
    } else {
        h.rem_euclid(360.0)
    }
}

/// Which classification rule to apply.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum KeyRule {
    /// HSV window plus channel dominance.
    Hsv {
        /// Color window.
        #[serde(default)]
        spec: KeyColorSpec,
        /// Edge treatment.
        #[serde(default)]
        edge: EdgeMode,
    },
    /// Plain per-channel cutoff: key channel above `level`, the other two below it.
    ChannelThreshold {
        /// Dominant backdrop channel.
        #[serde(default)]
        channel: KeyChannel,
        /// Cutoff on the `0..=255` scale.
        level: u8,
    },
}

impl Default for KeyRule {
    fn default() -> Self {
        Self::Hsv {
            spec: KeyColorSpec::green(),
            edge: EdgeMode::Soft,
        }
    }
}

impl KeyRule {
    /// Validate rule parameters.
    pub fn validate(&self) -> CompositeResult<()> {
        match self {
            Self::Hsv { spec, .. } => spec.validate(),
            Self::ChannelThreshold { .. } => Ok(()),
        }
    }
}

/// HSV triple: hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    /// Hue in degrees.
    pub h: f32,
    /// Saturation.
    pub s: f32,
    /// Value.
    pub v: f32,
}

/// Standard six-sector RGB to HSV conversion.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let mut h = 0.0;
    if delta != 0.0 {
        h = if max == rf {
            ((gf - bf) / delta) % 6.0
        } else if max == gf {
            (bf - rf) / delta + 2.0
        } else {
            (rf - gf) / delta + 4.0
        };
        h *= 60.0;
        if h < 0.0 {
            h += 360.0;
        }
    }

    let s = if max == 0.0 { 0.0 } else { delta / max };
    Hsv {
        h,
        s,
        v: max / 255.0,
    }
}

/// Decides per pixel whether it belongs to the backdrop and how transparent it becomes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorClassifier {
    rule: KeyRule,
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(KeyRule::default())
    }
}

impl ColorClassifier {
    /// Build a classifier; HSV bounds are normalized once here.
    pub fn new(rule: KeyRule) -> Self {
        let rule = match rule {
            KeyRule::Hsv { spec, edge } => KeyRule::Hsv {
                spec: spec.normalized(),
                edge,
            },
            other => other,
        };
        Self { rule }
    }

    /// Soft-edge HSV classifier for `spec`.
    pub fn hsv(spec: KeyColorSpec) -> Self {
        Self::new(KeyRule::Hsv {
            spec,
            edge: EdgeMode::Soft,
        })
    }

    /// Active rule after normalization.
    pub fn rule(&self) -> KeyRule {
        self.rule
    }

    /// Alpha multiplier for one pixel: 1 keeps it, 0 removes it.
    pub fn classify(&self, r: u8, g: u8, b: u8) -> f32 {
        match self.rule {
            KeyRule::Hsv { spec, edge } => classify_hsv(&spec, edge, r, g, b),
            KeyRule::ChannelThreshold { channel, level } => {
                let (key, o1, o2) = split_channels(channel, r, g, b);
                if key > level && o1 < level && o2 < level {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    /// Alpha multiplier on the `0..=255` scale, for the keying hot loop.
    #[inline]
    pub fn classify_u8(&self, r: u8, g: u8, b: u8) -> u8 {
        (self.classify(r, g, b) * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

fn split_channels(channel: KeyChannel, r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    match channel {
        KeyChannel::Green => (g, r, b),
        KeyChannel::Blue => (b, r, g),
    }
}

fn classify_hsv(spec: &KeyColorSpec, edge: EdgeMode, r: u8, g: u8, b: u8) -> f32 {
    let hsv = rgb_to_hsv(r, g, b);
    let (key, o1, o2) = split_channels(spec.channel, r, g, b);
    let (key, o1, o2) = (f32::from(key), f32::from(o1), f32::from(o2));

    let is_key = spec.hue_matches(hsv.h)
        && hsv.s > spec.min_saturation
        && hsv.v > VALUE_FLOOR
        && key > o1 * spec.threshold
        && key > o2 * spec.threshold;
    if !is_key {
        return 1.0;
    }

    match edge {
        EdgeMode::Hard => 0.0,
        EdgeMode::Soft => {
            // `key > 0` is guaranteed by the value floor. A threshold below 1 or a wide hue
            // window lets a non-dominant key channel through, so dominance can go negative.
            let dominance = (key - o1.max(o2)) / key;
            let alpha = (1.0 - dominance * 4.0).clamp(0.0, 1.0);
            if alpha < SOFT_ALPHA_SNAP {
                0.0
            } else {
                (alpha * 255.0).round() / 255.0
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/keying/classify.rs"]
mod tests;
