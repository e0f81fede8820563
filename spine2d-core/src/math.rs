//! Small numeric helpers shared by the solvers and timelines.

pub const PI: f32 = std::f32::consts::PI;
pub const PI2: f32 = PI * 2.0;
pub const RAD_DEG: f32 = 180.0 / PI;
pub const DEG_RAD: f32 = PI / 180.0;

/// RGBA color with components in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn set(&mut self, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        self.r = r;
        self.g = g;
        self.b = b;
        self.a = a;
        self.clamp()
    }

    pub fn add(&mut self, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        self.r += r;
        self.g += g;
        self.b += b;
        self.a += a;
        self.clamp()
    }

    pub fn clamp(&mut self) -> &mut Self {
        self.r = clamp(self.r, 0.0, 1.0);
        self.g = clamp(self.g, 0.0, 1.0);
        self.b = clamp(self.b, 0.0, 1.0);
        self.a = clamp(self.a, 0.0, 1.0);
        self
    }

    /// Moves each channel toward `to` by `alpha`.
    pub fn lerp_to(&mut self, to: &Color, alpha: f32) {
        self.r += (to.r - self.r) * alpha;
        self.g += (to.g - self.g) * alpha;
        self.b += (to.b - self.b) * alpha;
        self.a += (to.a - self.a) * alpha;
    }

    /// Parses `rrggbb` or `rrggbbaa`; alpha defaults to 1.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 && hex.len() != 8 {
            return None;
        }
        let channel = |i: usize| -> Option<f32> {
            let v = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
            Some(v as f32 / 255.0)
        };
        let a = if hex.len() == 8 { channel(3)? } else { 1.0 };
        Some(Self::new(channel(0)?, channel(1)?, channel(2)?, a))
    }
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Zero maps to zero, unlike `f32::signum`.
pub fn signum(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn sin_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).sin()
}

pub fn cos_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).cos()
}

pub fn atan2_deg(y: f32, x: f32) -> f32 {
    y.atan2(x) * RAD_DEG
}

/// Wraps into `(-180, 180]`.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let mut d = degrees.rem_euclid(360.0);
    if d > 180.0 {
        d -= 360.0;
    }
    d
}

/// Single-step wrap into `[-PI, PI]`, for deltas already within one turn.
pub(crate) fn wrap_pi(mut radians: f32) -> f32 {
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}

/// Single-step wrap into `[-180, 180]`.
pub(crate) fn wrap_180(mut degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

/// Removes whole turns so the delta lies in `[-180, 180)`. An exact half turn maps to `-180`.
pub(crate) fn shortest_rotation_delta(degrees: f32) -> f32 {
    degrees - (16384 - (16384.499999999996 - (degrees / 360.0) as f64) as i32) as f32 * 360.0
}
