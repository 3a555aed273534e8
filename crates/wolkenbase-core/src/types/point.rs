//! Coordinates and the point record
//!
//! `LasPoint` is the fixed-size record the store pages to and from disk. Its
//! field order is the on-disk order; bincode writes it as exactly
//! [`POINT_RECORD_SIZE`](crate::constants::POINT_RECORD_SIZE) bytes.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A point in the horizontal plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xy {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

/// A point in space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
    /// Elevation
    pub z: f64,
}

impl Xy {
    /// Create a planar point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance to another point
    pub fn dist(self, other: Xy) -> f64 {
        (self - other).length()
    }

    /// Dot product
    pub fn dot(self, other: Xy) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// True if either coordinate is NaN
    pub fn is_nan(self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }
}

impl Xyz {
    /// Create a point
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The NaN point, marker of an empty record slot
    pub const fn nan() -> Self {
        Self { x: f64::NAN, y: f64::NAN, z: f64::NAN }
    }

    /// Horizontal projection
    pub fn xy(self) -> Xy {
        Xy::new(self.x, self.y)
    }

    /// Euclidean length
    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another point
    pub fn dist(self, other: Xyz) -> f64 {
        (self - other).length()
    }

    /// True if any coordinate is NaN
    pub fn is_nan(self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

impl From<(Xy, f64)> for Xyz {
    fn from((xy, z): (Xy, f64)) -> Self {
        Xyz::new(xy.x, xy.y, z)
    }
}

macro_rules! impl_vector_ops {
    ($t:ident { $($f:ident),+ }) => {
        impl Add for $t {
            type Output = $t;
            fn add(self, rhs: $t) -> $t { $t { $($f: self.$f + rhs.$f),+ } }
        }
        impl AddAssign for $t {
            fn add_assign(&mut self, rhs: $t) { $(self.$f += rhs.$f;)+ }
        }
        impl Sub for $t {
            type Output = $t;
            fn sub(self, rhs: $t) -> $t { $t { $($f: self.$f - rhs.$f),+ } }
        }
        impl Neg for $t {
            type Output = $t;
            fn neg(self) -> $t { $t { $($f: -self.$f),+ } }
        }
        impl Mul<f64> for $t {
            type Output = $t;
            fn mul(self, rhs: f64) -> $t { $t { $($f: self.$f * rhs),+ } }
        }
        impl Div<f64> for $t {
            type Output = $t;
            fn div(self, rhs: f64) -> $t { $t { $($f: self.$f / rhs),+ } }
        }
    };
}

impl_vector_ops!(Xy { x, y });
impl_vector_ops!(Xyz { x, y, z });

/// One LIDAR return.
///
/// Identity is `location`: storing a point at a location already occupied
/// replaces the record there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LasPoint {
    /// Position of the return
    pub location: Xyz,
    /// Pulse return magnitude
    pub intensity: u16,
    /// Return number within the pulse
    pub return_num: u8,
    /// Number of returns of the pulse
    pub n_returns: u8,
    /// Scan direction flag
    pub scan_direction: bool,
    /// Edge of flight line flag
    pub edge_line: bool,
    /// ASPRS classification
    pub classification: u8,
    /// Synthetic, key-point, withheld and overlap bits
    pub classification_flags: u16,
    /// Scanner channel
    pub scanner_channel: u8,
    /// User data
    pub user_data: u16,
    /// Wave packet descriptor index
    pub wave_index: u8,
    /// Point source id
    pub point_source: u16,
    /// Scan angle
    pub scan_angle: i32,
    /// GPS time of the return
    pub gps_time: f64,
    /// Near-infrared channel
    pub nir: u16,
    /// Red channel
    pub red: u16,
    /// Green channel
    pub green: u16,
    /// Blue channel
    pub blue: u16,
    /// Byte offset to waveform data
    pub waveform_offset: u64,
    /// Waveform packet size in bytes
    pub waveform_size: u32,
    /// Return point waveform location
    pub waveform_time: f32,
    /// Parametric line direction, x
    pub x_dir: f32,
    /// Parametric line direction, y
    pub y_dir: f32,
    /// Parametric line direction, z
    pub z_dir: f32,
}

impl Default for LasPoint {
    fn default() -> Self {
        Self::at(Xyz::default())
    }
}

impl LasPoint {
    /// A point at `location` with every other field zero
    pub fn at(location: Xyz) -> Self {
        Self {
            location,
            intensity: 0,
            return_num: 0,
            n_returns: 0,
            scan_direction: false,
            edge_line: false,
            classification: 0,
            classification_flags: 0,
            scanner_channel: 0,
            user_data: 0,
            wave_index: 0,
            point_source: 0,
            scan_angle: 0,
            gps_time: 0.0,
            nir: 0,
            red: 0,
            green: 0,
            blue: 0,
            waveform_offset: 0,
            waveform_size: 0,
            waveform_time: 0.0,
            x_dir: 0.0,
            y_dir: 0.0,
            z_dir: 0.0,
        }
    }

    /// The empty record that fills unused slots of a block
    pub fn empty() -> Self {
        Self::at(Xyz::nan())
    }

    /// True for an empty slot
    pub fn is_empty(&self) -> bool {
        self.location.is_nan()
    }
}
