//! Points, colours and colour grids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WatchError};

/// Integer pixel coordinate on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One pixel sample with three 8-bit channels.
///
/// Persisted as a six digit `RRGGBB` hex string, always written uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of absolute per-channel differences, 0..=765
    pub fn distance(&self, other: &Rgb) -> u32 {
        self.r.abs_diff(other.r) as u32
            + self.g.abs_diff(other.g) as u32
            + self.b.abs_diff(other.b) as u32
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WatchError::format(format!(
                "invalid colour '{}': expected six hex digits RRGGBB",
                s
            )));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| WatchError::format(format!("invalid colour '{}': {}", s, e)))
        };

        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = WatchError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

/// Rectangular grid of colour samples indexed `[column][row]`.
///
/// A grid always has at least one column and one row, and every column has
/// the same number of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Rgb>>", into = "Vec<Vec<Rgb>>")]
pub struct ColorGrid {
    columns: Vec<Vec<Rgb>>,
}

impl ColorGrid {
    /// Build a grid from columns, rejecting empty or ragged input
    pub fn from_columns(columns: Vec<Vec<Rgb>>) -> Result<Self> {
        let height = columns.first().map(Vec::len).unwrap_or(0);
        if height == 0 {
            return Err(WatchError::format("colour grid must have at least one cell"));
        }

        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != height) {
            return Err(WatchError::format(format!(
                "colour grid is not rectangular: column {} has {} rows, expected {}",
                i,
                col.len(),
                height
            )));
        }

        Ok(Self { columns })
    }

    /// A `width` x `height` grid where every cell is `color`
    pub fn filled(width: usize, height: usize, color: Rgb) -> Result<Self> {
        Self::from_columns(vec![vec![color; height]; width])
    }

    /// Build a grid from row-major RGBA bytes (4 bytes per pixel, alpha ignored)
    pub fn from_rgba(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        let expected = width * height * 4;
        if data.len() != expected {
            return Err(WatchError::format(format!(
                "expected {} bytes of RGBA data for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        let columns = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| {
                        let idx = (y * width + x) * 4;
                        Rgb::new(data[idx], data[idx + 1], data[idx + 2])
                    })
                    .collect()
            })
            .collect();

        Self::from_columns(columns)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns[0].len()
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    pub fn get(&self, column: usize, row: usize) -> Option<Rgb> {
        self.columns.get(column)?.get(row).copied()
    }

    /// Overwrite one cell, returning false if it is out of bounds
    pub fn set(&mut self, column: usize, row: usize, color: Rgb) -> bool {
        match self.columns.get_mut(column).and_then(|c| c.get_mut(row)) {
            Some(cell) => {
                *cell = color;
                true
            }
            None => false,
        }
    }

    pub fn columns(&self) -> &[Vec<Rgb>] {
        &self.columns
    }

    /// Iterate all cells in column-major order
    pub fn cells(&self) -> impl Iterator<Item = &Rgb> {
        self.columns.iter().flatten()
    }
}

impl TryFrom<Vec<Vec<Rgb>>> for ColorGrid {
    type Error = WatchError;

    fn try_from(columns: Vec<Vec<Rgb>>) -> Result<Self> {
        Self::from_columns(columns)
    }
}

impl From<ColorGrid> for Vec<Vec<Rgb>> {
    fn from(grid: ColorGrid) -> Self {
        grid.columns
    }
}
