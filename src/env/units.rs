//! Lengths, points and colours.
//!
//! Lengths are integers in `tmpt`. A pixel is 256 tmpt and an inch is
//! `dpi` pixels; the other absolute units derive from the inch. Font,
//! line, paragraph and page units depend on the current derived state and
//! are carried in [`Units`].

use lazy_static::lazy_static;
use phf::phf_map;
use regex::Regex;

use crate::tree::{Tag, Tree};

/// Size of one screen pixel in tmpt.
pub const PIXEL: i64 = 256;

lazy_static! {
    static ref LENGTH_RE: Regex =
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+))\s*([A-Za-z]*)\s*$")
            .expect("length pattern is valid");
}

/// Sizes of the length units in tmpt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    pub inch: f64,
    /// `1fn`: the magnified font size
    pub font: f64,
    /// `1ln`: the current line width
    pub line: f64,
    /// `1par`: the paragraph width
    pub par: f64,
    /// `1pag`: the page height
    pub page: f64,
}

impl Units {
    /// Units at `dpi` with a 10pt font and A4 paper.
    pub fn new(dpi: i64) -> Self {
        let inch = (dpi * PIXEL) as f64;
        Self {
            inch,
            font: 10.0 * inch / 72.27,
            line: PIXEL as f64,
            par: 15.0 * (inch / 2.54),
            page: 29.7 * (inch / 2.54),
        }
    }

    /// Size of `unit` in tmpt. A missing unit means tmpt.
    pub fn unit(&self, unit: &str) -> Option<f64> {
        Some(match unit {
            "" | "tmpt" => 1.0,
            "px" => PIXEL as f64,
            "in" => self.inch,
            "pt" => self.inch / 72.27,
            "bp" => self.inch / 72.0,
            "mm" => self.inch / 25.4,
            "cm" => self.inch / 2.54,
            "fn" | "em" => self.font,
            "ex" => self.font * 0.5,
            "spc" => self.font * 0.25,
            "ln" => self.line,
            "par" => self.par,
            "pag" => self.page,
            _ => return None,
        })
    }

    /// Decode a length such as `2.5cm` into tmpt.
    pub fn decode_length(&self, s: &str) -> Option<i64> {
        let (amount, unit) = split_length(s)?;
        let size = self.unit(unit)?;
        Some((amount * size).round() as i64)
    }

    /// Decode a length that may stretch.
    ///
    /// `spc` is the interword space of the font, which shrinks to two
    /// thirds and stretches to one and a half times its natural width. A
    /// unit with a trailing `*` (`1fn*`) is pure stretch: zero natural
    /// width, up to the given size. Every other length is rigid.
    pub fn decode_space(&self, s: &str) -> Option<Space> {
        let trimmed = s.trim();
        if let Some(stretch) = trimmed.strip_suffix('*') {
            let max = self.decode_length(stretch)?;
            return Some(Space::new(0, 0, max));
        }
        let (amount, unit) = split_length(trimmed)?;
        if unit == "spc" {
            let def = amount * self.unit(unit)?;
            return Some(Space::new(
                (def * 2.0 / 3.0).round() as i64,
                def.round() as i64,
                (def * 1.5).round() as i64,
            ));
        }
        self.decode_length(trimmed).map(Space::rigid)
    }

    /// Decode `(point x y)` or `(tuple x y)` with length coordinates.
    pub fn decode_point(&self, t: &Tree) -> Option<(i64, i64)> {
        if !(t.is(&Tag::Point) || t.is_tuple()) || t.arity() != 2 {
            return None;
        }
        let x = self.decode_length(t.child(0)?.as_str()?)?;
        let y = self.decode_length(t.child(1)?.as_str()?)?;
        Some((x, y))
    }

    /// Sum of two lengths, as a tmpt string.
    pub fn add_lengths(&self, l1: &str, l2: &str) -> Option<String> {
        let sum = self.decode_length(l1)?.checked_add(self.decode_length(l2)?)?;
        Some(format_length(sum))
    }

    /// `x` times a length, as a tmpt string.
    pub fn multiply_length(&self, x: f64, l: &str) -> Option<String> {
        let length = self.decode_length(l)?;
        Some(format_length((x * length as f64).round() as i64))
    }

    /// Ratio of two lengths. `None` when the divisor is zero.
    pub fn divide_lengths(&self, l1: &str, l2: &str) -> Option<f64> {
        let divisor = self.decode_length(l2)?;
        if divisor == 0 {
            return None;
        }
        Some(self.decode_length(l1)? as f64 / divisor as f64)
    }
}

/// A length with shrink and stretch bounds, in tmpt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Space {
    pub min: i64,
    pub def: i64,
    pub max: i64,
}

impl Space {
    pub const fn new(min: i64, def: i64, max: i64) -> Self {
        Self { min, def, max }
    }

    pub const fn rigid(len: i64) -> Self {
        Self::new(len, len, len)
    }
}

/// Whether `s` is a number followed by a known unit.
///
/// Plain numbers are not lengths, so arithmetic on them stays numeric.
pub fn is_length(s: &str) -> bool {
    match split_length(s) {
        Some((_, unit)) => !unit.is_empty() && Units::new(96).unit(unit).is_some(),
        None => false,
    }
}

/// Split a length into its amount and unit.
fn split_length(s: &str) -> Option<(f64, &str)> {
    let caps = LENGTH_RE.captures(s)?;
    let amount = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps.get(2).map_or("", |m| m.as_str());
    Some((amount, unit))
}

pub fn format_length(tmpt: i64) -> String {
    format!("{}tmpt", tmpt)
}

// ============================================================================
// Colours
// ============================================================================

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

static NAMED_COLORS: phf::Map<&'static str, (u8, u8, u8)> = phf_map! {
    "black" => (0, 0, 0),
    "white" => (255, 255, 255),
    "grey" => (184, 184, 184),
    "gray" => (184, 184, 184),
    "light grey" => (208, 208, 208),
    "dark grey" => (112, 112, 112),
    "red" => (255, 0, 0),
    "green" => (0, 255, 0),
    "blue" => (0, 0, 255),
    "yellow" => (255, 255, 0),
    "magenta" => (255, 0, 255),
    "cyan" => (0, 255, 255),
    "orange" => (255, 128, 0),
    "brown" => (128, 32, 0),
    "pink" => (255, 128, 128),
    "dark red" => (128, 0, 0),
    "dark green" => (0, 128, 0),
    "dark blue" => (0, 0, 128),
};

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    /// Create from hex string (e.g., "#ff0000", "#f00" or "#ff000080").
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let parse = |s: &str| u8::from_str_radix(s, 16).ok();

        match hex.len() {
            3 => {
                let r = parse(&hex[0..1].repeat(2))?;
                let g = parse(&hex[1..2].repeat(2))?;
                let b = parse(&hex[2..3].repeat(2))?;
                Some(Color::rgb(r, g, b))
            }
            6 => Some(Color::rgb(
                parse(&hex[0..2])?,
                parse(&hex[2..4])?,
                parse(&hex[4..6])?,
            )),
            8 => Some(Color {
                r: parse(&hex[0..2])?,
                g: parse(&hex[2..4])?,
                b: parse(&hex[4..6])?,
                a: parse(&hex[6..8])?,
            }),
            _ => None,
        }
    }

    /// A colour name or a `#` hex code.
    pub fn decode(s: &str) -> Option<Self> {
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        NAMED_COLORS.get(s).map(|&(r, g, b)| Color::rgb(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}
