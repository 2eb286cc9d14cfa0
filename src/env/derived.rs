//! Derived state.
//!
//! Typed projections of the system variables: the font, colour, mode,
//! graphics frame and so on. A field is refreshed by [`DerivedState::apply`]
//! whenever its variable changes; [`VarKind`] maps variable names to the
//! field they feed.

use phf::phf_map;

use super::config::InactiveMode;
use super::units::{Color, Units, PIXEL};
use crate::tree::Tree;

/// The derived field a system variable feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Magnification,
    Mode,
    Language,
    Font,
    FontFamily,
    FontSeries,
    FontShape,
    FontSize,
    FontBaseSize,
    MathLevel,
    MathDisplay,
    MathCondensed,
    MathVpos,
    Color,
    LineWidth,
    ParWidth,
    PageHeight,
    Preamble,
    Frame,
    ClipLim1,
    ClipLim2,
    SrcStyle,
    SrcSpecial,
    SrcCompact,
    SrcClose,
    InactiveMode,
}

static VAR_KINDS: phf::Map<&'static str, VarKind> = phf_map! {
    "magnification" => VarKind::Magnification,
    "mode" => VarKind::Mode,
    "language" => VarKind::Language,
    "font" => VarKind::Font,
    "font-family" => VarKind::FontFamily,
    "font-series" => VarKind::FontSeries,
    "font-shape" => VarKind::FontShape,
    "font-size" => VarKind::FontSize,
    "font-base-size" => VarKind::FontBaseSize,
    "math-level" => VarKind::MathLevel,
    "math-display" => VarKind::MathDisplay,
    "math-condensed" => VarKind::MathCondensed,
    "math-vpos" => VarKind::MathVpos,
    "color" => VarKind::Color,
    "line-width" => VarKind::LineWidth,
    "par-width" => VarKind::ParWidth,
    "page-height" => VarKind::PageHeight,
    "preamble" => VarKind::Preamble,
    "gr-frame" => VarKind::Frame,
    "gr-clip-lim1" => VarKind::ClipLim1,
    "gr-clip-lim2" => VarKind::ClipLim2,
    "src-style" => VarKind::SrcStyle,
    "src-special" => VarKind::SrcSpecial,
    "src-compact" => VarKind::SrcCompact,
    "src-close" => VarKind::SrcClose,
    "inactive-mode" => VarKind::InactiveMode,
};

/// Variables whose decoded value depends on the length units, in the order
/// they are re-applied after a unit change.
pub const UNIT_DEPENDENT: [&str; 6] = [
    "par-width",
    "page-height",
    "line-width",
    "gr-frame",
    "gr-clip-lim1",
    "gr-clip-lim2",
];

impl VarKind {
    /// The kind of a system variable; `None` for ordinary variables.
    pub fn of(name: &str) -> Option<VarKind> {
        VAR_KINDS.get(name).copied()
    }

    /// All tracked variable names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        VAR_KINDS.keys().copied()
    }

    /// Whether a change to this variable rescales some length unit.
    pub fn affects_units(self) -> bool {
        matches!(
            self,
            VarKind::Magnification
                | VarKind::FontSize
                | VarKind::FontBaseSize
                | VarKind::LineWidth
                | VarKind::ParWidth
                | VarKind::PageHeight
        )
    }
}

/// The typesetting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Text,
    Math,
    Prog,
    Src,
}

impl Mode {
    pub fn decode(s: &str) -> Self {
        match s {
            "math" => Mode::Math,
            "prog" => Mode::Prog,
            "src" => Mode::Src,
            _ => Mode::Text,
        }
    }
}

/// How tags are drawn in source view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcStyle {
    #[default]
    Angular,
    Scheme,
    Latex,
    Functional,
}

impl SrcStyle {
    pub fn decode(s: &str) -> Self {
        match s {
            "scheme" => SrcStyle::Scheme,
            "latex" => SrcStyle::Latex,
            "functional" => SrcStyle::Functional,
            _ => SrcStyle::Angular,
        }
    }
}

/// Which special nodes keep their own rendering in source view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcSpecial {
    /// Everything is shown as a tag
    Raw,
    Format,
    #[default]
    Normal,
    Maximal,
}

impl SrcSpecial {
    pub fn decode(s: &str) -> Self {
        match s {
            "raw" => SrcSpecial::Raw,
            "format" => SrcSpecial::Format,
            "maximal" => SrcSpecial::Maximal,
            _ => SrcSpecial::Normal,
        }
    }
}

/// When a tag is laid out on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcCompact {
    /// Always inline
    All,
    /// Inline unless an argument is a document
    Inline,
    /// Block in block context when an argument is a document
    #[default]
    Normal,
    /// Block whenever the context is block
    None,
}

impl SrcCompact {
    pub fn decode(s: &str) -> Self {
        match s {
            "all" => SrcCompact::All,
            "inline" => SrcCompact::Inline,
            "none" => SrcCompact::None,
            _ => SrcCompact::Normal,
        }
    }
}

/// What a block's closing tag shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcClose {
    /// `(close-tag)`
    Compact,
    /// `(close-tag name)`
    #[default]
    Long,
    /// `(close-tag name first-argument)`
    Repeat,
}

impl SrcClose {
    pub fn decode(s: &str) -> Self {
        match s {
            "compact" | "minimal" => SrcClose::Compact,
            "repeat" => SrcClose::Repeat,
            _ => SrcClose::Long,
        }
    }
}

/// The current font.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub name: String,
    pub family: String,
    pub series: String,
    pub shape: String,
    /// Relative size, a factor of `base_size`
    pub size: f64,
    /// Base size in points
    pub base_size: f64,
}

impl FontSpec {
    /// Effective size in points.
    pub fn effective_size(&self) -> f64 {
        self.size * self.base_size
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            name: "roman".to_string(),
            family: "rm".to_string(),
            series: "medium".to_string(),
            shape: "right".to_string(),
            size: 1.0,
            base_size: 10.0,
        }
    }
}

/// The graphics frame: the length of one graphics unit and the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub unit: i64,
    pub origin: (i64, i64),
}

impl Frame {
    /// One centimetre per unit, origin at zero.
    pub fn standard(units: &Units) -> Self {
        Self {
            unit: (units.inch / 2.54).round() as i64,
            origin: (0, 0),
        }
    }

    /// Decode `(tuple scale <unit> (tuple <x> <y>))`.
    fn decode(t: &Tree, units: &Units) -> Option<Self> {
        if !t.is_tuple() || t.arity() != 3 || t.child(0)?.as_str()? != "scale" {
            return None;
        }
        let unit = units.decode_length(t.child(1)?.as_str()?)?;
        let origin = units.decode_point(t.child(2)?)?;
        Some(Self { unit, origin })
    }
}

/// Page dimensions in tmpt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: i64,
    pub height: i64,
    pub odd_margin: i64,
    pub even_margin: i64,
    pub right_margin: i64,
    pub top_margin: i64,
    pub bottom_margin: i64,
}

impl PageGeometry {
    /// Page variables in the order of the fields.
    pub const VARIABLES: [&'static str; 7] = [
        "page-width",
        "page-height",
        "page-odd",
        "page-even",
        "page-right",
        "page-top",
        "page-bot",
    ];

    /// A4 with 2.5cm side and 3cm top and bottom margins.
    pub fn standard(units: &Units) -> Self {
        let cm = |x: f64| (x * (units.inch / 2.54)).round() as i64;
        Self {
            width: cm(21.0),
            height: cm(29.7),
            odd_margin: cm(2.5),
            even_margin: cm(2.5),
            right_margin: cm(2.5),
            top_margin: cm(3.0),
            bottom_margin: cm(3.0),
        }
    }

    /// Decode from the page variables; missing or malformed ones keep the
    /// standard value.
    pub fn decode(read: impl Fn(&str) -> Tree, units: &Units) -> Self {
        let standard = Self::standard(units);
        let get = |name: &str, fallback: i64| {
            read(name)
                .as_str()
                .and_then(|s| units.decode_length(s))
                .unwrap_or(fallback)
        };
        Self {
            width: get("page-width", standard.width),
            height: get("page-height", standard.height),
            odd_margin: get("page-odd", standard.odd_margin),
            even_margin: get("page-even", standard.even_margin),
            right_margin: get("page-right", standard.right_margin),
            top_margin: get("page-top", standard.top_margin),
            bottom_margin: get("page-bot", standard.bottom_margin),
        }
    }

    pub fn text_width(&self) -> i64 {
        self.width - self.odd_margin - self.right_margin
    }

    pub fn text_height(&self) -> i64 {
        self.height - self.top_margin - self.bottom_margin
    }
}

/// Interpreted values of the system variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub dpi: i64,
    pub magn: f64,
    pub mode: Mode,
    pub language: String,
    pub font: FontSpec,
    pub index_level: i64,
    pub display_style: bool,
    pub math_condensed: bool,
    pub vert_pos: i64,
    pub color: Color,
    pub line_width: i64,
    pub par_width: i64,
    pub page_height: i64,
    pub preamble: bool,
    pub frame: Frame,
    pub clip_lim1: (i64, i64),
    pub clip_lim2: (i64, i64),
    pub src_style: SrcStyle,
    pub src_special: SrcSpecial,
    pub src_compact: SrcCompact,
    pub src_close: SrcClose,
    pub inactive_mode: InactiveMode,
    /// Used while `inactive-mode` is unset or malformed
    default_inactive_mode: InactiveMode,
}

impl DerivedState {
    /// The state of an environment where no system variable is set.
    pub fn new(dpi: i64, default_inactive_mode: InactiveMode) -> Self {
        let units = Units::new(dpi);
        Self {
            dpi,
            magn: 1.0,
            mode: Mode::Text,
            language: "english".to_string(),
            font: FontSpec::default(),
            index_level: 0,
            display_style: false,
            math_condensed: false,
            vert_pos: 0,
            color: Color::BLACK,
            line_width: PIXEL,
            par_width: units.par.round() as i64,
            page_height: units.page.round() as i64,
            preamble: false,
            frame: Frame::standard(&units),
            clip_lim1: (0, 0),
            clip_lim2: (0, 0),
            src_style: SrcStyle::default(),
            src_special: SrcSpecial::default(),
            src_compact: SrcCompact::default(),
            src_close: SrcClose::default(),
            inactive_mode: default_inactive_mode,
            default_inactive_mode,
        }
    }

    /// Length units under the current state.
    pub fn units(&self) -> Units {
        let inch = (self.dpi * PIXEL) as f64;
        Units {
            inch,
            font: self.font.effective_size() * self.magn * inch / 72.27,
            line: self.line_width as f64,
            par: self.par_width as f64,
            page: self.page_height as f64,
        }
    }

    pub fn set_default_inactive_mode(&mut self, mode: InactiveMode) {
        self.default_inactive_mode = mode;
    }

    /// Recompute the field fed by a variable of kind `kind` holding `value`.
    ///
    /// Malformed values decode to the same field value as an unset variable.
    pub fn apply(&mut self, kind: VarKind, value: &Tree) {
        let s = value.as_str().unwrap_or("");
        let fresh = DerivedState::new(self.dpi, self.default_inactive_mode);
        let units = self.units();
        match kind {
            VarKind::Magnification => self.magn = positive(s).unwrap_or(fresh.magn),
            VarKind::Mode => self.mode = Mode::decode(s),
            VarKind::Language => {
                self.language = if s.is_empty() {
                    fresh.language
                } else {
                    s.to_string()
                }
            }
            VarKind::Font => self.font.name = word_or(s, fresh.font.name),
            VarKind::FontFamily => self.font.family = word_or(s, fresh.font.family),
            VarKind::FontSeries => self.font.series = word_or(s, fresh.font.series),
            VarKind::FontShape => self.font.shape = word_or(s, fresh.font.shape),
            VarKind::FontSize => self.font.size = positive(s).unwrap_or(fresh.font.size),
            VarKind::FontBaseSize => {
                self.font.base_size = positive(s).unwrap_or(fresh.font.base_size)
            }
            VarKind::MathLevel => self.index_level = s.trim().parse().unwrap_or(0),
            VarKind::MathDisplay => self.display_style = s == "true",
            VarKind::MathCondensed => self.math_condensed = s == "true",
            VarKind::MathVpos => self.vert_pos = s.trim().parse().unwrap_or(0),
            VarKind::Color => self.color = Color::decode(s).unwrap_or(fresh.color),
            VarKind::LineWidth => {
                self.line_width = units.decode_length(s).unwrap_or(fresh.line_width)
            }
            VarKind::ParWidth => self.par_width = units.decode_length(s).unwrap_or(fresh.par_width),
            VarKind::PageHeight => {
                self.page_height = units.decode_length(s).unwrap_or(fresh.page_height)
            }
            VarKind::Preamble => self.preamble = s == "true",
            VarKind::Frame => {
                self.frame = Frame::decode(value, &units).unwrap_or(fresh.frame)
            }
            VarKind::ClipLim1 => self.clip_lim1 = units.decode_point(value).unwrap_or((0, 0)),
            VarKind::ClipLim2 => self.clip_lim2 = units.decode_point(value).unwrap_or((0, 0)),
            VarKind::SrcStyle => self.src_style = SrcStyle::decode(s),
            VarKind::SrcSpecial => self.src_special = SrcSpecial::decode(s),
            VarKind::SrcCompact => self.src_compact = SrcCompact::decode(s),
            VarKind::SrcClose => self.src_close = SrcClose::decode(s),
            VarKind::InactiveMode => {
                self.inactive_mode =
                    InactiveMode::from_name(s).unwrap_or(self.default_inactive_mode)
            }
        }
    }
}

fn positive(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite() && *x > 0.0)
}

fn word_or(s: &str, fallback: String) -> String {
    if s.is_empty() {
        fallback
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unset_variables_decode_to_initial_state() {
        let initial = DerivedState::new(600, InactiveMode::BlockOnce);
        let mut state = initial.clone();
        for name in VarKind::names() {
            let kind = VarKind::of(name).unwrap();
            state.apply(kind, &Tree::uninit());
        }
        assert_eq!(state, initial);
    }

    #[test]
    fn test_font_size_rescales_font_unit() {
        let mut state = DerivedState::new(600, InactiveMode::default());
        let before = state.units().font;
        state.apply(VarKind::FontSize, &Tree::atom("2"));
        assert_eq!(state.font.effective_size(), 20.0);
        assert!((state.units().font - 2.0 * before).abs() < 1e-6);
    }

    #[test]
    fn test_mode_and_color() {
        let mut state = DerivedState::new(600, InactiveMode::default());
        state.apply(VarKind::Mode, &Tree::atom("math"));
        state.apply(VarKind::Color, &Tree::atom("#ff0000"));
        assert_eq!(state.mode, Mode::Math);
        assert_eq!(state.color, Color::rgb(255, 0, 0));
        state.apply(VarKind::Color, &Tree::atom("no such colour"));
        assert_eq!(state.color, Color::BLACK);
    }

    #[test]
    fn test_frame_and_clipping() {
        let mut state = DerivedState::new(600, InactiveMode::default());
        let frame = Tree::parse("(tuple scale 100tmpt (tuple 5tmpt 6tmpt))").unwrap();
        state.apply(VarKind::Frame, &frame);
        assert_eq!(state.frame, Frame { unit: 100, origin: (5, 6) });
        state.apply(VarKind::ClipLim2, &Tree::parse("(point 7tmpt 8tmpt)").unwrap());
        assert_eq!(state.clip_lim2, (7, 8));
    }

    #[test]
    fn test_inactive_mode_falls_back_to_default() {
        let mut state = DerivedState::new(600, InactiveMode::InlineOnce);
        state.apply(VarKind::InactiveMode, &Tree::atom("block-error"));
        assert_eq!(state.inactive_mode, InactiveMode::BlockError);
        state.apply(VarKind::InactiveMode, &Tree::atom("sideways"));
        assert_eq!(state.inactive_mode, InactiveMode::InlineOnce);
    }

    #[test]
    fn test_page_geometry_decode() {
        let units = Units::new(600);
        let geometry = PageGeometry::decode(
            |name| match name {
                "page-width" => Tree::atom("1000tmpt"),
                "page-odd" => Tree::atom("100tmpt"),
                "page-right" => Tree::atom("50tmpt"),
                _ => Tree::uninit(),
            },
            &units,
        );
        assert_eq!(geometry.width, 1000);
        assert_eq!(geometry.text_width(), 850);
        assert_eq!(geometry.height, PageGeometry::standard(&units).height);
    }
}
