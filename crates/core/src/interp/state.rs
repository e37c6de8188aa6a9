//! Graphics and text state tracked while replaying a content stream.

use crate::font::FontMetrics;
use crate::geometry::{MATRIX_IDENTITY, Matrix, Rect};
use std::sync::Arc;

/// Non-stroking colour.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    /// Greyscale (0.0 = black, 1.0 = white)
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Components in some other colour space (ICC, Separation, ...)
    Components(Vec<f64>),
    /// Pattern or shading fill, by resource name
    Pattern(String),
}

impl Default for Color {
    fn default() -> Self {
        Self::Gray(0.0)
    }
}

impl Color {
    /// `true` unless the colour is a pattern.
    pub const fn is_flat(&self) -> bool {
        !matches!(self, Self::Pattern(_))
    }

    /// Build a colour from `sc`/`scn` components.
    pub fn from_components(space: &ColorSpace, comps: &[f64]) -> Self {
        match (space, comps) {
            (ColorSpace::DeviceGray, &[g]) => Self::Gray(g),
            (ColorSpace::DeviceRGB, &[r, g, b]) => Self::Rgb(r, g, b),
            (ColorSpace::DeviceCMYK, &[c, m, y, k]) => Self::Cmyk(c, m, y, k),
            _ => Self::Components(comps.to_vec()),
        }
    }
}

/// Non-stroking colour space family.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    Pattern,
    /// Any other family, by name
    Other(String),
}

impl ColorSpace {
    /// Family from a colour space name or the first element of an array
    /// colour space.
    pub fn from_family(name: &str) -> Self {
        match name {
            "DeviceGray" | "G" | "CalGray" => Self::DeviceGray,
            "DeviceRGB" | "RGB" | "CalRGB" => Self::DeviceRGB,
            "DeviceCMYK" | "CMYK" => Self::DeviceCMYK,
            "Pattern" => Self::Pattern,
            other => Self::Other(other.to_string()),
        }
    }

    /// Initial colour after `cs`.
    pub fn initial_color(&self) -> Color {
        match self {
            Self::DeviceGray => Color::Gray(0.0),
            Self::DeviceRGB => Color::Rgb(0.0, 0.0, 0.0),
            Self::DeviceCMYK => Color::Cmyk(0.0, 0.0, 0.0, 1.0),
            Self::Pattern => Color::Pattern(String::new()),
            Self::Other(_) => Color::Components(Vec::new()),
        }
    }
}

/// Text state.
///
/// `matrix` is the text matrix (Tm) and `line_matrix` the text line
/// matrix (Tlm); both are reset by `BT`.
#[derive(Debug, Clone)]
pub struct TextState {
    /// Current font metrics, if the font resource was found
    pub font: Option<Arc<FontMetrics>>,
    /// Font resource name (e.g. "F1")
    pub fontname: Option<Arc<str>>,
    pub fontsize: f64,
    pub charspace: f64,
    pub wordspace: f64,
    /// Horizontal scaling in percent
    pub scaling: f64,
    pub leading: f64,
    /// Rendering mode (0-7)
    pub render: i64,
    pub rise: f64,
    pub matrix: Matrix,
    pub line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            fontname: None,
            fontsize: 0.0,
            charspace: 0.0,
            wordspace: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }
}

impl TextState {
    /// Reset both text matrices (start of a text object).
    pub const fn reset(&mut self) {
        self.matrix = MATRIX_IDENTITY;
        self.line_matrix = MATRIX_IDENTITY;
    }
}

/// Graphics state.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix
    pub ctm: Matrix,
    pub fill_space: ColorSpace,
    pub fill_color: Color,
    /// Fill alpha (`/ca` of the last `gs`)
    pub fill_alpha: f64,
    /// Bounding box of the clipping path in page space; `None` is unclipped
    pub clip: Option<Rect>,
    pub text: TextState,
}

impl GraphicsState {
    /// Initial state for a page or form with the given CTM.
    pub fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill_space: ColorSpace::DeviceGray,
            fill_color: Color::Gray(0.0),
            fill_alpha: 1.0,
            clip: None,
            text: TextState::default(),
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new(MATRIX_IDENTITY)
    }
}
