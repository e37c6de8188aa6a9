//! Non-stroking colour operators.
//!
//! Handles: g, rg, k, cs, sc, scn
//!
//! Stroking colour (G, RG, K, CS, SC, SCN) never paints a fill and is
//! ignored.

use crate::interp::interpreter::PageInterpreter;
use crate::interp::state::{Color, ColorSpace};
use crate::model::PDFObject;

impl PageInterpreter<'_> {
    /// PDF operator: `g`
    pub fn do_g(&mut self, gray: f64) {
        self.state.fill_space = ColorSpace::DeviceGray;
        self.state.fill_color = Color::Gray(gray);
    }

    /// PDF operator: `rg`
    pub fn do_rg(&mut self, r: f64, g: f64, b: f64) {
        self.state.fill_space = ColorSpace::DeviceRGB;
        self.state.fill_color = Color::Rgb(r, g, b);
    }

    /// PDF operator: `k`
    pub fn do_k(&mut self, c: f64, m: f64, y: f64, k: f64) {
        self.state.fill_space = ColorSpace::DeviceCMYK;
        self.state.fill_color = Color::Cmyk(c, m, y, k);
    }

    /// Sets the fill colour space, by family name or `/ColorSpace`
    /// resource, and resets the colour to its initial value.
    ///
    /// PDF operator: `cs`
    pub fn do_cs(&mut self, name: &str) {
        let space = match ColorSpace::from_family(name) {
            ColorSpace::Other(_) => self.resource_color_space(name),
            device => device,
        };
        self.state.fill_color = space.initial_color();
        self.state.fill_space = space;
    }

    fn resource_color_space(&self, name: &str) -> ColorSpace {
        let family = match self.lookup("ColorSpace", name) {
            Some((_, PDFObject::Name(family))) => Some(family.as_str()),
            Some((_, PDFObject::Array(arr))) => arr
                .first()
                .map(|f| self.doc.resolve(f))
                .and_then(|f| f.as_name().ok()),
            _ => None,
        };
        ColorSpace::from_family(family.unwrap_or(name))
    }

    /// Sets the fill colour in the current space. In a Pattern space the
    /// last operand names the pattern.
    ///
    /// PDF operators: `sc`, `scn`
    pub fn do_scn(&mut self, args: &[PDFObject]) {
        if self.state.fill_space == ColorSpace::Pattern {
            let name = args.last().and_then(|n| n.as_name().ok()).unwrap_or_default();
            self.state.fill_color = Color::Pattern(name.to_string());
            return;
        }
        let comps: Vec<f64> = args.iter().filter_map(|c| c.as_num().ok()).collect();
        self.state.fill_color = Color::from_components(&self.state.fill_space, &comps);
    }
}
