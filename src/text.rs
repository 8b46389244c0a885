//! Label and timestamp text.
//!
//! Text is shaped with `parley` against a single font face and drawn through
//! [`Painter::haloed_glyphs`], so it stays legible over tracks and map tiles alike.

use std::{borrow::Cow, path::Path};

use crate::{
    core::Point,
    error::{TrailError, TrailResult},
    raster::Painter,
};

/// Shaped single-line text, positioned relative to its top-left corner.
#[derive(Clone, Debug)]
pub struct ShapedText {
    pub glyphs: Vec<vello_cpu::Glyph>,
    pub width: f32,
    /// Distance from the top edge to the first baseline.
    pub baseline: f32,
}

pub struct TextRenderer {
    font: vello_cpu::peniko::FontData,
    family: String,
    size: f32,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("family", &self.family)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl TextRenderer {
    /// Font from `font_path` when given, otherwise the system monospace face.
    #[tracing::instrument(level = "debug", skip_all, fields(size = size))]
    pub fn load(font_path: Option<&Path>, size: f32) -> TrailResult<Self> {
        let (bytes, index) = match font_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    TrailError::configuration(format!(
                        "failed to read font '{}': {e}",
                        path.display()
                    ))
                })?;
                (bytes, 0)
            }
            None => system_monospace()?,
        };
        Self::from_bytes(bytes, index, size)
    }

    pub fn from_bytes(bytes: Vec<u8>, index: u32, size: f32) -> TrailResult<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(TrailError::configuration("font size must be finite and > 0"));
        }

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| TrailError::configuration("no font families found in font data"))?;
        let family = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| TrailError::configuration("registered font family has no name"))?
            .to_string();
        tracing::debug!(family = %family, "font registered");

        Ok(Self {
            font: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), index),
            family,
            size,
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn shape(&mut self, text: &str) -> ShapedText {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(self.size));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);

        let mut glyphs = Vec::new();
        let mut baseline = None;
        for line in layout.lines() {
            baseline.get_or_insert(line.metrics().baseline);
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                glyphs.extend(run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                }));
            }
        }

        ShapedText {
            glyphs,
            width: layout.width(),
            baseline: baseline.unwrap_or(self.size),
        }
    }

    /// Draw `text` with its first baseline starting at `(x, baseline_y)`.
    pub fn draw(&mut self, painter: &mut Painter, text: &str, x: f64, baseline_y: f64) {
        let shaped = self.shape(text);
        self.draw_shaped(painter, &shaped, x, baseline_y);
    }

    pub fn draw_shaped(&self, painter: &mut Painter, shaped: &ShapedText, x: f64, baseline_y: f64) {
        if shaped.glyphs.is_empty() {
            return;
        }
        let origin = Point::new(x, baseline_y - f64::from(shaped.baseline));
        painter.haloed_glyphs(&self.font, self.size, origin, &shaped.glyphs);
    }
}

fn system_monospace() -> TrailResult<(Vec<u8>, u32)> {
    use usvg::fontdb::{Database, Family, Query};

    let mut db = Database::new();
    db.load_system_fonts();

    let families = [Family::Monospace, Family::SansSerif];
    let query = Query {
        families: &families,
        ..Query::default()
    };
    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|f| f.id))
        .ok_or_else(|| {
            TrailError::configuration(
                "no system font found; set font_path or a font size of 0 to disable text",
            )
        })?;

    db.with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| TrailError::configuration("system font data could not be loaded"))
}
