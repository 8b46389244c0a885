//! Pixel buffers and the vector painter that draws into them.
//!
//! [`Raster`] stores premultiplied RGBA8 rows. Frames produced by the engine are fully opaque, so
//! the bytes double as straight RGBA. [`Painter`] records strokes, fills and glyph runs with
//! `vello_cpu` and composites the result over a target raster on [`Painter::finish`].

use crate::{
    color::Rgb8,
    core::Point,
    error::{TrailError, TrailResult},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// Row-major premultiplied RGBA8.
    pub data: Vec<u8>,
}

impl Raster {
    pub fn filled(width: u32, height: u32, color: Rgb8) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Premultiplied RGBA8 at `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 3].copy_from_slice(&rgb);
        self.data[i + 3] = 255;
    }

    /// Alpha dropped; meaningful because engine rasters are opaque.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() / 4 * 3);
        for px in self.data.chunks_exact(4) {
            out.extend_from_slice(&px[..3]);
        }
        out
    }
}

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> TrailResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(TrailError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Stroke style shared by trails and glyph halos.
fn round_stroke(width: f64) -> vello_cpu::kurbo::Stroke {
    vello_cpu::kurbo::Stroke::new(width)
        .with_caps(vello_cpu::kurbo::Cap::Round)
        .with_join(vello_cpu::kurbo::Join::Round)
}

fn paint(color: Rgb8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, 255)
}

pub(crate) fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

pub struct Painter {
    ctx: vello_cpu::RenderContext,
    width: u16,
    height: u16,
}

impl Painter {
    pub fn for_raster(target: &Raster) -> TrailResult<Self> {
        let width: u16 = target
            .width
            .try_into()
            .map_err(|_| TrailError::render("raster width exceeds u16"))?;
        let height: u16 = target
            .height
            .try_into()
            .map_err(|_| TrailError::render("raster height exceeds u16"))?;
        Ok(Self {
            ctx: vello_cpu::RenderContext::new(width, height),
            width,
            height,
        })
    }

    /// Connected polyline with round caps and joins.
    pub fn stroke_polyline(&mut self, points: &[Point], color: Rgb8, width: f64) {
        if points.len() < 2 {
            return;
        }
        let mut path = vello_cpu::kurbo::BezPath::new();
        path.move_to(point_to_cpu(points[0]));
        for p in &points[1..] {
            path.line_to(point_to_cpu(*p));
        }
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_stroke(round_stroke(width));
        self.ctx.set_paint(paint(color));
        self.ctx.stroke_path(&path);
    }

    pub fn stroke_line(&mut self, from: Point, to: Point, color: Rgb8, width: f64) {
        self.stroke_polyline(&[from, to], color, width);
    }

    /// Filled disc with a 1 px outline.
    pub fn marker(&mut self, center: Point, radius: f64, fill: Rgb8, outline: Rgb8) {
        use vello_cpu::kurbo::Shape as _;

        let circle = vello_cpu::kurbo::Circle::new(point_to_cpu(center), radius);
        let path = circle.to_path(0.1);
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint(fill));
        self.ctx.fill_path(&path);
        self.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(1.0));
        self.ctx.set_paint(paint(outline));
        self.ctx.stroke_path(&path);
    }

    /// Glyphs positioned relative to `origin` (the layout's top-left corner), drawn with a
    /// white halo and a black fill.
    pub fn haloed_glyphs(
        &mut self,
        font: &vello_cpu::peniko::FontData,
        font_size: f32,
        origin: Point,
        glyphs: &[vello_cpu::Glyph],
    ) {
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((origin.x, origin.y)));

        self.ctx.set_paint(paint(Rgb8::WHITE));
        self.ctx.set_stroke(round_stroke(3.0));
        self.ctx
            .glyph_run(font)
            .font_size(font_size)
            .stroke_glyphs(glyphs.iter().copied());
        self.ctx
            .glyph_run(font)
            .font_size(font_size)
            .fill_glyphs(glyphs.iter().copied());

        self.ctx.set_paint(paint(Rgb8::BLACK));
        self.ctx
            .glyph_run(font)
            .font_size(font_size)
            .fill_glyphs(glyphs.iter().copied());

        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    /// Rasterize everything recorded so far and composite it over `target`.
    pub fn finish(mut self, target: &mut Raster) -> TrailResult<()> {
        if u32::from(self.width) != target.width || u32::from(self.height) != target.height {
            return Err(TrailError::render("painter and target raster size mismatch"));
        }
        self.ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.render_to_pixmap(&mut pixmap);
        over_in_place(&mut target.data, pixmap.data_as_u8_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 255];
        assert_eq!(over(dst, [255, 255, 255, 0]), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255]), [255, 0, 0, 255]);
    }

    #[test]
    fn over_half_alpha_blends() {
        // Premultiplied black at 50% over white.
        let out = over([255, 255, 255, 255], [0, 0, 0, 128]);
        assert_eq!(out, [127, 127, 127, 255]);
    }

    #[test]
    fn over_in_place_rejects_mismatched_buffers() {
        let mut dst = vec![0u8; 8];
        assert!(over_in_place(&mut dst, &[0u8; 4]).is_err());
    }

    #[test]
    fn filled_raster_and_pixel_access() {
        let mut r = Raster::filled(3, 2, Rgb8::new(1, 2, 3));
        assert_eq!(r.pixel(2, 1), Some([1, 2, 3, 255]));
        assert_eq!(r.pixel(3, 0), None);
        r.put_rgb(0, 0, [9, 9, 9]);
        assert_eq!(r.pixel(0, 0), Some([9, 9, 9, 255]));
        assert_eq!(r.to_rgb8().len(), 3 * 2 * 3);
    }

    #[test]
    fn painter_strokes_land_in_the_target() {
        let mut r = Raster::filled(32, 32, Rgb8::WHITE);
        let mut p = Painter::for_raster(&r).unwrap();
        p.stroke_line(
            Point::new(2.0, 16.0),
            Point::new(30.0, 16.0),
            Rgb8::new(255, 0, 0),
            4.0,
        );
        p.finish(&mut r).unwrap();

        let mid = r.pixel(16, 16).unwrap();
        assert!(mid[0] > 200 && mid[1] < 60, "unexpected {mid:?}");
        assert_eq!(r.pixel(16, 2), Some([255, 255, 255, 255]));
    }

    #[test]
    fn painter_marker_fills_center() {
        let mut r = Raster::filled(20, 20, Rgb8::WHITE);
        let mut p = Painter::for_raster(&r).unwrap();
        p.marker(Point::new(10.0, 10.0), 4.0, Rgb8::new(0, 0, 255), Rgb8::BLACK);
        p.finish(&mut r).unwrap();
        let c = r.pixel(10, 10).unwrap();
        assert!(c[2] > 200 && c[0] < 60, "unexpected {c:?}");
    }
}
