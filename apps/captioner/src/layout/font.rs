//! Caption font loading and glyph measurement/rasterization.
//!
//! A missing or unparseable font must never fail a composition: the load
//! falls back to a short list of well-known system fonts, and past that to a
//! built-in placeholder face with a fixed advance per character. The
//! placeholder keeps the whole layout pipeline deterministic without any
//! font file on disk, which is also what the tests rely on.

use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use tracing::warn;

/// Advance of the built-in placeholder face, in em.
const FALLBACK_ADVANCE_EM: f32 = 0.5;

/// System fonts probed when the configured path is unusable. CJK-capable
/// entries first; single-font TrueType files only (no .ttc collections,
/// no CFF outlines — rusttype parses neither).
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
];

/// A font the compositor can measure and draw with.
pub enum CaptionFont {
    TrueType(Font<'static>),
    /// Placeholder face: fixed advance, glyphs drawn as solid boxes.
    Fallback,
}

impl CaptionFont {
    /// Loads the configured font, degrading through system candidates to the
    /// built-in placeholder. Never fails.
    pub fn load(path: &Path) -> Self {
        if let Some(font) = read_font(path) {
            return CaptionFont::TrueType(font);
        }
        warn!(
            "caption font {} unavailable, probing system fonts",
            path.display()
        );
        for candidate in SYSTEM_FONT_CANDIDATES {
            if let Some(font) = read_font(Path::new(candidate)) {
                return CaptionFont::TrueType(font);
            }
        }
        warn!("no usable font file found, using built-in placeholder glyphs");
        CaptionFont::Fallback
    }

    /// Horizontal advance of `ch` at `size` pixels.
    ///
    /// Prefers the positioned glyph's pixel bounding box (matches rendered
    /// extent); falls back to the advance metric for glyphs without an
    /// outline, e.g. spaces.
    pub fn char_width(&self, size: f32, ch: char) -> f32 {
        match self {
            CaptionFont::TrueType(font) => {
                let scale = Scale::uniform(size);
                let ascent = font.v_metrics(scale).ascent;
                let glyph = font.glyph(ch).scaled(scale).positioned(point(0.0, ascent));
                match glyph.pixel_bounding_box() {
                    Some(bb) => bb.max.x as f32,
                    None => glyph.unpositioned().h_metrics().advance_width,
                }
            }
            CaptionFont::Fallback => size * FALLBACK_ADVANCE_EM,
        }
    }

    /// Draws `ch` with its top-left at `(x, y)`, alpha-blending coverage
    /// onto the image. Out-of-bounds fragments are clipped.
    pub fn draw_char(
        &self,
        img: &mut RgbaImage,
        size: f32,
        x: f32,
        y: f32,
        color: Rgba<u8>,
        ch: char,
    ) {
        match self {
            CaptionFont::TrueType(font) => {
                let scale = Scale::uniform(size);
                let ascent = font.v_metrics(scale).ascent;
                let glyph = font.glyph(ch).scaled(scale).positioned(point(x, y + ascent));
                let Some(bb) = glyph.pixel_bounding_box() else {
                    return;
                };
                glyph.draw(|gx, gy, coverage| {
                    let px = gx as i32 + bb.min.x;
                    let py = gy as i32 + bb.min.y;
                    if px < 0 || py < 0 {
                        return;
                    }
                    let (px, py) = (px as u32, py as u32);
                    if px >= img.width() || py >= img.height() {
                        return;
                    }
                    blend(img.get_pixel_mut(px, py), color, coverage);
                });
            }
            CaptionFont::Fallback => {
                if ch.is_whitespace() {
                    return;
                }
                let advance = size * FALLBACK_ADVANCE_EM;
                let x0 = x + advance * 0.1;
                let x1 = x + advance * 0.9;
                let y0 = y + size * 0.2;
                let y1 = y + size * 0.9;
                fill_box(img, x0, y0, x1, y1, color);
            }
        }
    }
}

fn read_font(path: &Path) -> Option<Font<'static>> {
    fs::read(path).ok().and_then(Font::try_from_vec)
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let sa = coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let inv = 1.0 - sa;
    dst.0[0] = (src.0[0] as f32 * sa + dst.0[0] as f32 * inv) as u8;
    dst.0[1] = (src.0[1] as f32 * sa + dst.0[1] as f32 * inv) as u8;
    dst.0[2] = (src.0[2] as f32 * sa + dst.0[2] as f32 * inv) as u8;
    dst.0[3] = 255;
}

fn fill_box(img: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
    let x0 = (x0.round() as i64).max(0) as u32;
    let y0 = (y0.round() as i64).max(0) as u32;
    let x1 = ((x1.round() as i64).max(0) as u32).min(img.width());
    let y1 = ((y1.round() as i64).max(0) as u32).min(img.height());
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: Rgba<u8> = Rgba([10, 10, 10, 255]);

    #[test]
    fn test_fallback_advance_is_half_em() {
        let font = CaptionFont::Fallback;
        assert_eq!(font.char_width(100.0, '中'), 50.0);
        assert_eq!(font.char_width(100.0, 'a'), 50.0);
    }

    #[test]
    fn test_fallback_draws_inside_its_cell() {
        let font = CaptionFont::Fallback;
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        font.draw_char(&mut img, 40.0, 10.0, 10.0, TEXT, '中');

        let marked: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == TEXT)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!marked.is_empty(), "placeholder glyph must mark pixels");
        for (x, y) in marked {
            assert!((10..=30).contains(&x), "x={x} outside the 20px advance cell");
            assert!((10..=50).contains(&y), "y={y} outside the glyph height");
        }
    }

    #[test]
    fn test_fallback_skips_whitespace() {
        let font = CaptionFont::Fallback;
        let mut img = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        font.draw_char(&mut img, 40.0, 5.0, 5.0, TEXT, ' ');
        assert!(img.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_draw_clips_at_image_edge() {
        let font = CaptionFont::Fallback;
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        // Mostly off-canvas on all sides; must not panic.
        font.draw_char(&mut img, 40.0, -15.0, -30.0, TEXT, '中');
        font.draw_char(&mut img, 40.0, 15.0, 15.0, TEXT, '中');
    }
}
