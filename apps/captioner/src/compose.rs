//! Caption band compositing.
//!
//! Fills the lower band of the image with an opaque backing color, then
//! rasterizes the wrapped caption lines into it: the block of lines is
//! vertically centered on the band (with a small fixed upward bias), each
//! line is horizontally centered, and characters advance by their measured
//! width plus the composition's global spacing.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::config::LayoutConfig;
use crate::errors::ComposeError;
use crate::layout::{solve_spacing, wrap_caption, CaptionFont, MeasuredLine};

/// Opaque backing for the caption band.
const BAND_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Near-black caption text.
const TEXT_COLOR: Rgba<u8> = Rgba([10, 10, 10, 255]);
/// Vertical distance between line tops, in em.
const LINE_SPACING_EM: f32 = 1.25;
/// Upward shift of the whole block, in em, balancing ascender/descender space.
const BLOCK_BIAS_EM: f32 = 0.2;
/// Font pixel size is image width divided by this.
const FONT_SIZE_DIVISOR: f32 = 9.0;

/// Renders `text` into the caption band of `source`.
///
/// The source is left untouched; the returned image is a fresh buffer. A
/// caption that wraps to zero lines still succeeds and yields the source
/// with only the band filled.
pub fn render_caption(
    source: &DynamicImage,
    text: &str,
    font: &CaptionFont,
    layout: &LayoutConfig,
) -> RgbaImage {
    let mut img = source.to_rgba8();
    let (width, height) = img.dimensions();

    let band_top = (height as f32 * layout.band_start_ratio) as u32;
    fill_band(&mut img, band_top);

    let font_size = width as f32 / FONT_SIZE_DIVISOR;
    let lines: Vec<MeasuredLine> = wrap_caption(text, layout.max_chars_per_line)
        .iter()
        .map(|line| MeasuredLine::measure(line, font, font_size))
        .collect();

    let safe_width = width as f32 * layout.safe_width_ratio;
    let spacing = solve_spacing(&lines, safe_width, layout.spacing_ceiling_em * font_size);

    let line_spacing = font_size * LINE_SPACING_EM;
    let block_height = lines.len() as f32 * line_spacing;
    let band_center_y = height as f32 * (layout.band_start_ratio + 1.0) / 2.0;
    let start_y = band_center_y - block_height / 2.0 - font_size * BLOCK_BIAS_EM;

    for (i, line) in lines.iter().enumerate() {
        let mut cursor_x = (width as f32 - line.rendered_width(spacing)) / 2.0;
        let y = start_y + i as f32 * line_spacing;
        for (&ch, &char_width) in line.chars.iter().zip(&line.widths) {
            font.draw_char(&mut img, font_size, cursor_x, y, TEXT_COLOR, ch);
            cursor_x += char_width + spacing;
        }
    }

    img
}

/// Encodes an RGBA buffer as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ComposeError> {
    use image::codecs::png::PngEncoder;
    use image::ImageEncoder;

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

fn fill_band(img: &mut RgbaImage, band_top: u32) {
    for y in band_top..img.height() {
        for x in 0..img.width() {
            img.put_pixel(x, y, BAND_FILL);
        }
    }
}
