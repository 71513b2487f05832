//! Frame annotation: marks frames in which the target was detected

use crate::dispatcher::DetectionResult;
use crate::frame::Frame;
use focuscam_core::AnnotationConfig;
use image::{Rgb, RgbImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_ADVANCE: u32 = 6;

/// Draws a fixed text marker (and optionally match boxes) on positive frames.
/// Frames without the target pass through untouched.
#[derive(Debug, Clone)]
pub struct Annotator {
    text: String,
    origin: (u32, u32),
    scale: u32,
    color: Rgb<u8>,
    draw_boxes: bool,
}

impl Annotator {
    pub fn new(config: &AnnotationConfig) -> Self {
        Self {
            text: config.marker_text.to_uppercase(),
            origin: config.marker_origin,
            scale: config.marker_scale.max(1),
            color: Rgb(config.marker_color),
            draw_boxes: config.draw_boxes,
        }
    }

    pub fn annotate(&self, mut frame: Frame, result: &DetectionResult) -> Frame {
        if !result.present {
            return frame;
        }

        let image = frame.pixels_mut();
        if self.draw_boxes {
            for detection in &result.matches {
                let b = detection.bbox;
                draw_rectangle(image, b.x1, b.y1, b.x2, b.y2, self.color);
            }
        }
        draw_text(image, self.origin, self.scale, &self.text, self.color);
        frame
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(&AnnotationConfig::default())
    }
}

fn draw_rectangle(image: &mut RgbImage, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let clamp_x = |v: f32| v.round().clamp(0.0, (width - 1) as f32) as u32;
    let clamp_y = |v: f32| v.round().clamp(0.0, (height - 1) as f32) as u32;
    let (left, right) = (clamp_x(x1.min(x2)), clamp_x(x1.max(x2)));
    let (top, bottom) = (clamp_y(y1.min(y2)), clamp_y(y1.max(y2)));

    for x in left..=right {
        image.put_pixel(x, top, color);
        image.put_pixel(x, bottom, color);
    }
    for y in top..=bottom {
        image.put_pixel(left, y, color);
        image.put_pixel(right, y, color);
    }
}

/// Blit `text` in the 5x7 font; each glyph bit becomes a `scale`-sized block.
/// Anything outside the image is clipped.
fn draw_text(image: &mut RgbImage, origin: (u32, u32), scale: u32, text: &str, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let mut x = u64::from(origin.0);
    let y = u64::from(origin.1);
    let scale = u64::from(scale);

    for ch in text.chars() {
        if x >= u64::from(width) {
            break;
        }
        if let Some(glyph) = glyph_bits(ch) {
            for (row, &pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let bx = x + u64::from(col) * scale;
                    let by = y + row as u64 * scale;
                    fill_block(image, bx, by, scale, width, height, color);
                }
            }
        }
        x += u64::from(GLYPH_ADVANCE) * scale;
    }
}

fn fill_block(
    image: &mut RgbImage,
    left: u64,
    top: u64,
    size: u64,
    width: u32,
    height: u32,
    color: Rgb<u8>,
) {
    let right = (left + size).min(u64::from(width));
    let bottom = (top + size).min(u64::from(height));
    for py in top..bottom {
        for px in left..right {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        ':' => [0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}
