use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgba, RgbaImage};
use shared::protocol::SIGNATURE_DATA_URL_PREFIX;

use crate::error::ClientError;

pub const DEFAULT_PAD_WIDTH: u32 = 500;
pub const DEFAULT_PAD_HEIGHT: u32 = 200;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([17, 24, 39, 255]);
const PEN_RADIUS: i64 = 1;

pub type Point = (f32, f32);

/// Freehand signature surface. Points outside the pad are clamped when rasterised;
/// NaN and infinite coordinates are dropped on input.
#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<Point>>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(DEFAULT_PAD_WIDTH, DEFAULT_PAD_HEIGHT)
    }
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            strokes: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn begin_stroke(&mut self, point: Point) {
        if is_finite(point) {
            self.strokes.push(vec![point]);
        }
    }

    pub fn line_to(&mut self, point: Point) {
        if !is_finite(point) {
            return;
        }
        match self.strokes.last_mut() {
            Some(stroke) => stroke.push(point),
            None => self.begin_stroke(point),
        }
    }

    pub fn add_stroke(&mut self, points: impl IntoIterator<Item = Point>) {
        let stroke: Vec<Point> = points.into_iter().filter(|p| is_finite(*p)).collect();
        if !stroke.is_empty() {
            self.strokes.push(stroke);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn rasterize(&self) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        for stroke in &self.strokes {
            match stroke.as_slice() {
                [] => {}
                [only] => self.stamp(&mut img, *only),
                points => {
                    for pair in points.windows(2) {
                        self.draw_segment(&mut img, pair[0], pair[1]);
                    }
                }
            }
        }
        img
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ClientError> {
        if self.is_empty() {
            return Err(ClientError::Signature("signature pad is empty".into()));
        }
        let mut bytes = Vec::new();
        self.rasterize()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ClientError::Signature(format!("png encoding failed: {e}")))?;
        Ok(bytes)
    }

    pub fn to_data_url(&self) -> Result<String, ClientError> {
        let png = self.to_png_bytes()?;
        Ok(format!("{SIGNATURE_DATA_URL_PREFIX}{}", STANDARD.encode(png)))
    }

    fn draw_segment(&self, img: &mut RgbaImage, from: Point, to: Point) {
        let (from, to) = (self.clamp(from), self.clamp(to));
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            self.stamp(img, (from.0 + dx * t, from.1 + dy * t));
        }
    }

    fn clamp(&self, (x, y): Point) -> Point {
        (
            x.clamp(0.0, (self.width - 1) as f32),
            y.clamp(0.0, (self.height - 1) as f32),
        )
    }

    fn stamp(&self, img: &mut RgbaImage, (x, y): Point) {
        let max_x = i64::from(self.width) - 1;
        let max_y = i64::from(self.height) - 1;
        let cx = (x.round() as i64).clamp(0, max_x);
        let cy = (y.round() as i64).clamp(0, max_y);
        for py in (cy - PEN_RADIUS).max(0)..=(cy + PEN_RADIUS).min(max_y) {
            for px in (cx - PEN_RADIUS).max(0)..=(cx + PEN_RADIUS).min(max_x) {
                img.put_pixel(px as u32, py as u32, INK);
            }
        }
    }
}

fn is_finite((x, y): Point) -> bool {
    x.is_finite() && y.is_finite()
}

#[cfg(test)]
#[path = "tests/signature_tests.rs"]
mod tests;
