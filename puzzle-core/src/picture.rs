//! # Picture Buffers
//!
//! Planar 8-bit pictures as handed over by the host: one input and one
//! output per frame. The core reads and writes them through explicit
//! pitches and never exceeds the visible area.

use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{try_vec, PuzzleError, Result};

/// Row alignment applied to freshly allocated planes.
const PITCH_ALIGN: usize = 16;

// ============================================================================
// Chroma formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromaFormat {
    /// Y plane, U and V at half width and half height
    I420,
    /// Y plane, U and V at half width
    I422,
    /// Y, U and V at full size
    I444,
    /// Y plane only
    Grey,
}

impl ChromaFormat {
    pub const ALL: [ChromaFormat; 4] = [Self::I420, Self::I422, Self::I444, Self::Grey];

    pub fn planes(self) -> usize {
        match self {
            Self::Grey => 1,
            _ => 3,
        }
    }

    /// Horizontal and vertical subsampling divisors of `plane`.
    pub fn subsampling(self, plane: usize) -> (usize, usize) {
        if plane == 0 {
            return (1, 1);
        }
        match self {
            Self::I420 => (2, 2),
            Self::I422 => (2, 1),
            Self::I444 | Self::Grey => (1, 1),
        }
    }

    pub fn fourcc(self) -> &'static str {
        match self {
            Self::I420 => "I420",
            Self::I422 => "I422",
            Self::I444 => "I444",
            Self::Grey => "GREY",
        }
    }

    /// Accepts the fourcc plus the usual aliases.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "I420" | "YV12" | "J420" | "YUV420P" => Ok(Self::I420),
            "I422" | "J422" | "YUV422P" => Ok(Self::I422),
            "I444" | "J444" | "YUV444P" => Ok(Self::I444),
            "GREY" | "GRAY" | "Y800" => Ok(Self::Grey),
            _ => Err(PuzzleError::UnsupportedChroma(name.to_string())),
        }
    }
}

impl std::fmt::Display for ChromaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fourcc())
    }
}

// ============================================================================
// Planes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneBuf {
    pub pixels: Vec<u8>,
    /// Bytes from one row to the next
    pub pitch: usize,
    /// Bytes of visible data per row
    pub visible_pitch: usize,
    pub visible_lines: usize,
    /// Bytes per pixel
    pub pixel_pitch: usize,
}

impl PlaneBuf {
    pub fn new(width: usize, lines: usize) -> Result<Self> {
        let pitch = (width + PITCH_ALIGN - 1) / PITCH_ALIGN * PITCH_ALIGN;
        let mut pixels = try_vec(pitch * lines, "picture plane")?;
        pixels.resize(pitch * lines, 0);
        Ok(Self {
            pixels,
            pitch,
            visible_pitch: width,
            visible_lines: lines,
            pixel_pitch: 1,
        })
    }

    /// Visible width in pixels.
    pub fn width(&self) -> usize {
        self.visible_pitch / self.pixel_pitch.max(1)
    }

    /// Width in pixels of a whole row, padding included.
    pub fn pitch_width(&self) -> usize {
        self.pitch / self.pixel_pitch.max(1)
    }

    pub fn lines(&self) -> usize {
        self.visible_lines
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.pitch + x * self.pixel_pitch]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.pixels[y * self.pitch + x * self.pixel_pitch] = value;
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.pixels[y * self.pitch..y * self.pitch + self.visible_pitch]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.pixels[y * self.pitch..y * self.pitch + self.visible_pitch]
    }

    /// Fill the visible area with `value`.
    pub fn fill(&mut self, value: u8) {
        for y in 0..self.visible_lines {
            self.row_mut(y).fill(value);
        }
    }

    /// Whether every visible row lies inside `pixels`.
    pub fn is_addressable(&self) -> bool {
        self.pixel_pitch >= 1
            && self.pitch >= self.visible_pitch
            && self
                .pitch
                .checked_mul(self.visible_lines)
                .is_some_and(|len| self.pixels.len() >= len)
    }

    /// Copy the visible area of `src`, clipped to the smaller of both planes.
    /// Nothing is copied when either plane is not addressable.
    pub fn copy_from(&mut self, src: &PlaneBuf) {
        if !self.is_addressable() || !src.is_addressable() {
            return;
        }
        let lines = self.visible_lines.min(src.visible_lines);
        let bytes = self.visible_pitch.min(src.visible_pitch);
        for y in 0..lines {
            self.row_mut(y)[..bytes].copy_from_slice(&src.row(y)[..bytes]);
        }
    }
}

// ============================================================================
// Pictures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub chroma: ChromaFormat,
    pub planes: Vec<PlaneBuf>,
}

impl Picture {
    /// Black picture (Y = 0, U = V = 128).
    pub fn new(chroma: ChromaFormat, width: usize, height: usize) -> Result<Self> {
        let mut planes = try_vec(chroma.planes(), "picture planes")?;
        for plane in 0..chroma.planes() {
            let (w_div, h_div) = chroma.subsampling(plane);
            let mut buf = PlaneBuf::new(width.div_ceil(w_div), height.div_ceil(h_div))?;
            if plane > 0 {
                buf.fill(128);
            }
            planes.push(buf);
        }
        Ok(Self { chroma, planes })
    }

    pub fn width(&self) -> usize {
        self.planes.first().map_or(0, PlaneBuf::width)
    }

    pub fn height(&self) -> usize {
        self.planes.first().map_or(0, PlaneBuf::lines)
    }

    /// Same chroma and same visible size in every plane.
    pub fn same_geometry(&self, other: &Picture) -> bool {
        self.chroma == other.chroma
            && self.planes.len() == other.planes.len()
            && self
                .planes
                .iter()
                .zip(&other.planes)
                .all(|(a, b)| a.width() == b.width() && a.lines() == b.lines())
    }

    pub fn copy_from(&mut self, src: &Picture) {
        for (dst, src) in self.planes.iter_mut().zip(&src.planes) {
            dst.copy_from(src);
        }
    }

    pub fn fill_plane(&mut self, plane: usize, value: u8) {
        if let Some(buf) = self.planes.get_mut(plane) {
            buf.fill(value);
        }
    }

    /// Rejects formats the drawing layer cannot address pixel by pixel, and
    /// planes whose pitch or buffer cannot hold the visible area.
    pub fn check_supported(&self) -> Result<()> {
        if self.planes.len() != self.chroma.planes() {
            return Err(PuzzleError::UnsupportedChroma(format!(
                "{} with {} planes",
                self.chroma,
                self.planes.len()
            )));
        }
        if let Some(plane) = self.planes.iter().position(|p| !p.is_addressable()) {
            return Err(PuzzleError::InvalidPlane { plane });
        }
        if self.planes.iter().any(|p| p.pixel_pitch != 1) {
            return Err(PuzzleError::UnsupportedChroma(format!(
                "{} with multi-byte pixels",
                self.chroma
            )));
        }
        Ok(())
    }

    // ========================================================================
    // image interop (BT.601 full range)
    // ========================================================================

    pub fn from_rgb(image: &RgbImage, chroma: ChromaFormat) -> Result<Self> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut picture = Self::new(chroma, width, height)?;

        for (x, y, Rgb([r, g, b])) in image.enumerate_pixels() {
            let (yy, _, _) = rgb_to_yuv(*r, *g, *b);
            picture.planes[0].set(x as usize, y as usize, yy);
        }

        for plane in 1..chroma.planes() {
            let (w_div, h_div) = chroma.subsampling(plane);
            let buf = &mut picture.planes[plane];
            for cy in 0..buf.lines() {
                for cx in 0..buf.width() {
                    let px = image.get_pixel((cx * w_div) as u32, (cy * h_div) as u32);
                    let (_, u, v) = rgb_to_yuv(px[0], px[1], px[2]);
                    buf.set(cx, cy, if plane == 1 { u } else { v });
                }
            }
        }
        Ok(picture)
    }

    pub fn from_gray(image: &GrayImage, chroma: ChromaFormat) -> Result<Self> {
        let mut picture = Self::new(chroma, image.width() as usize, image.height() as usize)?;
        for (x, y, luma) in image.enumerate_pixels() {
            picture.planes[0].set(x as usize, y as usize, luma[0]);
        }
        Ok(picture)
    }

    pub fn to_rgb(&self) -> RgbImage {
        let (width, height) = (self.width(), self.height());
        let mut image = RgbImage::new(width as u32, height as u32);
        for y in 0..height {
            for x in 0..width {
                let luma = self.planes[0].get(x, y);
                let (u, v) = if self.chroma.planes() == 3 {
                    let (w_div, h_div) = self.chroma.subsampling(1);
                    let (cx, cy) = (x / w_div, y / h_div);
                    (self.planes[1].get(cx, cy), self.planes[2].get(cx, cy))
                } else {
                    (128, 128)
                };
                image.put_pixel(x as u32, y as u32, Rgb(yuv_to_rgb(luma, u, v)));
            }
        }
        image
    }

    pub fn to_gray(&self) -> GrayImage {
        let (width, height) = (self.width(), self.height());
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            image::Luma([self.planes[0].get(x as usize, y as usize)])
        })
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (clamp_u8(y), clamp_u8(u), clamp_u8(v))
}

pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        clamp_u8(y + 1.402 * v),
        clamp_u8(y - 0.344_136 * u - 0.714_136 * v),
        clamp_u8(y + 1.772 * u),
    ]
}
