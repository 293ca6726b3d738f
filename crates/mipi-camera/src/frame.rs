//! RGB565 frame view

use image::RgbImage;

/// Borrowed view of a captured frame (little-endian RGB565)
#[derive(Debug, Clone, Copy)]
pub struct Rgb565Frame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> Rgb565Frame<'a> {
    /// `None` unless `data` holds exactly `width * height` pixels
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Option<Self> {
        if data.len() != width as usize * height as usize * 2 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Raw 16-bit pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 2;
        Some(u16::from_le_bytes([self.data[idx], self.data[idx + 1]]))
    }

    /// Pixel at (x, y) expanded to 8 bits per channel
    pub fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.pixel(x, y).map(rgb565_to_rgb888)
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.data.chunks_exact(2) {
            rgb.extend_from_slice(&rgb565_to_rgb888(u16::from_le_bytes([px[0], px[1]])));
        }
        // Length is width * height * 3 by construction
        RgbImage::from_raw(self.width, self.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Expand 5/6/5 bits to 8, replicating the high bits into the low ones
pub fn rgb565_to_rgb888(px: u16) -> [u8; 3] {
    let r = ((px >> 11) & 0x1f) as u8;
    let g = ((px >> 5) & 0x3f) as u8;
    let b = (px & 0x1f) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}
