use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width as u32, self.height as u32)
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

impl GrayImageView<'_> {
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width as u32, self.height as u32)
    }

    fn crop_columns(&self, x0: usize, w: usize) -> GrayImage {
        if self.width == 0 || w == 0 {
            return GrayImage::new(0, self.height);
        }
        let mut data = Vec::with_capacity(w * self.height);
        for row in self.data.chunks_exact(self.width) {
            data.extend_from_slice(&row[x0..x0 + w]);
        }
        GrayImage {
            width: w,
            height: self.height,
            data,
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

/// Split a side-by-side stereo frame into its left and right halves.
///
/// The left half gets `width / 2` columns; an odd trailing column is dropped
/// so both halves share one size.
pub fn split_side_by_side(src: &GrayImageView<'_>) -> (GrayImage, GrayImage) {
    let half = src.width / 2;
    (src.crop_columns(0, half), src.crop_columns(half, half))
}

/// Place two equally tall images next to each other.
pub fn compose_side_by_side(
    left: &GrayImageView<'_>,
    right: &GrayImageView<'_>,
) -> Option<GrayImage> {
    if left.height != right.height {
        return None;
    }
    let width = left.width + right.width;
    let mut data = Vec::with_capacity(width * left.height);
    for (l, r) in left
        .data
        .chunks_exact(left.width.max(1))
        .zip(right.data.chunks_exact(right.width.max(1)))
    {
        data.extend_from_slice(l);
        data.extend_from_slice(r);
    }
    Some(GrayImage {
        width,
        height: left.height,
        data,
    })
}
