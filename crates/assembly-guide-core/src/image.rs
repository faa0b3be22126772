/// Borrowed RGB8 frame, row-major, 3 bytes per pixel.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = w*h*3
}

/// Owned RGB8 frame, row-major, 3 bytes per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap a raw buffer; `None` if its length does not match the dimensions.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height * 3).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

impl RgbImageView<'_> {
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width * self.height * 3
    }
}

/// Rectified frame in canonical space.
///
/// Pixels whose source fell outside the capture frame carry no data; they are
/// stored as black with `valid == false` and must be skipped by consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
    pub valid: Vec<bool>,
}

impl CanonicalImage {
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
            valid: vec![false; width * height],
        }
    }

    /// Canonical image with every pixel valid, mostly for synthetic inputs.
    pub fn from_rgb(img: RgbImage) -> Self {
        let valid = vec![true; img.width * img.height];
        Self {
            width: img.width,
            height: img.height,
            data: img.data,
            valid,
        }
    }

    /// Pixel at `(x, y)`; `None` outside the image or where there is no data.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<[u8; 3]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let p = y as usize * self.width + x as usize;
        if !self.valid[p] {
            return None;
        }
        let i = p * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Mean of the three channels, `None` where there is no data.
    #[inline]
    pub fn brightness(&self, x: i64, y: i64) -> Option<f32> {
        self.get(x, y).map(mean_rgb)
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

#[inline]
pub fn mean_rgb(rgb: [u8; 3]) -> f32 {
    (rgb[0] as f32 + rgb[1] as f32 + rgb[2] as f32) / 3.0
}

/// Precomputed bilinear tap into an RGB frame.
///
/// `offset` is the byte offset of the top-left neighbour; the tap is only
/// built when all four neighbours are inside the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilinearTap {
    pub offset: usize,
    pub fx: f32,
    pub fy: f32,
}

impl BilinearTap {
    /// Build a tap for source position `(sx, sy)`; `None` outside `[0, w-1) x [0, h-1)`.
    #[inline]
    pub fn new(sx: f64, sy: f64, width: usize, height: usize) -> Option<Self> {
        if !sx.is_finite() || !sy.is_finite() || width < 2 || height < 2 {
            return None;
        }
        if sx < 0.0 || sy < 0.0 || sx >= (width - 1) as f64 || sy >= (height - 1) as f64 {
            return None;
        }
        let x0 = sx.floor() as usize;
        let y0 = sy.floor() as usize;
        Some(Self {
            offset: (y0 * width + x0) * 3,
            fx: (sx - x0 as f64) as f32,
            fy: (sy - y0 as f64) as f32,
        })
    }

    /// Interpolate channel `c` (0..3) from a frame with row stride `stride` bytes.
    #[inline]
    pub fn sample(&self, data: &[u8], stride: usize, c: usize) -> f32 {
        let i00 = self.offset + c;
        let p00 = data[i00] as f32;
        let p10 = data[i00 + 3] as f32;
        let p01 = data[i00 + stride] as f32;
        let p11 = data[i00 + stride + 3] as f32;

        let a = p00 + self.fx * (p10 - p00);
        let b = p01 + self.fx * (p11 - p01);
        a + self.fy * (b - a)
    }
}
