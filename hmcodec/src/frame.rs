use crate::error::{CodecError, Result};

/// An 8-bit luma plane, row-major with the origin at the top-left.
///
/// Frames are never mutated once built; every stage of the pipeline
/// allocates a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions {
                width,
                height,
                reason: "width and height must be non-zero",
            });
        }
        if data.len() != width as usize * height as usize {
            return Err(CodecError::InvalidDimensions {
                width,
                height,
                reason: "sample buffer length does not match width * height",
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn solid(width: u32, height: u32, value: u8) -> Result<Self> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn zeroed(width: u32, height: u32) -> Result<Self> {
        Self::solid(width, height, 0)
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y * self.width + x) as usize])
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Borrows the `width`x`height` rectangle whose top-left corner is `(x, y)`.
    pub fn block(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Block<'_>> {
        let fits_x = x.checked_add(width).is_some_and(|r| r <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|b| b <= self.height);
        if !fits_x || !fits_y {
            return Err(CodecError::InvalidDimensions {
                width,
                height,
                reason: "block extends past the frame edge",
            });
        }
        Ok(Block {
            frame: self,
            x,
            y,
            width,
            height,
        })
    }

    pub fn mean(&self) -> f64 {
        let sum: u64 = self.data.iter().map(|&p| p as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}

/// A rectangular view into a [`Frame`].
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    frame: &'a Frame,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl<'a> Block<'a> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn row(&self, r: u32) -> &'a [u8] {
        let start = ((self.y + r) * self.frame.width + self.x) as usize;
        &self.frame.data[start..start + self.width as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + use<'a> {
        let block = *self;
        (0..block.height).map(move |r| block.row(r))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.rows().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        let err = Frame::new(4, 4, vec![0; 15]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidDimensions { width: 4, height: 4, .. }));
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(Frame::new(0, 4, vec![]).is_err());
        assert!(Frame::new(4, 0, vec![]).is_err());
    }

    #[test]
    fn from_fn_is_row_major() {
        let frame = Frame::from_fn(3, 2, |x, y| (y * 10 + x) as u8).unwrap();
        assert_eq!(frame.data(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(frame.get(2, 1), Some(12));
        assert_eq!(frame.get(3, 0), None);
        assert_eq!(frame.row(1), &[10, 11, 12]);
    }

    #[test]
    fn block_reads_sub_rectangle() {
        let frame = Frame::from_fn(4, 4, |x, y| (y * 4 + x) as u8).unwrap();
        let block = frame.block(1, 2, 2, 2).unwrap();
        assert_eq!(block.origin(), (1, 2));
        assert_eq!(block.row(0), &[9, 10]);
        assert_eq!(block.to_vec(), vec![9, 10, 13, 14]);
    }

    #[test]
    fn block_past_edge_is_rejected() {
        let frame = Frame::solid(8, 8, 1).unwrap();
        assert!(frame.block(4, 4, 4, 4).is_ok());
        assert!(frame.block(5, 4, 4, 4).is_err());
        assert!(frame.block(0, 5, 4, 4).is_err());
        assert!(frame.block(u32::MAX, 0, 2, 2).is_err());
    }

    #[test]
    fn mean_of_solid_frame() {
        let frame = Frame::solid(16, 16, 81).unwrap();
        assert!((frame.mean() - 81.0).abs() < f64::EPSILON);
    }
}
