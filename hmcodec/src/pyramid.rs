use tracing::trace;

use crate::error::{CodecError, Result};
use crate::frame::Frame;

pub const PYRAMID_LEVELS: usize = 3;

/// Three resolutions of one frame: full, half and quarter size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pyramid {
    levels: [Frame; PYRAMID_LEVELS],
}

impl Pyramid {
    pub fn level(&self, k: usize) -> &Frame {
        &self.levels[k]
    }

    pub fn levels(&self) -> &[Frame; PYRAMID_LEVELS] {
        &self.levels
    }
}

pub fn build_pyramid(frame: &Frame) -> Result<Pyramid> {
    if !frame.width().is_multiple_of(4) || !frame.height().is_multiple_of(4) {
        return Err(CodecError::InvalidDimensions {
            width: frame.width(),
            height: frame.height(),
            reason: "pyramid levels need width and height divisible by 4",
        });
    }

    let half = downscale_half(frame)?;
    let quarter = downscale_half(&half)?;
    trace!(
        base_w = frame.width(),
        base_h = frame.height(),
        quarter_w = quarter.width(),
        quarter_h = quarter.height(),
        "built pyramid"
    );

    Ok(Pyramid {
        levels: [frame.clone(), half, quarter],
    })
}

/// Halves both dimensions (rounding down) with linear resampling.
///
/// At exactly half scale the sample centres of the output fall midway
/// between two source samples on each axis, so every output value is the
/// rounded mean of its 2x2 source footprint.
pub fn downscale_half(frame: &Frame) -> Result<Frame> {
    let out_w = frame.width() / 2;
    let out_h = frame.height() / 2;
    if out_w == 0 || out_h == 0 {
        return Err(CodecError::InvalidDimensions {
            width: frame.width(),
            height: frame.height(),
            reason: "frame too small to downscale",
        });
    }

    let mut data = Vec::with_capacity(out_w as usize * out_h as usize);
    for y in 0..out_h {
        let top = frame.row(2 * y);
        let bottom = frame.row(2 * y + 1);
        for x in 0..out_w as usize {
            let sum = top[2 * x] as u32
                + top[2 * x + 1] as u32
                + bottom[2 * x] as u32
                + bottom[2 * x + 1] as u32;
            data.push(((sum + 2) >> 2) as u8);
        }
    }

    Frame::new(out_w, out_h, data)
}
