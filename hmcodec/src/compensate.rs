use crate::error::{CodecError, Result};
use crate::frame::Frame;
use crate::motion::MotionField;

/// Builds the motion-compensated prediction of a frame from `reference`.
///
/// Each macroblock copies the reference region at its origin plus its
/// vector. Parts of that region outside the reference stay zero in the
/// prediction. `reference` is only read; the prediction is a new frame.
pub fn compensate(reference: &Frame, field: &MotionField) -> Result<Frame> {
    let width = reference.width();
    let height = reference.height();
    let size = field.block_size();
    if field.cols() * size != width || field.rows() * size != height {
        return Err(CodecError::InvalidDimensions {
            width,
            height,
            reason: "motion field does not tile the reference frame",
        });
    }

    let w = width as i64;
    let h = height as i64;
    let bs = size as i64;
    let mut out = vec![0u8; width as usize * height as usize];

    for row in 0..field.rows() {
        for col in 0..field.cols() {
            let v = field.get(col, row);
            let ox = (col * size) as i64;
            let oy = (row * size) as i64;
            let sx0 = ox + v.dx as i64;

            let c0 = (-sx0).clamp(0, bs);
            let c1 = (w - sx0).clamp(0, bs);
            if c0 >= c1 {
                continue;
            }

            for r in 0..bs {
                let sy = oy + r + v.dy as i64;
                if sy < 0 || sy >= h {
                    continue;
                }
                let src = &reference.row(sy as u32)[(sx0 + c0) as usize..(sx0 + c1) as usize];
                let dst = ((oy + r) * w + ox + c0) as usize;
                out[dst..dst + src.len()].copy_from_slice(src);
            }
        }
    }

    Frame::new(width, height, out)
}

/// `original - predicted` per sample, modulo 256.
pub fn residual(original: &Frame, predicted: &Frame) -> Result<Frame> {
    zip_samples(original, predicted, u8::wrapping_sub)
}

/// `predicted + residual` per sample, modulo 256. Exactly undoes
/// [`residual`].
pub fn reconstruct(predicted: &Frame, residual: &Frame) -> Result<Frame> {
    zip_samples(predicted, residual, u8::wrapping_add)
}

fn zip_samples(a: &Frame, b: &Frame, op: fn(u8, u8) -> u8) -> Result<Frame> {
    if !a.same_size(b) {
        return Err(CodecError::DimensionMismatch {
            expected_w: a.width(),
            expected_h: a.height(),
            got_w: b.width(),
            got_h: b.height(),
        });
    }
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| op(x, y))
        .collect();
    Frame::new(a.width(), a.height(), data)
}
