use crate::error::{CodecError, Result};
use crate::frame::Block;

/// Sum of absolute differences between two equally shaped blocks.
///
/// A 64x64 block peaks at 64 * 64 * 255, so `u32` accumulation is enough for
/// every macroblock size the search uses.
pub fn sad(a: &Block<'_>, b: &Block<'_>) -> Result<u32> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(CodecError::ShapeMismatch {
            left_w: a.width(),
            left_h: a.height(),
            right_w: b.width(),
            right_h: b.height(),
        });
    }
    Ok(a.rows().zip(b.rows()).map(|(ra, rb)| row_sad(ra, rb)).sum())
}

#[inline]
pub(crate) fn row_sad(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&s, &p)| (s as i32 - p as i32).unsigned_abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn identical_blocks_cost_zero() {
        let frame = Frame::from_fn(16, 16, |x, y| (x * 7 + y * 3) as u8).unwrap();
        let a = frame.block(0, 0, 8, 8).unwrap();
        assert_eq!(sad(&a, &a).unwrap(), 0);
    }

    #[test]
    fn sums_absolute_differences() {
        let a = Frame::new(2, 2, vec![10, 20, 30, 40]).unwrap();
        let b = Frame::new(2, 2, vec![15, 10, 30, 0]).unwrap();
        let cost = sad(&a.block(0, 0, 2, 2).unwrap(), &b.block(0, 0, 2, 2).unwrap()).unwrap();
        assert_eq!(cost, 5 + 10 + 0 + 40);
    }

    #[test]
    fn is_symmetric() {
        let a = Frame::from_fn(8, 8, |x, y| (x * 31 + y * 17) as u8).unwrap();
        let b = Frame::from_fn(8, 8, |x, y| (x * 3 + y * 90) as u8).unwrap();
        let ba = a.block(0, 0, 8, 8).unwrap();
        let bb = b.block(0, 0, 8, 8).unwrap();
        assert_eq!(sad(&ba, &bb).unwrap(), sad(&bb, &ba).unwrap());
    }

    #[test]
    fn worst_case_64x64_does_not_overflow() {
        let black = Frame::solid(64, 64, 0).unwrap();
        let white = Frame::solid(64, 64, 255).unwrap();
        let cost = sad(
            &black.block(0, 0, 64, 64).unwrap(),
            &white.block(0, 0, 64, 64).unwrap(),
        )
        .unwrap();
        assert_eq!(cost, 1_044_480);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let frame = Frame::solid(16, 16, 0).unwrap();
        let a = frame.block(0, 0, 8, 8).unwrap();
        let b = frame.block(0, 0, 8, 4).unwrap();
        let err = sad(&a, &b).unwrap_err();
        assert_eq!(
            err,
            CodecError::ShapeMismatch {
                left_w: 8,
                left_h: 8,
                right_w: 8,
                right_h: 4
            }
        );
    }
}
