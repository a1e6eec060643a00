use crate::compensate::{compensate, reconstruct};
use crate::error::{CodecError, Result};
use crate::frame::Frame;
use crate::packet::{FrameType, Packet};

/// Rebuilds frames from packets in order. Each decoded frame becomes the
/// reference for the next inter packet.
#[derive(Debug)]
pub struct Decoder {
    width: u32,
    height: u32,
    frames_decoded: u64,
    reference: Option<Frame>,
}

impl Decoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames_decoded: 0,
            reference: None,
        }
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn decode_packet(&mut self, packet: &Packet) -> Result<Frame> {
        let residual = &packet.residual;
        if residual.width() != self.width || residual.height() != self.height {
            return Err(CodecError::DimensionMismatch {
                expected_w: self.width,
                expected_h: self.height,
                got_w: residual.width(),
                got_h: residual.height(),
            });
        }

        let frame = match packet.frame_type {
            FrameType::Key => residual.clone(),
            FrameType::Inter => {
                let reference = self.reference.as_ref().ok_or_else(|| {
                    CodecError::corrupt(format!(
                        "inter frame {} has no reference",
                        packet.frame_number
                    ))
                })?;
                match &packet.motion {
                    Some(field) => reconstruct(&compensate(reference, field)?, residual)?,
                    None => reconstruct(reference, residual)?,
                }
            }
        };

        self.reference = Some(frame.clone());
        self.frames_decoded += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{MotionField, MotionVector};

    fn packet(frame_type: FrameType, residual: Frame, motion: Option<MotionField>) -> Packet {
        Packet {
            frame_number: 0,
            frame_type,
            residual,
            motion,
        }
    }

    #[test]
    fn key_frame_is_its_residual() {
        let frame = Frame::from_fn(16, 16, |x, y| (x ^ y) as u8).unwrap();
        let mut dec = Decoder::new(16, 16);
        let out = dec
            .decode_packet(&packet(FrameType::Key, frame.clone(), None))
            .unwrap();
        assert_eq!(out, frame);
        assert_eq!(dec.frames_decoded(), 1);
    }

    #[test]
    fn inter_without_reference_is_corrupt() {
        let mut dec = Decoder::new(16, 16);
        let residual = Frame::zeroed(16, 16).unwrap();
        assert!(matches!(
            dec.decode_packet(&packet(FrameType::Inter, residual, None)),
            Err(CodecError::CorruptStream { .. })
        ));
    }

    #[test]
    fn difference_packet_adds_to_previous_frame() {
        let mut dec = Decoder::new(4, 4);
        dec.decode_packet(&packet(FrameType::Key, Frame::solid(4, 4, 250).unwrap(), None))
            .unwrap();
        let out = dec
            .decode_packet(&packet(FrameType::Inter, Frame::solid(4, 4, 10).unwrap(), None))
            .unwrap();
        assert!(out.data().iter().all(|&v| v == 4));
    }

    #[test]
    fn motion_packet_uses_compensated_prediction() {
        let key = Frame::from_fn(32, 32, |x, y| (x + 32 * y) as u8).unwrap();
        let field = MotionField::new(2, 2, 16, vec![MotionVector::new(0, 16); 4]).unwrap();
        let mut dec = Decoder::new(32, 32);
        dec.decode_packet(&packet(FrameType::Key, key.clone(), None))
            .unwrap();
        let out = dec
            .decode_packet(&packet(
                FrameType::Inter,
                Frame::zeroed(32, 32).unwrap(),
                Some(field),
            ))
            .unwrap();
        assert_eq!(out.get(0, 5), key.get(16, 5));
        assert_eq!(out.get(20, 5), Some(0));
    }

    #[test]
    fn wrong_size_is_rejected() {
        let mut dec = Decoder::new(16, 16);
        assert!(matches!(
            dec.decode_packet(&packet(FrameType::Key, Frame::zeroed(8, 16).unwrap(), None)),
            Err(CodecError::DimensionMismatch { got_w: 8, .. })
        ));
    }
}
