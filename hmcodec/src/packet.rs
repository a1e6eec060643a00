use crate::frame::Frame;
use crate::motion::MotionField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Key,
    Inter,
}

/// One coded frame before entropy coding.
///
/// Key frames carry the frame itself as residual. Inter frames carry the
/// residual against their prediction and, in motion-compensated mode, the
/// vectors that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub frame_number: u64,
    pub frame_type: FrameType,
    pub residual: Frame,
    pub motion: Option<MotionField>,
}
