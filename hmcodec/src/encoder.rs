use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use crate::compensate::{compensate, residual};
use crate::config::{EncodeConfig, PredictionMode};
use crate::error::{CodecError, Result};
use crate::frame::Frame;
use crate::motion::{MatchGrid, MotionEstimator};
use crate::packet::{FrameType, Packet};
use crate::pyramid::{Pyramid, build_pyramid};

#[derive(Debug)]
struct Reference {
    frame: Frame,
    pyramid: Option<Pyramid>,
}

/// Frame-at-a-time encoder. The first frame becomes a key packet; every
/// later frame is predicted from the one sent before it.
#[derive(Debug)]
pub struct Encoder {
    config: EncodeConfig,
    estimator: MotionEstimator,
    width: u32,
    height: u32,
    frame_index: u64,
    reference: Option<Reference>,
    pending_packet: Option<Packet>,
}

impl Encoder {
    pub fn new(width: u32, height: u32, config: EncodeConfig) -> Result<Self> {
        check_dimensions(width, height, &config)?;
        Ok(Self {
            estimator: MotionEstimator::new(config.search).with_parallel(config.parallel),
            config,
            width,
            height,
            frame_index: 0,
            reference: None,
            pending_packet: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    pub fn frames_sent(&self) -> u64 {
        self.frame_index
    }

    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(CodecError::DimensionMismatch {
                expected_w: self.width,
                expected_h: self.height,
                got_w: frame.width(),
                got_h: frame.height(),
            });
        }

        let pyramid = match self.config.mode {
            PredictionMode::MotionCompensated => Some(build_pyramid(frame)?),
            PredictionMode::FrameDifference => None,
        };

        let packet = match &self.reference {
            None => key_packet(self.frame_index, frame),
            Some(reference) => {
                let grid = match (&reference.pyramid, &pyramid) {
                    (Some(r), Some(t)) => Some(self.estimator.estimate_pyramids(r, t)?),
                    _ => None,
                };
                inter_packet(self.frame_index, &reference.frame, frame, grid.as_ref())?
            }
        };

        // Coding is lossless, so the source frame is the decoder's reference.
        self.reference = Some(Reference {
            frame: frame.clone(),
            pyramid,
        });
        self.pending_packet = Some(packet);
        self.frame_index += 1;

        Ok(())
    }

    pub fn receive_packet(&mut self) -> Option<Packet> {
        self.pending_packet.take()
    }
}

/// Encodes a whole sequence at once. Pyramids are built once per frame and
/// the frame pairs are predicted independently, in parallel when
/// `config.parallel` is set. The result matches feeding the frames through
/// [`Encoder`] one by one.
pub fn encode_sequence(frames: &[Frame], config: &EncodeConfig) -> Result<Vec<Packet>> {
    let Some(first) = frames.first() else {
        return Err(CodecError::EmptySequence);
    };
    let (width, height) = (first.width(), first.height());
    check_dimensions(width, height, config)?;
    for frame in &frames[1..] {
        if !frame.same_size(first) {
            return Err(CodecError::DimensionMismatch {
                expected_w: width,
                expected_h: height,
                got_w: frame.width(),
                got_h: frame.height(),
            });
        }
    }

    let inter_range = 1..frames.len();
    let inter = match config.mode {
        PredictionMode::MotionCompensated => {
            let estimator = MotionEstimator::new(config.search).with_parallel(config.parallel);
            let pyramids: Vec<Pyramid> = if config.parallel {
                frames.par_iter().map(build_pyramid).collect::<Result<_>>()?
            } else {
                frames.iter().map(build_pyramid).collect::<Result<_>>()?
            };
            map_frames(inter_range, config.parallel, |i| {
                let grid = estimator.estimate_pyramids(&pyramids[i - 1], &pyramids[i])?;
                inter_packet(i as u64, &frames[i - 1], &frames[i], Some(&grid))
            })?
        }
        PredictionMode::FrameDifference => map_frames(inter_range, config.parallel, |i| {
            inter_packet(i as u64, &frames[i - 1], &frames[i], None)
        })?,
    };

    let mut packets = Vec::with_capacity(frames.len());
    packets.push(key_packet(0, first));
    packets.extend(inter);
    Ok(packets)
}

fn check_dimensions(width: u32, height: u32, config: &EncodeConfig) -> Result<()> {
    match config.mode {
        PredictionMode::MotionCompensated => config.search.validate(width, height),
        PredictionMode::FrameDifference if width == 0 || height == 0 => {
            Err(CodecError::InvalidDimensions {
                width,
                height,
                reason: "width and height must be non-zero",
            })
        }
        PredictionMode::FrameDifference => Ok(()),
    }
}

fn map_frames<F>(range: Range<usize>, parallel: bool, f: F) -> Result<Vec<Packet>>
where
    F: Fn(usize) -> Result<Packet> + Sync + Send,
{
    if parallel {
        range.into_par_iter().map(f).collect()
    } else {
        range.map(f).collect()
    }
}

fn key_packet(frame_number: u64, frame: &Frame) -> Packet {
    debug!(frame = frame_number, "key frame");
    Packet {
        frame_number,
        frame_type: FrameType::Key,
        residual: frame.clone(),
        motion: None,
    }
}

/// Predicts `target` from `reference`. With a match grid the prediction is
/// motion compensated; without one it is the reference itself.
fn inter_packet(
    frame_number: u64,
    reference: &Frame,
    target: &Frame,
    grid: Option<&MatchGrid>,
) -> Result<Packet> {
    let (diff, motion) = match grid {
        Some(grid) => {
            let field = grid.to_field();
            let predicted = compensate(reference, &field)?;
            (residual(target, &predicted)?, Some(field))
        }
        None => (residual(target, reference)?, None),
    };

    debug!(
        frame = frame_number,
        sad = grid.map(MatchGrid::total_cost),
        moving_blocks = motion
            .as_ref()
            .map(|f| f.vectors().iter().filter(|v| !v.is_zero()).count()),
        nonzero_residuals = diff.data().iter().filter(|&&v| v != 0).count(),
        "inter frame"
    );

    Ok(Packet {
        frame_number,
        frame_type: FrameType::Inter,
        residual: diff,
        motion,
    })
}
