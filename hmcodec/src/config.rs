use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::fps::Fps;
use crate::pyramid::PYRAMID_LEVELS;

pub const DEFAULT_BLOCK_SIZES: [u32; PYRAMID_LEVELS] = [64, 32, 16];
pub const DEFAULT_SEARCH_RADIUS: u32 = 8;

/// Macroblock size per pyramid level (index 0 is full resolution) and the
/// radius of the exhaustive search run on the coarsest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub block_sizes: [u32; PYRAMID_LEVELS],
    pub search_radius: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            block_sizes: DEFAULT_BLOCK_SIZES,
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

impl SearchConfig {
    pub fn base_block_size(&self) -> u32 {
        self.block_sizes[0]
    }

    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if self.block_sizes.contains(&0) {
            return Err(CodecError::InvalidConfig {
                reason: "macroblock sizes must be non-zero",
            });
        }
        if self.search_radius > i32::MAX as u32 / 2 {
            return Err(CodecError::InvalidConfig {
                reason: "search radius out of range",
            });
        }

        let base = self.base_block_size();
        if width < base || height < base {
            return Err(CodecError::FrameTooSmall {
                width,
                height,
                block_size: base,
            });
        }
        if !width.is_multiple_of(4) || !height.is_multiple_of(4) {
            return Err(CodecError::InvalidDimensions {
                width,
                height,
                reason: "width and height must be divisible by 4",
            });
        }
        for (level, &size) in self.block_sizes.iter().enumerate() {
            let (w, h) = (width >> level, height >> level);
            if !w.is_multiple_of(size) || !h.is_multiple_of(size) {
                return Err(CodecError::InvalidDimensions {
                    width,
                    height,
                    reason: "a pyramid level is not tiled exactly by its macroblock size",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Hierarchical motion search, then residual against the compensated
    /// prediction.
    #[default]
    MotionCompensated,
    /// Residual against the previous frame as-is; no vectors are sent.
    FrameDifference,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeConfig {
    pub search: SearchConfig,
    pub mode: PredictionMode,
    pub fps: Fps,
    pub parallel: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            mode: PredictionMode::default(),
            fps: Fps::default(),
            parallel: true,
        }
    }
}
