#![forbid(unsafe_code)]

pub mod bitstream;
pub mod bundle;
pub mod compensate;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fps;
pub mod frame;
pub mod huffman;
pub mod motion;
pub mod packet;
pub mod pyramid;
pub mod sad;
pub mod stats;
pub mod y4m;

pub use bitstream::BitString;
pub use bundle::{BundleStats, EncodedVideo, VideoMetadata};
pub use config::{EncodeConfig, PredictionMode, SearchConfig};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use fps::Fps;
pub use frame::{Block, Frame};
pub use huffman::{Code, Codebook, HuffmanTree};
pub use motion::{MatchGrid, MatchResult, MotionEstimator, MotionField, MotionVector};
pub use packet::{FrameType, Packet};

/// Encodes a grayscale sequence into a self-contained bundle.
pub fn encode(frames: &[Frame], config: &EncodeConfig) -> Result<EncodedVideo> {
    let packets = encoder::encode_sequence(frames, config)?;
    EncodedVideo::from_packets(&packets, config)
}

/// Decodes every frame of a bundle, in order.
pub fn decode(video: &EncodedVideo) -> Result<Vec<Frame>> {
    let packets = video.to_packets()?;
    let mut decoder = Decoder::new(video.metadata.width, video.metadata.height);
    let frames = packets
        .iter()
        .map(|p| decoder.decode_packet(p))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(
        frames = frames.len(),
        width = video.metadata.width,
        height = video.metadata.height,
        "decoded sequence"
    );
    Ok(frames)
}

/// The per-frame residuals carried by a bundle. Frame 0 is the key frame
/// itself.
pub fn residuals(video: &EncodedVideo) -> Result<Vec<Frame>> {
    Ok(video
        .to_packets()?
        .into_iter()
        .map(|p| p.residual)
        .collect())
}
