use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bitstream::BitString;
use crate::config::{EncodeConfig, PredictionMode, SearchConfig};
use crate::error::{CodecError, Result};
use crate::fps::Fps;
use crate::frame::Frame;
use crate::huffman::{self, Codebook, HuffmanTree};
use crate::motion::{MotionField, MotionVector};
use crate::packet::{FrameType, Packet};
use crate::stats::StreamStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Everything a decoder needs: sequence metadata, the search parameters
/// that fix the vector grid, one codebook per symbol kind and one bit
/// string per coded frame.
///
/// `residual_streams[i]` holds frame `i`. `vector_streams[i]` holds the
/// vectors predicting frame `i + 1` and is empty in frame-difference mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedVideo {
    pub metadata: VideoMetadata,
    pub search: SearchConfig,
    pub mode: PredictionMode,
    pub residual_codebook: Codebook<u8>,
    pub residual_streams: Vec<BitString>,
    pub vector_codebook: Codebook<MotionVector>,
    pub vector_streams: Vec<BitString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BundleStats {
    pub raw_bits: u64,
    pub residuals: StreamStats,
    pub vectors: StreamStats,
}

impl BundleStats {
    pub fn coded_bits(&self) -> u64 {
        self.residuals.coded_bits + self.vectors.coded_bits
    }

    pub fn compression_ratio(&self) -> f64 {
        match self.coded_bits() {
            0 => 0.0,
            coded => self.raw_bits as f64 / coded as f64,
        }
    }
}

type Frequencies = (BTreeMap<u8, u64>, BTreeMap<MotionVector, u64>);

impl EncodedVideo {
    /// Entropy codes a packet sequence produced by the encoder. Residual
    /// samples of all frames share one codebook, as do all motion vectors.
    pub fn from_packets(packets: &[Packet], config: &EncodeConfig) -> Result<Self> {
        let Some(first) = packets.first() else {
            return Err(CodecError::EmptySequence);
        };
        check_packet_layout(packets, config.mode)?;

        let (residual_freqs, vector_freqs) = symbol_frequencies(packets);
        let residual_codebook = HuffmanTree::from_frequencies(&residual_freqs).codebook();
        let vector_codebook = HuffmanTree::from_frequencies(&vector_freqs).codebook();

        let encode_packet = |p: &Packet| -> Result<(BitString, Option<BitString>)> {
            let residual = huffman::encode(p.residual.data(), &residual_codebook)?;
            let vectors = p
                .motion
                .as_ref()
                .map(|field| huffman::encode(field.vectors(), &vector_codebook))
                .transpose()?;
            Ok((residual, vectors))
        };
        let coded: Vec<(BitString, Option<BitString>)> = if config.parallel {
            packets.par_iter().map(encode_packet).collect::<Result<_>>()?
        } else {
            packets.iter().map(encode_packet).collect::<Result<_>>()?
        };

        let mut residual_streams = Vec::with_capacity(coded.len());
        let mut vector_streams = Vec::new();
        for (residual, vectors) in coded {
            residual_streams.push(residual);
            vector_streams.extend(vectors);
        }

        let frame_count = u32::try_from(packets.len())
            .map_err(|_| CodecError::corrupt("too many frames for one bundle"))?;
        let video = Self {
            metadata: VideoMetadata {
                frame_count,
                width: first.residual.width(),
                height: first.residual.height(),
                fps: config.fps,
            },
            search: config.search,
            mode: config.mode,
            residual_codebook,
            residual_streams,
            vector_codebook,
            vector_streams,
        };

        let stats = video.stats_from(&(residual_freqs, vector_freqs));
        info!(
            frames = frame_count,
            residual_symbols = stats.residuals.distinct,
            residual_bits = stats.residuals.coded_bits,
            residual_entropy = stats.residuals.entropy,
            vector_symbols = stats.vectors.distinct,
            vector_bits = stats.vectors.coded_bits,
            vector_entropy = stats.vectors.entropy,
            ratio = stats.compression_ratio(),
            "entropy coded sequence"
        );

        Ok(video)
    }

    /// Checks that the stream counts, dimensions and search parameters are
    /// consistent with each other.
    pub fn validate(&self) -> Result<()> {
        let meta = &self.metadata;
        if meta.frame_count == 0 {
            return Err(CodecError::EmptySequence);
        }
        if meta.width == 0 || meta.height == 0 {
            return Err(CodecError::InvalidDimensions {
                width: meta.width,
                height: meta.height,
                reason: "width and height must be non-zero",
            });
        }
        if self.residual_streams.len() != meta.frame_count as usize {
            return Err(CodecError::corrupt(format!(
                "{} residual streams for {} frames",
                self.residual_streams.len(),
                meta.frame_count
            )));
        }
        let expected_vectors = match self.mode {
            PredictionMode::MotionCompensated => {
                self.search.validate(meta.width, meta.height)?;
                meta.frame_count as usize - 1
            }
            PredictionMode::FrameDifference => 0,
        };
        if self.vector_streams.len() != expected_vectors {
            return Err(CodecError::corrupt(format!(
                "{} vector streams, expected {}",
                self.vector_streams.len(),
                expected_vectors
            )));
        }
        Ok(())
    }

    /// Entropy decodes every stream back into packets.
    pub fn to_packets(&self) -> Result<Vec<Packet>> {
        self.validate()?;
        let meta = &self.metadata;
        let samples = (meta.width as usize)
            .checked_mul(meta.height as usize)
            .ok_or_else(|| CodecError::corrupt("frame size overflows"))?;

        let mut packets = Vec::with_capacity(self.residual_streams.len());
        for (i, stream) in self.residual_streams.iter().enumerate() {
            let data = huffman::decode(stream, &self.residual_codebook, samples)?;
            let residual = Frame::new(meta.width, meta.height, data)?;
            let (frame_type, motion) = match (i, self.mode) {
                (0, _) => (FrameType::Key, None),
                (_, PredictionMode::FrameDifference) => (FrameType::Inter, None),
                (_, PredictionMode::MotionCompensated) => {
                    let block_size = self.search.base_block_size();
                    let (cols, rows) = (meta.width / block_size, meta.height / block_size);
                    let vectors = huffman::decode(
                        &self.vector_streams[i - 1],
                        &self.vector_codebook,
                        cols as usize * rows as usize,
                    )?;
                    let field = MotionField::new(cols, rows, block_size, vectors)?;
                    (FrameType::Inter, Some(field))
                }
            };
            packets.push(Packet {
                frame_number: i as u64,
                frame_type,
                residual,
                motion,
            });
        }
        Ok(packets)
    }

    /// Size and entropy figures. Needs a full entropy decode to count
    /// symbols.
    pub fn stats(&self) -> Result<BundleStats> {
        let packets = self.to_packets()?;
        Ok(self.stats_from(&symbol_frequencies(&packets)))
    }

    fn stats_from(&self, (residual_freqs, vector_freqs): &Frequencies) -> BundleStats {
        let stream_bits =
            |streams: &[BitString]| -> u64 { streams.iter().map(|s| s.len() as u64).sum() };
        let meta = &self.metadata;
        BundleStats {
            raw_bits: meta.frame_count as u64 * meta.width as u64 * meta.height as u64 * 8,
            residuals: StreamStats::new(residual_freqs, stream_bits(&self.residual_streams)),
            vectors: StreamStats::new(vector_freqs, stream_bits(&self.vector_streams)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CodecError::corrupt(format!("cannot serialize bundle: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let video: Self = serde_json::from_str(json)
            .map_err(|e| CodecError::corrupt(format!("invalid bundle: {e}")))?;
        video.validate()?;
        Ok(video)
    }
}

fn check_packet_layout(packets: &[Packet], mode: PredictionMode) -> Result<()> {
    for (i, packet) in packets.iter().enumerate() {
        let expected = if i == 0 {
            FrameType::Key
        } else {
            FrameType::Inter
        };
        if packet.frame_type != expected {
            return Err(CodecError::corrupt(format!(
                "packet {i} is {:?}, expected {expected:?}",
                packet.frame_type
            )));
        }
        let wants_motion = i > 0 && mode == PredictionMode::MotionCompensated;
        if packet.motion.is_some() != wants_motion {
            return Err(CodecError::corrupt(format!(
                "packet {i} motion field does not match the prediction mode"
            )));
        }
    }
    Ok(())
}

fn symbol_frequencies(packets: &[Packet]) -> Frequencies {
    let residuals = huffman::frequencies(packets.iter().flat_map(|p| p.residual.data()));
    let vectors = huffman::frequencies(
        packets
            .iter()
            .filter_map(|p| p.motion.as_ref())
            .flat_map(MotionField::vectors),
    );
    (residuals, vectors)
}
