use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::error::CodecError;
use crate::fps::{Fps, FpsError};
use crate::frame::Frame;

const SIGNATURE: &str = "YUV4MPEG2";
const FRAME_TAG: &[u8] = b"FRAME";

#[derive(Debug, Error)]
pub enum Y4mError {
    #[error("no header line in Y4M data")]
    MissingHeader,
    #[error("not a YUV4MPEG2 stream")]
    NotY4m,
    #[error("invalid {tag} parameter {value:?}")]
    BadParameter { tag: char, value: String },
    #[error("missing W/H in Y4M header")]
    MissingDimensions,
    #[error("unsupported colorspace {0:?}")]
    UnsupportedColorspace(String),
    #[error("frame {frame} is truncated")]
    Truncated { frame: usize },
    #[error("expected FRAME marker at byte {offset}")]
    MissingFrameMarker { offset: usize },
    #[error("invalid frame rate: {0}")]
    Fps(#[from] FpsError),
    #[error(transparent)]
    Frame(#[from] CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Chroma layout declared by the `C` tag. Only luma is kept; the layout
/// decides how many chroma bytes to skip per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    C420,
    C422,
    C444,
    Mono,
}

impl Colorspace {
    fn parse(value: &str) -> Result<Self, Y4mError> {
        // Only 8-bit layouts; `p10` and similar suffixes are rejected.
        match value {
            "420" | "420jpeg" | "420paldv" | "420mpeg2" => Ok(Colorspace::C420),
            "422" => Ok(Colorspace::C422),
            "444" => Ok(Colorspace::C444),
            "mono" => Ok(Colorspace::Mono),
            _ => Err(Y4mError::UnsupportedColorspace(value.to_owned())),
        }
    }

    fn chroma_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            Colorspace::C420 => 2 * w.div_ceil(2) * h.div_ceil(2),
            Colorspace::C422 => 2 * w.div_ceil(2) * h,
            Colorspace::C444 => 2 * w * h,
            Colorspace::Mono => 0,
        }
    }
}

/// Luma planes of a Y4M stream plus the header fields the codec keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct Y4mVideo {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub colorspace: Colorspace,
    pub frames: Vec<Frame>,
}

impl Y4mVideo {
    pub fn parse(data: &[u8]) -> Result<Self, Y4mError> {
        let header_end = data
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(Y4mError::MissingHeader)?;
        let header_line =
            std::str::from_utf8(&data[..header_end]).map_err(|_| Y4mError::NotY4m)?;

        let mut tokens = header_line.split_whitespace();
        if tokens.next() != Some(SIGNATURE) {
            return Err(Y4mError::NotY4m);
        }

        let mut width = 0u32;
        let mut height = 0u32;
        let mut fps = Fps::default();
        let mut colorspace = Colorspace::C420;

        for token in tokens {
            let mut chars = token.chars();
            let Some(tag) = chars.next() else { continue };
            let val = chars.as_str();
            let bad = || Y4mError::BadParameter {
                tag,
                value: val.to_owned(),
            };
            match tag {
                'W' => width = val.parse().map_err(|_| bad())?,
                'H' => height = val.parse().map_err(|_| bad())?,
                'F' => fps = Fps::parse_ratio(val)?,
                'C' => colorspace = Colorspace::parse(val)?,
                _ => {}
            }
        }

        if width == 0 || height == 0 {
            return Err(Y4mError::MissingDimensions);
        }

        let y_size = width as usize * height as usize;
        let frame_data_size = y_size + colorspace.chroma_size(width, height);

        let mut frames = Vec::new();
        let mut pos = header_end + 1;

        while pos < data.len() {
            if !data[pos..].starts_with(FRAME_TAG) {
                return Err(Y4mError::MissingFrameMarker { offset: pos });
            }
            // FRAME may carry its own parameters up to the newline.
            let marker_end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or(Y4mError::Truncated {
                    frame: frames.len(),
                })?;
            let pixel_start = pos + marker_end + 1;
            if pixel_start + frame_data_size > data.len() {
                return Err(Y4mError::Truncated {
                    frame: frames.len(),
                });
            }

            let luma = data[pixel_start..pixel_start + y_size].to_vec();
            frames.push(Frame::new(width, height, luma)?);

            pos = pixel_start + frame_data_size;
        }

        Ok(Self {
            width,
            height,
            fps,
            colorspace,
            frames,
        })
    }

    pub fn read_file(path: &Path) -> Result<Self, Y4mError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }
}

/// Writes `frames` as a monochrome Y4M stream.
pub fn write_y4m<W: Write>(mut out: W, frames: &[Frame], fps: Fps) -> Result<(), Y4mError> {
    let Some(first) = frames.first() else {
        return Err(CodecError::EmptySequence.into());
    };
    let (width, height) = (first.width(), first.height());
    writeln!(
        out,
        "{SIGNATURE} W{width} H{height} F{}:{} Ip A1:1 Cmono",
        fps.num, fps.den
    )?;
    for frame in frames {
        if frame.width() != width || frame.height() != height {
            return Err(CodecError::DimensionMismatch {
                expected_w: width,
                expected_h: height,
                got_w: frame.width(),
                got_h: frame.height(),
            }
            .into());
        }
        out.write_all(FRAME_TAG)?;
        out.write_all(b"\n")?;
        out.write_all(frame.data())?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_y4m_file(path: &Path, frames: &[Frame], fps: Fps) -> Result<(), Y4mError> {
    let file = std::fs::File::create(path)?;
    write_y4m(std::io::BufWriter::new(file), frames, fps)
}
