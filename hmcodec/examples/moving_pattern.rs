//! Encodes a synthetic pan over a test pattern and prints what each
//! prediction mode costs. Pass a path to also write the source as Y4M.

use hmcodec::{EncodeConfig, Fps, Frame, PredictionMode};

fn pattern(width: u32, height: u32, t: u32) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let (x, y) = (x + 4 * t, y + 2 * t);
        let checker = if (x / 16 + y / 16) % 2 == 0 { 40 } else { 200 };
        let ripple = ((x * 7) ^ (y * 13)) % 24;
        (checker + ripple) as u8
    })
    .expect("non-zero dimensions")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frames: Vec<Frame> = (0..8).map(|t| pattern(192, 128, t)).collect();

    if let Some(path) = std::env::args().nth(1) {
        hmcodec::y4m::write_y4m_file(path.as_ref(), &frames, Fps::from_int(30)?)?;
        println!("wrote source to {path}");
    }

    for mode in [
        PredictionMode::MotionCompensated,
        PredictionMode::FrameDifference,
    ] {
        let config = EncodeConfig {
            mode,
            ..EncodeConfig::default()
        };
        let video = hmcodec::encode(&frames, &config)?;
        assert_eq!(hmcodec::decode(&video)?, frames);

        let stats = video.stats()?;
        println!(
            "{mode:?}: {} coded bits, {:.3} bits/sample, ratio {:.2}",
            stats.coded_bits(),
            stats.residuals.bits_per_symbol(),
            stats.compression_ratio()
        );
    }
    Ok(())
}
