#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hmcodec::y4m::{Y4mVideo, write_y4m_file};
use hmcodec::{
    EncodeConfig, EncodedVideo, Encoder, Frame, FrameType, Packet, PredictionMode, SearchConfig,
};

#[derive(Parser)]
#[command(name = "hmcodec", version, about = "Hierarchical motion-compensated grayscale video coder")]
struct Cli {
    /// Log per-frame details (-vv for search internals)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode the luma plane of a Y4M file into a JSON bundle
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Mode::Mc)]
        mode: Mode,
        /// Full-search radius on the coarsest pyramid level
        #[arg(long, default_value_t = hmcodec::config::DEFAULT_SEARCH_RADIUS)]
        radius: u32,
        /// Macroblock sizes for levels 0, 1 and 2
        #[arg(long, value_parser = parse_block_sizes, default_value = "64,32,16")]
        block_sizes: [u32; 3],
        /// Encode frame by frame on a single thread
        #[arg(long)]
        sequential: bool,
        /// Also write the residual frames as a grayscale Y4M
        #[arg(long)]
        residuals: Option<PathBuf>,
    },
    /// Decode a JSON bundle into a grayscale Y4M file
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print bundle metadata and stream statistics
    Inspect { input: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Motion-compensated prediction
    Mc,
    /// Plain difference against the previous frame
    Diff,
}

impl From<Mode> for PredictionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mc => PredictionMode::MotionCompensated,
            Mode::Diff => PredictionMode::FrameDifference,
        }
    }
}

fn parse_block_sizes(s: &str) -> Result<[u32; 3], String> {
    let values: Vec<&str> = s.split(',').collect();
    if values.len() != 3 {
        return Err("expected 3 comma-separated sizes".to_owned());
    }
    let mut sizes = [0u32; 3];
    for (slot, value) in sizes.iter_mut().zip(values) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid block size: {value}"))?;
    }
    Ok(sizes)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Command::Encode {
            input,
            output,
            mode,
            radius,
            block_sizes,
            sequential,
            residuals,
        } => {
            let config = EncodeConfig {
                search: SearchConfig {
                    block_sizes,
                    search_radius: radius,
                },
                mode: mode.into(),
                parallel: !sequential,
                ..EncodeConfig::default()
            };
            encode(&input, &output, config, residuals.as_deref())
        }
        Command::Decode { input, output } => decode(&input, &output),
        Command::Inspect { input } => inspect(&input),
    }
}

fn encode(input: &Path, output: &Path, config: EncodeConfig, residuals: Option<&Path>) -> Result<()> {
    let source = Y4mVideo::read_file(input)
        .with_context(|| format!("reading {}", input.display()))?;
    if source.frames.is_empty() {
        bail!("{} holds no frames", input.display());
    }
    info!(
        width = source.width,
        height = source.height,
        frames = source.frames.len(),
        fps = %source.fps,
        "read input"
    );

    let config = EncodeConfig {
        fps: source.fps,
        ..config
    };
    let packets = if config.parallel {
        hmcodec::encoder::encode_sequence(&source.frames, &config)?
    } else {
        encode_streaming(&source.frames, config)?
    };
    let video = EncodedVideo::from_packets(&packets, &config)?;

    let json = video.to_json()?;
    std::fs::write(output, &json).with_context(|| format!("writing {}", output.display()))?;
    info!(bytes = json.len(), path = %output.display(), "wrote bundle");

    if let Some(path) = residuals {
        let frames: Vec<Frame> = packets.into_iter().map(|p| p.residual).collect();
        write_y4m_file(path, &frames, config.fps)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote residuals");
    }
    Ok(())
}

fn encode_streaming(frames: &[Frame], config: EncodeConfig) -> Result<Vec<Packet>> {
    let Some(first) = frames.first() else {
        bail!("no input frames");
    };
    let mut encoder = Encoder::new(first.width(), first.height(), config)?;
    let mut packets = Vec::with_capacity(frames.len());
    for frame in frames {
        encoder.send_frame(frame)?;
        while let Some(packet) = encoder.receive_packet() {
            let frame_type = match packet.frame_type {
                FrameType::Key => "KEY",
                FrameType::Inter => "INTER",
            };
            debug!(frame = packet.frame_number, frame_type, "encoded");
            packets.push(packet);
        }
    }
    Ok(packets)
}

fn read_bundle(path: &Path) -> Result<EncodedVideo> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    EncodedVideo::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn decode(input: &Path, output: &Path) -> Result<()> {
    let video = read_bundle(input)?;
    let frames = hmcodec::decode(&video)?;
    write_y4m_file(output, &frames, video.metadata.fps)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(frames = frames.len(), path = %output.display(), "wrote decoded video");
    Ok(())
}

fn inspect(input: &Path) -> Result<()> {
    let video = read_bundle(input)?;
    let stats = video.stats()?;
    let meta = &video.metadata;

    println!("frames:      {}", meta.frame_count);
    println!("dimensions:  {}x{}", meta.width, meta.height);
    println!("fps:         {}", meta.fps);
    match video.mode {
        PredictionMode::MotionCompensated => println!(
            "mode:        motion compensated (blocks {:?}, radius {})",
            video.search.block_sizes, video.search.search_radius
        ),
        PredictionMode::FrameDifference => println!("mode:        frame difference"),
    }
    println!();
    for (name, s) in [("residuals", &stats.residuals), ("vectors", &stats.vectors)] {
        println!(
            "{name:<10} {:>10} symbols  {:>5} distinct  {:>10} bits  {:.3} bits/symbol  entropy {:.3}",
            s.symbols,
            s.distinct,
            s.coded_bits,
            s.bits_per_symbol(),
            s.entropy
        );
    }
    println!();
    println!(
        "raw {} bits, coded {} bits, ratio {:.2}",
        stats.raw_bits,
        stats.coded_bits(),
        stats.compression_ratio()
    );
    Ok(())
}
