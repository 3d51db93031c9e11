//! MLOW round-trip tool
//!
//! Encodes a raw mono s16le PCM file frame by frame, decodes every packet
//! again and writes the decoded PCM. Prints per-frame quality and packet
//! size so bitrate and bandwidth settings can be compared by ear and by
//! number.

use mlow_core::utils::{into_frames, samples_from_le_bytes, samples_to_le_bytes};
use mlow_core::{CodecConfig, MlowDecoder, MlowEncoder, ModelPolicy};
use std::path::Path;

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, default: T) -> Result<T, String> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("argument {} ('{}') is not a valid number", index, raw)),
        None => Ok(default),
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let input = Path::new(&args[1]);
    let output = Path::new(&args[2]);
    let bitrate_sel: u8 = parse_arg(args, 3, 3)?;
    let bandwidth_sel: u8 = parse_arg(args, 4, 1)?;
    let frame_size: usize = parse_arg(args, 5, 480)?;
    let adaptive = args.get(6).map_or(false, |p| p == "adaptive");

    let config = CodecConfig::new(bitrate_sel, bandwidth_sel)
        .with_frame_size(frame_size)
        .with_model_policy(if adaptive {
            ModelPolicy::Adaptive
        } else {
            ModelPolicy::Static
        });
    config.validate()?;

    let samples = samples_from_le_bytes(&std::fs::read(input)?)?;
    let mut encoder = MlowEncoder::new(config.clone())?;
    let mut decoder = MlowDecoder::new(config.clone())?;

    println!("MLOW Round Trip");
    println!("===============");
    println!("Input: {} ({} samples)", input.display(), samples.len());
    println!(
        "Bitrate: {} bps, bandwidth: {:?}, frame: {} samples, models: {:?}",
        config.bitrate()?.target_bitrate,
        config.bandwidth()?,
        config.frame_size,
        config.model_policy
    );
    println!();

    let mut decoded = Vec::with_capacity(samples.len());
    let mut total_bytes = 0usize;
    let mut quality_sum = 0u64;
    let frames = into_frames(&samples, frame_size);
    for (index, frame) in frames.iter().enumerate() {
        let encoded = encoder.encode_frame(frame)?;
        let bytes = encoded.packet.to_bytes()?;
        total_bytes += bytes.len();
        quality_sum += u64::from(encoded.quality);

        let frame_out = decoder.decode_packet(&bytes)?;
        println!(
            "Frame {:5}: {:4} bytes, quality {:3}{}",
            index,
            bytes.len(),
            encoded.quality,
            if encoded.stability.clamped > 0 {
                format!(" ({} clamped)", encoded.stability.clamped)
            } else {
                String::new()
            }
        );
        decoded.extend(frame_out.samples);
    }

    std::fs::write(output, samples_to_le_bytes(&decoded))?;

    if !frames.is_empty() {
        let seconds = (frames.len() * frame_size) as f64 / f64::from(config.sample_rate.hz());
        println!();
        println!("Frames: {}", frames.len());
        println!("Average quality: {}", quality_sum / frames.len() as u64);
        println!("Effective bitrate: {:.0} bps", total_bytes as f64 * 8.0 / seconds);
    }
    println!("Output: {}", output.display());
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <input.pcm> <output.pcm> [bitrate_sel] [bandwidth_sel] [frame_size] [static|adaptive]",
            args[0]
        );
        eprintln!("Input and output are raw mono s16le PCM at 48 kHz");
        std::process::exit(1);
    }

    let _ = mlow_core::init();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
