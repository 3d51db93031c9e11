//! MLOW packet inspector
//!
//! Parses a file of back-to-back MLOW packets and prints each header with
//! the dequantized band parameters it carries.

use mlow_core::codec::{band_quantizers, checksum, entropy_decode, frame_layout};
use mlow_core::packet::split_stream;
use mlow_core::CodecConfig;
use std::path::Path;

fn inspect(path: &Path, frame_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;
    let packets = split_stream(&data)?;

    println!("MLOW Packet Inspector");
    println!("=====================");
    println!("File: {}", path.display());
    println!("Size: {} bytes, {} packets", data.len(), packets.len());
    println!();

    for packet in &packets {
        let header = packet.header();
        println!(
            "Packet {}: bitrate_sel {}, bandwidth_sel {}, {:?} models, fec {}, {} payload bytes",
            header.sequence,
            header.bitrate_sel,
            header.bandwidth_sel,
            header.policy,
            header.fec,
            packet.payload().len()
        );

        let config = CodecConfig::new(header.bitrate_sel, header.bandwidth_sel)
            .with_frame_size(frame_size)
            .with_model_policy(header.policy);
        if let Err(e) = config.validate() {
            println!("  unusable header: {}", e);
            continue;
        }

        let quantizers = band_quantizers(&config)?;
        let layout = frame_layout(&quantizers);
        let symbols = match entropy_decode(&layout, packet.payload(), header.policy) {
            Ok(symbols) => symbols,
            Err(e) => {
                println!("  payload rejected: {}", e);
                continue;
            }
        };

        let (body, check) = symbols.split_at(symbols.len() - 1);
        let verified = checksum(body) == check[0];
        println!(
            "  quality {}, checksum {:3} ({})",
            body[0],
            check[0],
            if verified { "ok" } else { "MISMATCH" }
        );

        let mut rest = &body[1..];
        for (band, quantizer) in quantizers.iter().enumerate() {
            let count = quantizer.symbol_count().min(rest.len());
            let symbols = quantizer.from_stream(&rest[..count])?;
            rest = &rest[count..];
            let params = quantizer.dequantize(&symbols)?;
            println!(
                "  band {}: order {}, {} subframes",
                band,
                quantizer.order(),
                params.subframes.len()
            );
            println!("    reflection (Q15): {:?}", params.reflection);
            for (i, e) in params.subframes.iter().enumerate() {
                if quantizer.pitch_gain_table().is_some() {
                    println!(
                        "    sf {}: lag {:3}, pitch gain {:5} (Q14), codeword {:3}, codebook gain {:6}",
                        i, e.pitch_lag, e.pitch_gain, e.codebook_index, e.codebook_gain
                    );
                } else {
                    println!(
                        "    sf {}: codeword {:3}, codebook gain {:6}",
                        i, e.codebook_index, e.codebook_gain
                    );
                }
            }
        }
        if let Some(redundancy) = packet.redundancy() {
            println!("  redundancy: {} bytes", redundancy.len());
        }
        println!();
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <packets.bin> [frame_size]", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        std::process::exit(1);
    }
    let frame_size = match args.get(2).map(|s| s.parse::<usize>()) {
        None => 480,
        Some(Ok(size)) => size,
        Some(Err(_)) => {
            eprintln!("Error: frame size '{}' is not a number", args[2]);
            std::process::exit(1);
        }
    };

    if let Err(e) = inspect(path, frame_size) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
