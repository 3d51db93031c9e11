//! End-to-end scenarios through the pipeline controller and the bulk codec

use mlow_core::filterbank::QMF_DELAY;
use mlow_core::pipeline::{ControlConfig, PipelineController, PipelineState, Progress};
use mlow_core::{
    AudioCodec, CodecConfig, CodecMode, ErrorKind, MlowCodec, MlowDecoder, MlowEncoder, PushOutcome,
};

fn tone(len: usize, amplitude: f64) -> Vec<i16> {
    (0..len)
        .map(|i| (amplitude * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 48000.0).sin()) as i16)
        .collect()
}

/// Gliding 140 Hz harmonic voice with a 4 Hz envelope over low-level noise
fn voiced(len: usize) -> Vec<i16> {
    let mut seed: u32 = 12345;
    (0..len)
        .map(|n| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7FFF_FFFF;
            let noise = f64::from(((seed >> 8) & 0x3FFF) as i32 - 8192);
            let t = n as f64 / 48000.0;
            let tau = 2.0 * std::f64::consts::PI;
            let phase = tau * 140.0 * t - (20.0 / 3.0) * (tau * 3.0 * t).cos();
            let harmonics: f64 = (1..=12)
                .map(|k| (6000.0 / f64::from(k)) * (f64::from(k) * phase).sin())
                .sum();
            let envelope = 0.6 + 0.4 * (tau * 4.0 * t).sin();
            (envelope * harmonics + 0.15 * noise).clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

fn push_frame(pipe: &mut PipelineController, samples: &[i16]) {
    for &s in samples {
        assert_eq!(pipe.push_sample(s), PushOutcome::Accepted);
    }
}

#[test]
fn test_silent_frame_at_16kbps_wideband() {
    let config = CodecConfig::new(3, 1).with_mode(CodecMode::Encode);
    let mut pipe = PipelineController::new(config).unwrap();
    push_frame(&mut pipe, &[0; 480]);
    pipe.run_until_stalled();

    let status = pipe.status();
    assert!(!status.error);
    assert_eq!(status.quality_metric, 75);
    assert!(pipe.packet_valid());

    let packet = pipe.take_packet().unwrap();
    assert!(packet.len() > mlow_core::packet::MIN_PACKET_SIZE);
}

#[test]
fn test_tone_round_trip() {
    let frame_size = 480;
    let input = tone(frame_size * 4, 16383.0);
    let config = CodecConfig::new(3, 1);
    let mut codec = MlowCodec::new(config.clone()).unwrap();
    let mut second = MlowDecoder::new(config).unwrap();

    let mut output = Vec::new();
    let mut qualities = Vec::new();
    for frame in input.chunks(frame_size) {
        let encoded = codec.encoder().encode_frame(frame).unwrap();
        let bytes = encoded.packet.to_bytes().unwrap();
        let decoded = codec.decoder().decode_packet(&bytes).unwrap();
        assert_eq!(decoded.quality, encoded.quality);
        assert_eq!(second.decode_packet(&bytes).unwrap().samples, decoded.samples);
        qualities.push(encoded.quality);
        output.extend(decoded.samples);
    }

    assert!(qualities.iter().all(|q| (40..=80).contains(q)), "{:?}", qualities);
    assert!(qualities[3] >= 60, "{:?}", qualities);

    // Once the coder has history, the decoded tone tracks the input
    let start = 2 * frame_size;
    let end = input.len() - QMF_DELAY;
    let mut signal = 0f64;
    let mut noise = 0f64;
    for i in start..end {
        let x = f64::from(input[i]);
        let y = f64::from(output[i + QMF_DELAY]);
        signal += x * x;
        noise += (x - y) * (x - y);
    }
    let snr = 10.0 * (signal / noise.max(1.0)).log10();
    assert!(snr > 10.0, "snr {:.1} dB", snr);
}

#[test]
fn test_undefined_bitrate_selector() {
    let mut pipe = PipelineController::new(CodecConfig::new(3, 1).with_frame_size(16)).unwrap();
    pipe.configure(ControlConfig::new(true, 0xF, 1));

    let mut busy_seen = false;
    for _ in 0..8 {
        pipe.tick();
        busy_seen |= pipe.status().busy;
    }
    // Samples offered after the rejected configuration go nowhere
    for i in 0..16 {
        pipe.push_sample(i);
        pipe.tick();
        busy_seen |= pipe.status().busy;
    }

    let status = pipe.status();
    assert!(status.error);
    assert_eq!(status.error_kind, Some(ErrorKind::InvalidConfiguration));
    assert_eq!(status.state, PipelineState::Error);
    assert!(!busy_seen);
    assert!(!pipe.packet_valid());
}

#[test]
fn test_backpressure_loses_nothing() {
    let frame_size = 16;
    let config = CodecConfig::new(3, 1).with_frame_size(frame_size);
    let input = tone(frame_size * 3, 12000.0);

    let mut reference = MlowEncoder::new(config.clone()).unwrap();
    let expected: Vec<Vec<u8>> = input
        .chunks(frame_size)
        .map(|f| reference.encode_frame(f).unwrap().packet.to_bytes().unwrap().to_vec())
        .collect();

    let mut pipe = PipelineController::new(config).unwrap();
    let mut fed = 0;
    let mut packets = Vec::new();

    // Consumer stays away until the producer is blocked
    loop {
        if pipe.audio_ready() && fed < input.len() {
            assert_eq!(pipe.push_sample(input[fed]), PushOutcome::Accepted);
            fed += 1;
        } else if pipe.tick() == Progress::Stalled {
            break;
        }
    }
    assert_eq!(fed, 2 * frame_size);
    assert!(!pipe.audio_ready());
    assert_eq!(pipe.state(), PipelineState::Emitting);
    assert!(!pipe.status().busy);
    assert!(!pipe.push_sample(input[fed]).is_accepted());

    // Consumer comes back: everything drains in order
    while packets.len() < expected.len() {
        if let Some(packet) = pipe.take_packet() {
            packets.push(packet);
        }
        if pipe.audio_ready() && fed < input.len() {
            pipe.push_sample(input[fed]);
            fed += 1;
        }
        pipe.tick();
    }
    assert_eq!(packets, expected);
}

#[test]
fn test_corrupted_packet_then_valid_packet() {
    let frame_size = 16;
    let config = CodecConfig::new(3, 1).with_frame_size(frame_size);
    let mut encoder = MlowEncoder::new(config.clone()).unwrap();
    let mut reference = MlowDecoder::new(config.clone()).unwrap();
    let input = tone(frame_size * 2, 12000.0);

    let first = encoder.encode_frame(&input[..frame_size]).unwrap().packet.to_bytes().unwrap();
    let second = encoder.encode_frame(&input[frame_size..]).unwrap().packet.to_bytes().unwrap();
    reference.decode_packet(&first).unwrap();
    let expected = reference.decode_packet(&second).unwrap().samples;

    let mut pipe = PipelineController::new(config.with_mode(CodecMode::Decode)).unwrap();
    pipe.push_packet(&first);
    pipe.run_until_stalled();
    assert!(pipe.take_frame().is_some());
    pipe.run_until_stalled();

    // Truncated: the end marker arrives early
    let mut truncated = second[..second.len() - 3].to_vec();
    truncated.push(mlow_core::packet::END_MARKER);
    pipe.push_packet(&truncated);
    pipe.run_until_stalled();
    let status = pipe.status();
    assert!(status.error);
    assert_eq!(status.error_kind, Some(ErrorKind::MalformedBitstream));
    assert_eq!(status.state, PipelineState::Idle);
    assert!(!pipe.audio_valid());

    pipe.push_packet(&second);
    pipe.run_until_stalled();
    assert!(pipe.audio_valid());
    assert_eq!(pipe.take_frame().unwrap(), expected);
}

#[test]
fn test_bulk_codec_info() {
    let codec = MlowCodec::new(CodecConfig::new(7, 2)).unwrap();
    let info = codec.info();
    assert_eq!(info.bitrate, 32000);
    assert_eq!(codec.frame_size(), 480);
}

#[test]
fn test_payload_rate_tracks_bitrate_selector() {
    const FRAMES: usize = 12;
    let input = voiced(480 * FRAMES);
    for bitrate in mlow_core::types::BITRATE_TABLE.iter() {
        for bandwidth in 0..=2 {
            let mut encoder = MlowEncoder::new(CodecConfig::new(bitrate.selector, bandwidth)).unwrap();
            let payload_bytes: usize = input
                .chunks(480)
                .map(|frame| encoder.encode_frame(frame).unwrap().packet.payload().len())
                .sum();
            // 100 frames per second
            let bps = (payload_bytes * 8 * 100 / FRAMES) as i64;
            let target = i64::from(bitrate.target_bitrate);
            // Within 15% of the selector's target in every bandwidth mode
            assert!(
                (bps - target).abs() * 100 <= target * 15,
                "sel {} bw {}: {} bps for a {} bps target",
                bitrate.selector,
                bandwidth,
                bps,
                target
            );
        }
    }
}
