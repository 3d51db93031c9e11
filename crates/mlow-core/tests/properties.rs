//! Property tests for the codec's core contracts

use mlow_core::codec::band_quantizers;
use mlow_core::filterbank::{FilterbankState, ROUND_TRIP_TOLERANCE};
use mlow_core::pipeline::PipelineController;
use mlow_core::range_coder::{FrequencyModel, RangeDecoder, RangeEncoder, READ_SLACK};
use mlow_core::{BandwidthMode, CodecConfig, CodecMode, MlowCodec, AudioCodec};
use proptest::prelude::*;

fn model_strategy() -> impl Strategy<Value = (FrequencyModel, u32)> {
    (2u32..300, any::<bool>(), any::<u32>()).prop_map(|(alphabet, peaked, seed)| {
        let model = if peaked {
            FrequencyModel::peaked(alphabet)
        } else {
            FrequencyModel::uniform(alphabet)
        };
        (model, seed % alphabet)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn range_coder_is_bit_exact(stream in prop::collection::vec(model_strategy(), 0..120)) {
        let mut enc = RangeEncoder::new();
        for (model, symbol) in &stream {
            enc.encode_symbol(*symbol, model).unwrap();
        }
        let bytes = enc.finish();

        let mut dec = RangeDecoder::new(&bytes);
        for (model, symbol) in &stream {
            prop_assert_eq!(dec.decode_symbol(model), *symbol);
        }
        prop_assert_eq!(dec.symbols(), stream.len());
        prop_assert!(dec.overrun() <= READ_SLACK);
    }

    #[test]
    fn adaptive_models_stay_in_step(symbols in prop::collection::vec(0u32..40, 1..200)) {
        let mut enc_model = FrequencyModel::uniform(40).adaptive();
        let mut enc = RangeEncoder::new();
        for &s in &symbols {
            enc.encode_symbol(s, &enc_model).unwrap();
            enc_model.update(s);
        }
        let bytes = enc.finish();

        let mut dec_model = FrequencyModel::uniform(40).adaptive();
        let mut dec = RangeDecoder::new(&bytes);
        for &s in &symbols {
            let got = dec.decode_symbol(&dec_model);
            prop_assert_eq!(got, s);
            dec_model.update(got);
        }
        prop_assert_eq!(enc_model, dec_model);
    }

    #[test]
    fn quantization_error_within_half_step(
        bitrate_sel in 0u8..8,
        bandwidth_sel in 0u8..3,
        value in -40000i32..40000,
    ) {
        let config = CodecConfig::new(bitrate_sel, bandwidth_sel);
        for quantizer in band_quantizers(&config).unwrap() {
            let mut tables: Vec<_> = quantizer.pitch_gain_table().into_iter().collect();
            tables.push(quantizer.codebook_gain_table());
            tables.extend((0..quantizer.order()).map(|i| quantizer.reflection_table(i)));
            for table in tables {
                let p = value.clamp(table.min(), table.max());
                let restored = table.dequantize(table.quantize(p)).unwrap();
                prop_assert!(2 * (restored - p).abs() <= table.max_step());
                prop_assert_eq!(table.quantize(restored), table.quantize(p));
            }
        }
    }

    #[test]
    fn filterbank_round_trip(
        samples in prop::collection::vec(-16384i16..=16384, 16 * 8),
        mode in prop_oneof![
            Just(BandwidthMode::NarrowBand),
            Just(BandwidthMode::WideBand),
            Just(BandwidthMode::SuperWideBand),
        ],
    ) {
        let mut fb = FilterbankState::with_mode(mode);
        let mut output = Vec::with_capacity(samples.len());
        for frame in samples.chunks(16) {
            let bands = fb.analyze(frame).unwrap();
            output.extend(fb.synthesize(&bands).unwrap());
        }
        let delay = fb.delay();
        for i in 0..samples.len() - delay {
            let err = (i32::from(output[i + delay]) - i32::from(samples[i])).abs();
            prop_assert!(err <= ROUND_TRIP_TOLERANCE, "sample {} off by {}", i, err);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn pipeline_preserves_frame_order(
        frames in prop::collection::vec(prop::collection::vec(-12000i16..12000, 16), 1..5),
    ) {
        let config = CodecConfig::new(2, 1).with_frame_size(16);
        let mut enc = PipelineController::new(config.clone()).unwrap();
        let mut dec = PipelineController::new(config.clone().with_mode(CodecMode::Decode)).unwrap();
        let mut bulk = MlowCodec::new(config).unwrap();

        let expected: Vec<Vec<i16>> = frames
            .iter()
            .map(|f| {
                let packet = bulk.encode(f).unwrap();
                bulk.decode(&packet).unwrap()
            })
            .collect();

        let mut decoded = Vec::new();
        for frame in &frames {
            for &s in frame {
                prop_assert!(enc.push_sample(s).is_accepted());
            }
            enc.run_until_stalled();
            while let Some(byte) = enc.pull_packet_byte() {
                prop_assert!(dec.push_packet_byte(byte).is_accepted());
            }
            enc.run_until_stalled();
            dec.run_until_stalled();
            decoded.push(dec.take_frame().unwrap());
            dec.run_until_stalled();
        }
        prop_assert_eq!(decoded, expected);
    }
}
