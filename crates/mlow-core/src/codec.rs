//! Frame encoder and decoder
//!
//! Ties the filterbank, the per-band CELP coders, the quantizer and the
//! range coder together. One call handles exactly one frame; the pipeline
//! controller and the bulk [`AudioCodec`] interface are both built on
//! these two types.
//!
//! Symbol stream of a frame:
//!
//! ```text
//! quality | band 0 | band 1 .. | checksum
//! band: reflection.. | subframe 0 ([lag, gp,] cb index, gc) | subframe 1 ..
//! ```
//!
//! Each band's allocation comes from the bitrate entry's tier for the
//! band, so the layout is fixed once the configuration is.

use crate::celp::{BandDecoder, BandEncoder, BandParameters, StabilityReport};
use crate::error::{CodecError, Result};
use crate::filterbank::{FilterbankState, Subbands};
use crate::math::log2_q8;
use crate::packet::{Packet, PacketHeader};
use crate::quality::frame_quality;
use crate::quantizer::{
    ParameterQuantizer, SymbolClass, SymbolSlot, CHECKSUM_ALPHABET, QUALITY_ALPHABET,
};
use crate::range_coder::{ModelBank, RangeDecoder, RangeEncoder, READ_SLACK};
use crate::types::{
    AudioCodec, BandwidthMode, BitrateConfig, CodecConfig, CodecInfo, ModelPolicy,
};
use crate::utils::validation::{validate_encoded_data, validate_frame};
use tracing::{debug, trace, warn};

/// Quantizers for the coded bands of a configuration
pub fn band_quantizers(config: &CodecConfig) -> Result<Vec<ParameterQuantizer>> {
    let bitrate = config.bitrate()?;
    let mode = config.bandwidth()?;
    let allocations = bitrate.band_allocations(mode)?;
    Ok(mode
        .band_lengths(config.frame_size)
        .into_iter()
        .zip(allocations)
        .map(|(len, alloc)| ParameterQuantizer::new(alloc, config.effective_order(len), len))
        .collect())
}

/// Payload bits a frame costs under a uniform model, in Q8
///
/// The static model spends a little less on reflection coefficients; this
/// is the figure the bitrate tiers are planned against.
pub fn nominal_frame_bits_q8(layout: &[SymbolSlot]) -> i64 {
    layout
        .iter()
        .map(|slot| i64::from(log2_q8(u64::from(slot.alphabet))))
        .sum()
}

/// Slot sequence of a whole frame
pub fn frame_layout<'a>(quantizers: impl IntoIterator<Item = &'a ParameterQuantizer>) -> Vec<SymbolSlot> {
    let mut layout = vec![SymbolSlot {
        class: SymbolClass::Quality,
        alphabet: QUALITY_ALPHABET,
    }];
    for quantizer in quantizers {
        layout.extend(quantizer.layout());
    }
    layout.push(SymbolSlot {
        class: SymbolClass::Checksum,
        alphabet: CHECKSUM_ALPHABET,
    });
    layout
}

/// Wrapping 8-bit sum of the symbols
pub fn checksum(symbols: &[u32]) -> u32 {
    symbols.iter().fold(0u32, |acc, &s| acc.wrapping_add(s)) & (CHECKSUM_ALPHABET - 1)
}

/// Range code a symbol sequence against a layout
pub fn entropy_encode(layout: &[SymbolSlot], symbols: &[u32], policy: ModelPolicy) -> Result<Vec<u8>> {
    if layout.len() != symbols.len() {
        return Err(CodecError::internal_error(format!(
            "{} symbols for a layout of {}",
            symbols.len(),
            layout.len()
        )));
    }
    let mut bank = ModelBank::new(policy, layout);
    let mut encoder = RangeEncoder::new();
    for (slot, &symbol) in layout.iter().zip(symbols) {
        encoder.encode_symbol(symbol, bank.model(slot)?)?;
        bank.update(slot, symbol);
    }
    Ok(encoder.finish())
}

/// Decode one symbol per slot of `layout` from `payload`
///
/// Fails with [`CodecError::MalformedBitstream`] when the decoder had to
/// read more than [`READ_SLACK`] bytes past the payload.
pub fn entropy_decode(layout: &[SymbolSlot], payload: &[u8], policy: ModelPolicy) -> Result<Vec<u32>> {
    let mut bank = ModelBank::new(policy, layout);
    let mut decoder = RangeDecoder::new(payload);
    let mut symbols = Vec::with_capacity(layout.len());
    for slot in layout {
        let symbol = decoder.decode_symbol(bank.model(slot)?);
        bank.update(slot, symbol);
        symbols.push(symbol);
    }
    if decoder.overrun() > READ_SLACK {
        return Err(CodecError::malformed_bitstream(format!(
            "payload of {} bytes ended {} bytes early",
            payload.len(),
            decoder.overrun() - READ_SLACK
        )));
    }
    Ok(symbols)
}

/// Result of encoding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// The packet
    pub packet: Packet,
    /// Quality estimate carried in the packet
    pub quality: u8,
    /// Instability absorbed while analysing the frame
    pub stability: StabilityReport,
    /// Coded bands as the decoder will reconstruct them, lowest first
    pub bands: Vec<Vec<i16>>,
}

/// Result of decoding one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Reconstructed samples, one frame
    pub samples: Vec<i16>,
    /// Quality reported by the encoder
    pub quality: u8,
    /// Packet sequence number
    pub sequence: u16,
}

/// Frame encoder
///
/// # Example
/// ```
/// use mlow_core::codec::MlowEncoder;
/// use mlow_core::types::CodecConfig;
///
/// let mut encoder = MlowEncoder::new(CodecConfig::new(3, 1)).unwrap();
/// let frame = encoder.encode_frame(&[0i16; 480]).unwrap();
/// assert_eq!(frame.quality, 75);
/// ```
#[derive(Debug, Clone)]
pub struct MlowEncoder {
    config: CodecConfig,
    bitrate: &'static BitrateConfig,
    filterbank: FilterbankState,
    bands: Vec<BandEncoder>,
    layout: Vec<SymbolSlot>,
    sequence: u16,
}

impl MlowEncoder {
    /// Create an encoder for a validated configuration
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let bitrate = config.bitrate()?;
        let quantizers = band_quantizers(&config)?;
        let layout = frame_layout(&quantizers);
        let filterbank = FilterbankState::new(config.bandwidth_sel)?;

        debug!(
            "Creating MLOW encoder: {} bps, {}, frame {} samples, {} symbols, ~{} bits per frame",
            bitrate.target_bitrate,
            filterbank.mode(),
            config.frame_size,
            layout.len(),
            nominal_frame_bits_q8(&layout) >> 8
        );

        Ok(Self {
            bands: quantizers.into_iter().map(BandEncoder::new).collect(),
            config,
            bitrate,
            filterbank,
            layout,
            sequence: 0,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Symbol slots of one frame
    pub fn layout(&self) -> &[SymbolSlot] {
        &self.layout
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    /// Clear all inter-frame state and restart the sequence numbers
    pub fn reset(&mut self) {
        debug!("Resetting MLOW encoder");
        self.filterbank.reset();
        self.bands.iter_mut().for_each(BandEncoder::reset);
        self.sequence = 0;
    }

    /// Encode one frame of samples
    ///
    /// # Arguments
    /// * `samples` - Exactly `frame_size` samples
    ///
    /// # Returns
    /// * The packet and the quality estimate for the frame
    pub fn encode_frame(&mut self, samples: &[i16]) -> Result<EncodedFrame> {
        validate_frame(samples, self.config.frame_size)?;

        let subbands = self.filterbank.analyze(samples)?;
        let mut band_symbols = Vec::with_capacity(self.bands.len());
        let mut reconstructed = Vec::with_capacity(self.bands.len());
        let mut stability = StabilityReport::default();
        for (band, encoder) in subbands.coded().iter().zip(self.bands.iter_mut()) {
            let encoded = encoder.encode(band)?;
            stability = stability.merge(encoded.stability);
            band_symbols.push(encoded.symbols);
            reconstructed.push(encoded.reconstruction);
        }

        let quality = frame_quality(
            subbands.bands(),
            &reconstructed,
            self.bitrate.quality_target,
            stability,
        );

        let mut symbols = vec![u32::from(quality)];
        for (band, encoder) in band_symbols.iter().zip(&self.bands) {
            symbols.extend(encoder.quantizer().to_stream(band));
        }
        symbols.push(checksum(&symbols));

        let payload = entropy_encode(&self.layout, &symbols, self.config.model_policy)?;
        let header = PacketHeader {
            bitrate_sel: self.config.bitrate_sel,
            bandwidth_sel: self.config.bandwidth_sel,
            policy: self.config.model_policy,
            fec: false,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        trace!(
            "encoded frame {}: {} samples -> {} symbols -> {} payload bytes, quality {}",
            header.sequence,
            samples.len(),
            symbols.len(),
            payload.len(),
            quality
        );

        Ok(EncodedFrame {
            packet: Packet::new(header, payload),
            quality,
            stability,
            bands: reconstructed,
        })
    }
}

/// Frame decoder
#[derive(Debug, Clone)]
pub struct MlowDecoder {
    config: CodecConfig,
    mode: BandwidthMode,
    filterbank: FilterbankState,
    bands: Vec<BandDecoder>,
    layout: Vec<SymbolSlot>,
    expected_sequence: Option<u16>,
    last_quality: Option<u8>,
}

impl MlowDecoder {
    /// Create a decoder for a validated configuration
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let quantizers = band_quantizers(&config)?;
        let layout = frame_layout(&quantizers);
        let filterbank = FilterbankState::new(config.bandwidth_sel)?;

        debug!(
            "Creating MLOW decoder: {}, frame {} samples, {} symbols per frame",
            filterbank.mode(),
            config.frame_size,
            layout.len()
        );

        Ok(Self {
            mode: filterbank.mode(),
            bands: quantizers.into_iter().map(BandDecoder::new).collect(),
            config,
            filterbank,
            layout,
            expected_sequence: None,
            last_quality: None,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Quality carried by the last good packet
    pub fn last_quality(&self) -> Option<u8> {
        self.last_quality
    }

    /// Clear all inter-frame state
    pub fn reset(&mut self) {
        debug!("Resetting MLOW decoder");
        self.filterbank.reset();
        self.bands.iter_mut().for_each(BandDecoder::reset);
        self.expected_sequence = None;
        self.last_quality = None;
    }

    /// Parse and verify a packet down to band parameters
    ///
    /// Nothing in the decoder changes here, so a malformed packet can be
    /// dropped without affecting the next one.
    fn parse(&self, data: &[u8]) -> Result<(Packet, u8, Vec<BandParameters>)> {
        let packet = Packet::parse(data)?;
        let header = packet.header();
        if header.bitrate_sel != self.config.bitrate_sel
            || header.bandwidth_sel != self.config.bandwidth_sel
            || header.policy != self.config.model_policy
        {
            return Err(CodecError::malformed_bitstream(format!(
                "packet header (bitrate {}, bandwidth {}, {:?}) does not match the decoder (bitrate {}, bandwidth {}, {:?})",
                header.bitrate_sel,
                header.bandwidth_sel,
                header.policy,
                self.config.bitrate_sel,
                self.config.bandwidth_sel,
                self.config.model_policy
            )));
        }

        let symbols = entropy_decode(&self.layout, packet.payload(), self.config.model_policy)?;
        let (body, check) = symbols.split_at(symbols.len() - 1);
        if checksum(body) != check[0] {
            return Err(CodecError::malformed_bitstream(format!(
                "checksum mismatch: computed {}, received {}",
                checksum(body),
                check[0]
            )));
        }

        let quality = body[0] as u8;
        let mut rest = &body[1..];
        let mut params = Vec::with_capacity(self.bands.len());
        for decoder in &self.bands {
            let count = decoder.quantizer().symbol_count();
            if rest.len() < count {
                return Err(CodecError::internal_error(format!(
                    "layout leaves {} symbols for a band of {}",
                    rest.len(),
                    count
                )));
            }
            let band = decoder.quantizer().from_stream(&rest[..count])?;
            params.push(decoder.prepare(&band).map_err(|e| {
                CodecError::malformed_bitstream(format!("band parameters rejected: {}", e))
            })?);
            rest = &rest[count..];
        }
        Ok((packet, quality, params))
    }

    /// Decode one packet into a frame of samples
    ///
    /// # Errors
    /// [`CodecError::MalformedBitstream`] for truncated, corrupted or
    /// foreign packets. Decoder state is unchanged in that case.
    pub fn decode_packet(&mut self, data: &[u8]) -> Result<DecodedFrame> {
        let (packet, quality, params) = match self.parse(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Dropping packet of {} bytes: {}", data.len(), e);
                return Err(e);
            }
        };

        let sequence = packet.header().sequence;
        if let Some(expected) = self.expected_sequence {
            if expected != sequence {
                debug!("Sequence jump: expected {}, got {}", expected, sequence);
            }
        }

        let lengths = self.mode.band_lengths(self.config.frame_size);
        let mut bands = Vec::with_capacity(lengths.len());
        for (decoder, band_params) in self.bands.iter_mut().zip(&params) {
            bands.push(decoder.apply(band_params, lengths[bands.len()])?);
        }
        // Bands the mode does not carry are synthesized from silence
        while bands.len() < lengths.len() {
            bands.push(vec![0; lengths[bands.len()]]);
        }

        let samples = self.filterbank.synthesize(&Subbands::new(self.mode, bands)?)?;
        self.expected_sequence = Some(sequence.wrapping_add(1));
        self.last_quality = Some(quality);

        trace!(
            "decoded frame {}: {} payload bytes -> {} samples",
            sequence,
            packet.payload().len(),
            samples.len()
        );

        Ok(DecodedFrame {
            samples,
            quality,
            sequence,
        })
    }
}

/// Encoder and decoder sharing one configuration
///
/// Implements [`AudioCodec`] for bulk, frame-at-a-time use.
#[derive(Debug, Clone)]
pub struct MlowCodec {
    encoder: MlowEncoder,
    decoder: MlowDecoder,
}

impl MlowCodec {
    /// Create a codec from configuration
    pub fn new(config: CodecConfig) -> Result<Self> {
        Ok(Self {
            encoder: MlowEncoder::new(config.clone())?,
            decoder: MlowDecoder::new(config)?,
        })
    }

    /// Encoder half
    pub fn encoder(&mut self) -> &mut MlowEncoder {
        &mut self.encoder
    }

    /// Decoder half
    pub fn decoder(&mut self) -> &mut MlowDecoder {
        &mut self.decoder
    }
}

impl AudioCodec for MlowCodec {
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        let frame = self.encoder.encode_frame(samples)?;
        Ok(frame.packet.to_bytes()?.to_vec())
    }

    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>> {
        validate_encoded_data(data)?;
        Ok(self.decoder.decode_packet(data)?.samples)
    }

    fn info(&self) -> CodecInfo {
        let config = self.encoder.config();
        CodecInfo {
            name: "MLOW",
            sample_rate: config.sample_rate.hz(),
            channels: 1,
            bitrate: self.encoder.bitrate.target_bitrate,
            frame_size: config.frame_size,
            bandwidth: self.decoder.mode,
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.encoder.reset();
        self.decoder.reset();
        Ok(())
    }

    fn frame_size(&self) -> usize {
        self.encoder.config().frame_size
    }
}
