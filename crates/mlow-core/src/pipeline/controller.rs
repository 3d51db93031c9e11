//! Tick-driven frame pipeline controller

use super::status::{ControlConfig, PipelineState, Progress, Status};
use crate::codec::{MlowDecoder, MlowEncoder};
use crate::error::{CodecError, ErrorKind, Result};
use crate::frame_buffer::{Frame, FrameBuffer, FrameBufferState, PushOutcome, RejectReason};
use crate::packet::{frame_bytes, PacketByte, HEADER_SIZE};
use crate::types::{CodecConfig, CodecMode};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Largest packet the byte input collects before giving up on it
pub const MAX_PACKET_BYTES: usize = HEADER_SIZE + 2 * (u16::MAX as usize) + 3;

/// Upper bound on state changes per [`PipelineController::run_until_stalled`]
const MAX_STEPS: usize = 64;

/// Work held between `Idle` and `Processing`
#[derive(Debug, Clone)]
enum InFlight {
    Samples(Frame),
    Packet(Vec<u8>),
}

/// Single-frame pipeline with ready/valid flow control
///
/// Encode: samples go in through [`push_sample`](Self::push_sample), the
/// packet comes out through [`pull_packet_byte`](Self::pull_packet_byte).
/// Decode: packet bytes go in through
/// [`push_packet_byte`](Self::push_packet_byte), samples come out through
/// [`pop_sample`](Self::pop_sample). Each [`tick`](Self::tick) moves the
/// state machine by at most one step:
///
/// ```text
/// Idle -> Configuring -> Idle | Error
/// Idle -> Processing -> Emitting (encode) | Draining (decode) -> Idle
/// ```
///
/// Only one frame is ever in flight. A new frame starts processing only
/// after the consumer has taken all output of the previous one.
#[derive(Debug, Clone)]
pub struct PipelineController {
    config: CodecConfig,
    pending: Option<ControlConfig>,
    state: PipelineState,
    encoder: MlowEncoder,
    decoder: MlowDecoder,
    input: FrameBuffer,
    output: FrameBuffer,
    packet_in: Vec<u8>,
    packet_started: bool,
    packet_complete: bool,
    packet_out: VecDeque<PacketByte>,
    in_flight: Option<InFlight>,
    error: Option<ErrorKind>,
    quality: u8,
}

impl PipelineController {
    /// Create a controller with a validated initial configuration
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Creating pipeline controller: {:?}, bitrate_sel {}, bandwidth_sel {}, frame {}",
            config.mode, config.bitrate_sel, config.bandwidth_sel, config.frame_size
        );
        Ok(Self {
            encoder: MlowEncoder::new(config.clone())?,
            decoder: MlowDecoder::new(config.clone())?,
            input: FrameBuffer::new(config.frame_size),
            output: FrameBuffer::new(config.frame_size),
            config,
            pending: None,
            state: PipelineState::Idle,
            packet_in: Vec::new(),
            packet_started: false,
            packet_complete: false,
            packet_out: VecDeque::new(),
            in_flight: None,
            error: None,
            quality: 0,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Status outputs
    pub fn status(&self) -> Status {
        Status {
            busy: self.state == PipelineState::Processing,
            error: self.error.is_some(),
            error_kind: self.error,
            quality_metric: self.quality,
            state: self.state,
        }
    }

    /// Request a new configuration
    ///
    /// Takes effect between frames. A frame that is in flight, complete
    /// or partly collected is processed and emitted under the old
    /// configuration first; no new frame is accepted meanwhile. A later
    /// request replaces an earlier one that has not been applied yet.
    pub fn configure(&mut self, control: ControlConfig) {
        debug!("Configuration requested: {:?}", control);
        self.pending = Some(control);
        let between_frames = self.state == PipelineState::Idle && !self.has_collected_work();
        if between_frames || self.state == PipelineState::Error {
            self.state = PipelineState::Configuring;
        }
    }

    /// Discard everything in flight and clear the error
    ///
    /// The active configuration is kept.
    pub fn reset(&mut self) {
        debug!("Resetting pipeline controller");
        self.encoder.reset();
        self.decoder.reset();
        self.input.flush();
        self.output.flush();
        self.packet_in.clear();
        self.packet_started = false;
        self.packet_complete = false;
        self.packet_out.clear();
        self.in_flight = None;
        self.pending = None;
        self.error = None;
        self.quality = 0;
        self.state = PipelineState::Idle;
    }

    fn accepts_input(&self) -> bool {
        self.state != PipelineState::Error && self.state != PipelineState::Configuring
    }

    /// Samples or packet bytes of a frame that has not started processing
    fn has_collected_work(&self) -> bool {
        !self.input.is_empty() || self.packet_started
    }

    /// A pending configuration holds back the first sample or byte of a new frame
    fn holds_new_frame(&self) -> bool {
        self.pending.is_some() && !self.has_collected_work()
    }

    // --- encode side -----------------------------------------------------

    /// Whether [`push_sample`](Self::push_sample) would accept a sample
    pub fn audio_ready(&self) -> bool {
        self.config.mode.is_encode()
            && self.accepts_input()
            && !self.holds_new_frame()
            && self.input.is_ready()
    }

    /// Offer one input sample
    pub fn push_sample(&mut self, sample: i16) -> PushOutcome {
        if !self.config.mode.is_encode() || !self.accepts_input() {
            return PushOutcome::Rejected(RejectReason::BufferFull);
        }
        if self.holds_new_frame() {
            return PushOutcome::Rejected(RejectReason::Reconfiguring);
        }
        self.input.push(sample)
    }

    /// Whether a packet byte is waiting
    pub fn packet_valid(&self) -> bool {
        !self.packet_out.is_empty()
    }

    /// Take the next packet byte
    pub fn pull_packet_byte(&mut self) -> Option<PacketByte> {
        self.packet_out.pop_front()
    }

    /// Take the rest of the current packet at once
    pub fn take_packet(&mut self) -> Option<Vec<u8>> {
        if self.packet_out.is_empty() {
            return None;
        }
        Some(self.packet_out.drain(..).map(|b| b.data).collect())
    }

    // --- decode side -----------------------------------------------------

    /// Whether [`push_packet_byte`](Self::push_packet_byte) would accept a byte
    pub fn packet_ready(&self) -> bool {
        !self.config.mode.is_encode()
            && self.accepts_input()
            && !self.holds_new_frame()
            && !self.packet_complete
    }

    /// Offer one packet byte
    ///
    /// Bytes before a start flag are discarded. A start flag in the middle
    /// of a packet restarts collection.
    pub fn push_packet_byte(&mut self, byte: PacketByte) -> PushOutcome {
        if !self.packet_ready() {
            let reason = if self.holds_new_frame() {
                RejectReason::Reconfiguring
            } else {
                RejectReason::BufferFull
            };
            return PushOutcome::Rejected(reason);
        }
        if byte.start {
            if self.packet_started {
                warn!("Packet restarted after {} bytes", self.packet_in.len());
            }
            self.packet_in.clear();
            self.packet_started = true;
        } else if !self.packet_started {
            trace!("Discarding byte outside a packet");
            return PushOutcome::Accepted;
        }

        self.packet_in.push(byte.data);
        if byte.end {
            self.packet_complete = true;
        } else if self.packet_in.len() >= MAX_PACKET_BYTES {
            warn!("Packet exceeds {} bytes without an end marker", MAX_PACKET_BYTES);
            self.packet_in.clear();
            self.packet_started = false;
            self.error = Some(ErrorKind::MalformedBitstream);
        }
        PushOutcome::Accepted
    }

    /// Offer a whole serialized packet
    pub fn push_packet(&mut self, data: &[u8]) -> PushOutcome {
        if !self.packet_ready() || self.packet_started {
            return PushOutcome::Rejected(RejectReason::BufferFull);
        }
        for byte in frame_bytes(data) {
            self.push_packet_byte(byte);
        }
        PushOutcome::Accepted
    }

    /// Whether decoded samples are waiting
    pub fn audio_valid(&self) -> bool {
        self.output.state() == FrameBufferState::Draining
    }

    /// Take the next decoded sample
    pub fn pop_sample(&mut self) -> Option<i16> {
        self.output.pop_sample()
    }

    /// Take the rest of the decoded frame at once
    pub fn take_frame(&mut self) -> Option<Vec<i16>> {
        self.output.drain_remaining()
    }

    // --- sequencing ------------------------------------------------------

    /// Advance the state machine by one step
    pub fn tick(&mut self) -> Progress {
        let before = self.state;
        match self.state {
            PipelineState::Idle => self.start_frame(),
            PipelineState::Configuring => self.apply_configuration(),
            PipelineState::Processing => self.process(),
            PipelineState::Emitting => {
                if self.packet_out.is_empty() {
                    self.enter_idle();
                }
            }
            PipelineState::Draining => {
                if self.output.state() != FrameBufferState::Draining {
                    self.enter_idle();
                }
            }
            PipelineState::Error => {}
        }

        if self.state == before {
            Progress::Stalled
        } else {
            trace!("pipeline {} -> {}", before, self.state);
            Progress::Advanced
        }
    }

    /// Tick until nothing moves; returns the number of steps taken
    pub fn run_until_stalled(&mut self) -> usize {
        let mut steps = 0;
        while steps < MAX_STEPS && self.tick() == Progress::Advanced {
            steps += 1;
        }
        steps
    }

    fn enter_idle(&mut self) {
        self.state = if self.holds_new_frame() {
            PipelineState::Configuring
        } else {
            PipelineState::Idle
        };
    }

    fn start_frame(&mut self) {
        if self.holds_new_frame() {
            self.state = PipelineState::Configuring;
            return;
        }
        match self.config.mode {
            CodecMode::Encode if self.input.is_full() => match self.input.take_frame() {
                Ok(frame) => {
                    self.in_flight = Some(InFlight::Samples(frame));
                    self.state = PipelineState::Processing;
                }
                Err(e) => self.latch(&e),
            },
            CodecMode::Decode if self.packet_complete => {
                let packet = std::mem::take(&mut self.packet_in);
                self.packet_started = false;
                self.packet_complete = false;
                self.in_flight = Some(InFlight::Packet(packet));
                self.state = PipelineState::Processing;
            }
            _ => {}
        }
    }

    fn apply_configuration(&mut self) {
        let Some(control) = self.pending.take() else {
            self.state = PipelineState::Idle;
            return;
        };

        let mut config = self.config.clone();
        config.mode = control.mode;
        config.bitrate_sel = control.bitrate_sel;
        config.bandwidth_sel = control.bandwidth_sel;

        if let Err(e) = config.validate() {
            warn!("Rejecting configuration: {}", e);
            self.error = Some(e.kind());
            self.state = PipelineState::Error;
            return;
        }

        let selectors_changed = config.bitrate_sel != self.config.bitrate_sel
            || config.bandwidth_sel != self.config.bandwidth_sel;
        if selectors_changed {
            match (MlowEncoder::new(config.clone()), MlowDecoder::new(config.clone())) {
                (Ok(encoder), Ok(decoder)) => {
                    self.encoder = encoder;
                    self.decoder = decoder;
                }
                (Err(e), _) | (_, Err(e)) => {
                    self.error = Some(e.kind());
                    self.state = PipelineState::Error;
                    return;
                }
            }
        }
        if config.mode != self.config.mode {
            debug!("Switching pipeline mode {:?} -> {:?}", self.config.mode, config.mode);
        }

        self.config = config;
        self.error = None;
        self.state = PipelineState::Idle;
    }

    fn process(&mut self) {
        let result = match self.in_flight.take() {
            Some(InFlight::Samples(frame)) => self.encode(frame),
            Some(InFlight::Packet(packet)) => self.decode(&packet),
            None => Err(CodecError::invalid_state("process", self.state)),
        };
        if let Err(e) = result {
            self.latch(&e);
            self.state = PipelineState::Idle;
        }
    }

    fn encode(&mut self, frame: Frame) -> Result<()> {
        let encoded = self.encoder.encode_frame(frame.samples())?;
        let bytes = encoded.packet.to_bytes()?;
        self.packet_out.extend(frame_bytes(&bytes));
        self.quality = encoded.quality;
        self.state = PipelineState::Emitting;
        Ok(())
    }

    fn decode(&mut self, packet: &[u8]) -> Result<()> {
        let decoded = self.decoder.decode_packet(packet)?;
        self.output.load(Frame::new(decoded.samples))?;
        self.quality = decoded.quality;
        self.state = PipelineState::Draining;
        Ok(())
    }

    fn latch(&mut self, error: &CodecError) {
        warn!("Frame dropped: {}", error);
        self.error = Some(error.kind());
    }
}
