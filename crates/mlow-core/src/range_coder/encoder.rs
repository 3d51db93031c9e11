//! Range encoder
//!
//! Narrows `[val, val + rng)` for every symbol and shifts out a byte each
//! time `rng` drops to [`CODE_BOT`]. A byte is held back in `rem` until it
//! is known whether a later carry will increment it; runs of `0xFF` wait in
//! `ext` for the same reason.

use super::model::FrequencyModel;
use super::{ilog, CODE_BITS, CODE_BOT, CODE_SHIFT, CODE_TOP, MAX_TOTAL, SYM_BITS, SYM_MAX};
use crate::error::{CodecError, Result};
use tracing::trace;

/// Range encoder state `{val, rng}` with its output buffer
#[derive(Debug, Clone)]
pub struct RangeEncoder {
    buf: Vec<u8>,
    val: u32,
    rng: u32,
    rem: Option<u32>,
    ext: u32,
    symbols: usize,
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeEncoder {
    /// Create an encoder at the start of a stream
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            val: 0,
            rng: CODE_TOP,
            rem: None,
            ext: 0,
            symbols: 0,
        }
    }

    /// Current low end of the interval
    pub fn low(&self) -> u32 {
        self.val
    }

    /// Current interval width
    pub fn range(&self) -> u32 {
        self.rng
    }

    /// Bytes emitted so far, not counting held-back carry bytes
    pub fn bytes_written(&self) -> usize {
        self.buf.len()
    }

    /// Symbols encoded so far
    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// Encode the interval `[fl, fh)` out of `ft`
    pub fn encode(&mut self, fl: u32, fh: u32, ft: u32) -> Result<()> {
        if ft == 0 || ft > MAX_TOTAL || fl >= fh || fh > ft {
            return Err(CodecError::internal_error(format!(
                "invalid interval [{}, {}) of {}",
                fl, fh, ft
            )));
        }
        let r = self.rng / ft;
        if fl > 0 {
            self.val = self
                .val
                .wrapping_add(self.rng.wrapping_sub(r.wrapping_mul(ft - fl)));
            self.rng = r.wrapping_mul(fh - fl);
        } else {
            self.rng = self.rng.wrapping_sub(r.wrapping_mul(ft - fh));
        }
        self.symbols += 1;
        self.normalize();
        Ok(())
    }

    /// Encode `symbol` with the given model
    pub fn encode_symbol(&mut self, symbol: u32, model: &FrequencyModel) -> Result<()> {
        let (fl, fh) = model.interval(symbol)?;
        self.encode(fl, fh, model.total())
    }

    fn carry_out(&mut self, c: u32) {
        if c == SYM_MAX {
            self.ext += 1;
            return;
        }
        let carry = c >> SYM_BITS;
        if let Some(rem) = self.rem {
            self.buf.push(((rem + carry) & SYM_MAX) as u8);
        }
        if self.ext > 0 {
            let sym = ((SYM_MAX + carry) & SYM_MAX) as u8;
            self.buf
                .extend(std::iter::repeat(sym).take(self.ext as usize));
            self.ext = 0;
        }
        self.rem = Some(c & SYM_MAX);
    }

    fn normalize(&mut self) {
        while self.rng <= CODE_BOT {
            self.carry_out(self.val >> CODE_SHIFT);
            self.val = (self.val << SYM_BITS) & (CODE_TOP - 1);
            self.rng <<= SYM_BITS;
        }
    }

    /// Flush the state and return the coded bytes
    ///
    /// Emits the fewest bytes that still pin the decoder inside the final
    /// interval, then releases any held-back carry bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let mut l = CODE_BITS - ilog(self.rng);
        let mut msk = (CODE_TOP - 1) >> l;
        let mut end = self.val.wrapping_add(msk) & !msk;
        if u64::from(end | msk) >= u64::from(self.val) + u64::from(self.rng) {
            l += 1;
            msk >>= 1;
            end = self.val.wrapping_add(msk) & !msk;
        }
        while l > 0 {
            self.carry_out(end >> CODE_SHIFT);
            end = (end << SYM_BITS) & (CODE_TOP - 1);
            l = l.saturating_sub(SYM_BITS);
        }
        if self.rem.is_some() || self.ext > 0 {
            self.carry_out(0);
        }
        trace!(
            "range encoder finished: {} symbols -> {} bytes",
            self.symbols,
            self.buf.len()
        );
        self.buf
    }
}
