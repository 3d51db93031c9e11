//! Range coder
//!
//! A 32-bit carry-propagating range coder with 8-bit output symbols.
//! The encoder keeps `{val, rng}` plus a one-byte carry buffer; the
//! decoder mirrors its renormalization byte for byte. Symbols are coded
//! against cumulative frequency tables supplied by [`FrequencyModel`].
//!
//! The decoder never panics on hostile input: it substitutes zero bytes
//! once the buffer is exhausted and reports how many it had to invent, so
//! callers can reject streams that read far past their end.

pub mod decoder;
pub mod encoder;
pub mod model;

pub use decoder::RangeDecoder;
pub use encoder::RangeEncoder;
pub use model::{FrequencyModel, ModelBank};

/// Bits per output symbol
pub const SYM_BITS: u32 = 8;
/// Largest output symbol value
pub const SYM_MAX: u32 = (1 << SYM_BITS) - 1;
/// Width of the coder state
pub const CODE_BITS: u32 = 32;
/// Top of the coding interval
pub const CODE_TOP: u32 = 1 << (CODE_BITS - 1);
/// Renormalize once the range falls to this value
pub const CODE_BOT: u32 = CODE_TOP >> SYM_BITS;
/// Shift that extracts the next output symbol from `val`
pub const CODE_SHIFT: u32 = CODE_BITS - SYM_BITS - 1;
/// Bits of the first input byte that seed the decoder
pub const CODE_EXTRA: u32 = (CODE_BITS - 2) % SYM_BITS + 1;

/// Bytes the decoder may read past the end of a valid stream
///
/// The decoder primes four bytes of lookahead on init, so an exact-length
/// stream legitimately runs up to this many bytes past its end.
pub const READ_SLACK: usize = 4;

/// Largest total frequency accepted by the coder
pub const MAX_TOTAL: u32 = 1 << 16;

/// Number of significant bits in `value` (0 for 0)
pub fn ilog(value: u32) -> u32 {
    CODE_BITS - value.leading_zeros()
}
