//! Centralized numeric and structural limits the compiler enforces.

/// Joos `int` is a 32-bit two's-complement value; these are the bounds an
/// in-range integer literal must respect (§8 boundary behavior 8).
pub const INT_MIN: i64 = i32::MIN as i64;
pub const INT_MAX: i64 = i32::MAX as i64;

/// The magnitude of `-2147483648` written as a literal is exactly
/// `2^31`, one past `i32::MAX`; it is only in range when immediately
/// preceded by unary `-`.
pub const INT_LITERAL_MAGNITUDE_MAX: u64 = 1u64 << 31;

/// Byte/short/char ranges, used by the constant folder's cast masking.
pub const BYTE_MIN: i64 = i8::MIN as i64;
pub const BYTE_MAX: i64 = i8::MAX as i64;
pub const SHORT_MIN: i64 = i16::MIN as i64;
pub const SHORT_MAX: i64 = i16::MAX as i64;
pub const CHAR_MIN: i64 = 0;
pub const CHAR_MAX: i64 = u16::MAX as i64;

/// Guards recursive graph walks (`IsAncestor`, cycle detection) against
/// pathological or malformed input producing runaway recursion.
pub const MAX_TYPE_HIERARCHY_DEPTH: usize = 4096;
