//! Packed binary-coded decimal helpers for the clock registers
//!
//! Each register holds two decimal digits: tens in the high nibble, units in
//! the low nibble. Register-specific bits (clock halt, 12/24 mode) are kept out
//! of the digits with masks supplied by the caller.

/// Pack `value` into a BCD byte after applying `mask`
///
/// The masked value must be a decimal quantity of at most 99. Larger values
/// are not rejected: the tens digit no longer fits its nibble and the result
/// is silently truncated.
pub fn encode(mask: u8, value: u8) -> u8 {
    let value = value & mask;
    ((value / 10) << 4) | (value % 10)
}

/// Rebuild a binary value from an already-masked tens field and units field
///
/// `tens_field` is the raw register byte masked to its tens bits (still in the
/// high nibble); `units_field` is masked to the low nibble. No range check.
pub fn decode(tens_field: u8, units_field: u8) -> u8 {
    (tens_field >> 4).wrapping_mul(10).wrapping_add(units_field)
}
