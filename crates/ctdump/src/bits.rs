//! Storage-unit level bit manipulation for bit-fields and integer decoding.
//!
//! A storage unit is read as one integer in the target byte order. On
//! little-endian targets bit 0 of a bit-field slot is the unit's least
//! significant bit; on big-endian targets slots are allocated from the most
//! significant bit down.

use crate::abi::Endian;

/// Low `bits` set; `bits` may be 0..=128.
pub fn mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Interprets up to 16 bytes as an unsigned integer in the given byte order.
pub fn read_unit(bytes: &[u8], endian: Endian) -> u128 {
    debug_assert!(bytes.len() <= 16);

    match endian {
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u128, |acc, b| (acc << 8) | *b as u128),
        Endian::Big => bytes.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128),
    }
}

/// Stores the low `bytes.len() * 8` bits of `value` in the given byte order.
pub fn write_unit(bytes: &mut [u8], value: u128, endian: Endian) {
    debug_assert!(bytes.len() <= 16);

    let len = bytes.len();
    for (i, byte) in bytes.iter_mut().enumerate() {
        let shift = match endian {
            Endian::Little => i * 8,
            Endian::Big => (len - 1 - i) * 8,
        };
        *byte = (value >> shift) as u8;
    }
}

fn slot_shift(unit_bits: u32, bit_offset: u32, width: u32, endian: Endian) -> u32 {
    match endian {
        Endian::Little => bit_offset,
        Endian::Big => unit_bits - bit_offset - width,
    }
}

/// Extracts the `width`-bit slot starting at `bit_offset` of a storage unit.
pub fn extract(unit: u128, unit_bits: u32, bit_offset: u32, width: u32, endian: Endian) -> u128 {
    let shift = slot_shift(unit_bits, bit_offset, width, endian);
    (unit >> shift) & mask(width)
}

/// Replaces the `width`-bit slot starting at `bit_offset`; excess bits of `value` are dropped.
pub fn insert(
    unit: u128,
    unit_bits: u32,
    bit_offset: u32,
    width: u32,
    value: u128,
    endian: Endian,
) -> u128 {
    let shift = slot_shift(unit_bits, bit_offset, width, endian);
    let slot = mask(width) << shift;
    (unit & !slot) | ((value & mask(width)) << shift)
}

/// Sign-extends the low `bits` of `value` to a full `i128`.
pub fn sign_extend(value: u128, bits: u32) -> i128 {
    if bits == 0 || bits >= 128 {
        return value as i128;
    }

    let shift = 128 - bits;
    ((value << shift) as i128) >> shift
}
