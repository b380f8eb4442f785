//! `long double` decoding and shortest round-trip scientific rendering.
//!
//! Digits are generated with the free-format algorithm of Steele & White /
//! Burger & Dybvig over exact big integers: the value and the half-way points
//! to its neighbours are scaled so that each generated digit can be checked
//! against the rounding interval, and generation stops as soon as the digits
//! so far identify the value uniquely under round-to-nearest-even.

use std::cmp::Ordering;

use crate::{
    abi::{Endian, LongDoubleFormat},
    bits::{read_unit, write_unit},
};

/// A decoded binary floating-point value of any supported precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extended {
    /// `mantissa * 2^exponent`, where the format holds `precision` significant bits
    /// and `min_exponent` is the exponent of its subnormals.
    Finite {
        negative: bool,
        mantissa: u128,
        exponent: i32,
        precision: u32,
        min_exponent: i32,
    },
    Infinite {
        negative: bool,
    },
    Nan,
}

impl Extended {
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1 << 52) - 1);

        match biased {
            0x7ff if fraction == 0 => Extended::Infinite { negative },
            0x7ff => Extended::Nan,
            0 => finite(negative, fraction as u128, -1074, 53, -1074),
            _ => finite(
                negative,
                (fraction | 1 << 52) as u128,
                biased - 1075,
                53,
                -1074,
            ),
        }
    }

    /// Decodes the storage of a `long double`. `bytes` must hold at least the
    /// encoding's significant bytes (8, 10 or 16).
    pub fn decode(
        bytes: &[u8],
        format: LongDoubleFormat,
        endian: Endian,
    ) -> Result<Self, &'static str> {
        let needed = match format {
            LongDoubleFormat::Double => 8,
            LongDoubleFormat::X87Extended => 10,
            LongDoubleFormat::IeeeQuad => 16,
        };
        if bytes.len() < needed {
            return Err("storage is smaller than the long double encoding");
        }

        match format {
            LongDoubleFormat::Double => {
                let raw = read_unit(&bytes[..8], endian) as u64;
                Ok(Extended::from_f64(f64::from_bits(raw)))
            }
            LongDoubleFormat::X87Extended => decode_x87(read_unit(&bytes[..10], endian)),
            LongDoubleFormat::IeeeQuad => Ok(decode_quad(read_unit(&bytes[..16], endian))),
        }
    }

    /// Shortest digits that read back to this exact value, in `d.ddde±x` form.
    pub fn to_scientific(&self) -> String {
        match *self {
            Extended::Nan => "NaN".to_string(),
            Extended::Infinite { negative } => sign(negative, "inf".to_string()),
            Extended::Finite {
                negative,
                mantissa: 0,
                ..
            } => sign(negative, "0e0".to_string()),
            Extended::Finite {
                negative,
                mantissa,
                exponent,
                precision,
                min_exponent,
            } => {
                let (digits, k) = shortest_digits(mantissa, exponent, precision, min_exponent);
                let mut out = String::with_capacity(digits.len() + 8);
                out.push((b'0' + digits[0]) as char);
                if digits.len() > 1 {
                    out.push('.');
                    out.extend(digits[1..].iter().map(|d| (b'0' + d) as char));
                }
                out.push('e');
                out.push_str(&(k - 1).to_string());
                sign(negative, out)
            }
        }
    }
}

fn finite(negative: bool, mantissa: u128, exponent: i32, precision: u32, min_exponent: i32) -> Extended {
    Extended::Finite {
        negative,
        mantissa,
        exponent,
        precision,
        min_exponent,
    }
}

fn sign(negative: bool, text: String) -> String {
    if negative { format!("-{}", text) } else { text }
}

fn decode_x87(raw: u128) -> Result<Extended, &'static str> {
    let mantissa = raw as u64;
    let sign_exponent = (raw >> 64) as u16;
    let negative = sign_exponent >> 15 == 1;
    let biased = (sign_exponent & 0x7fff) as i32;
    let integer_bit = mantissa >> 63 == 1;

    match biased {
        0 => Ok(finite(negative, mantissa as u128, -16445, 64, -16445)),
        0x7fff if !integer_bit => Err("pseudo-infinity or pseudo-NaN extended encoding"),
        0x7fff if mantissa << 1 == 0 => Ok(Extended::Infinite { negative }),
        0x7fff => Ok(Extended::Nan),
        _ if !integer_bit => Err("unnormal extended encoding"),
        _ => Ok(finite(negative, mantissa as u128, biased - 16383 - 63, 64, -16445)),
    }
}

fn decode_quad(raw: u128) -> Extended {
    let negative = raw >> 127 == 1;
    let biased = ((raw >> 112) & 0x7fff) as i32;
    let fraction = raw & ((1u128 << 112) - 1);

    match biased {
        0x7fff if fraction == 0 => Extended::Infinite { negative },
        0x7fff => Extended::Nan,
        0 => finite(negative, fraction, -16494, 113, -16494),
        _ => finite(negative, fraction | 1 << 112, biased - 16383 - 112, 113, -16494),
    }
}

/// Encodes a `double` value as a `long double` of the given format, padded with
/// zeroes to `size` bytes. The conversion is exact.
pub fn encode_long_double(value: f64, format: LongDoubleFormat, size: usize, endian: Endian) -> Vec<u8> {
    let mut out = vec![0u8; size];

    match format {
        LongDoubleFormat::Double => write_unit(&mut out[..8], value.to_bits() as u128, endian),
        LongDoubleFormat::X87Extended => write_unit(&mut out[..10], x87_bits(value), endian),
        LongDoubleFormat::IeeeQuad => write_unit(&mut out[..16], quad_bits(value), endian),
    }

    out
}

fn x87_bits(value: f64) -> u128 {
    let bits = value.to_bits();
    let sign = (bits >> 63) as u128;
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1 << 52) - 1);

    let (exponent, mantissa): (u128, u64) = match biased {
        0 if fraction == 0 => (0, 0),
        0 => {
            let lz = fraction.leading_zeros() as i32;
            (((-1074 - lz + 63) + 16383) as u128, fraction << lz)
        }
        0x7ff if fraction == 0 => (0x7fff, 1 << 63),
        0x7ff => (0x7fff, 0xc000_0000_0000_0000),
        _ => ((biased - 1023 + 16383) as u128, 1 << 63 | fraction << 11),
    };

    sign << 79 | exponent << 64 | mantissa as u128
}

fn quad_bits(value: f64) -> u128 {
    let bits = value.to_bits();
    let sign = (bits >> 63) as u128;
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1 << 52) - 1);

    let (exponent, fraction): (u128, u128) = match biased {
        0 if fraction == 0 => (0, 0),
        0 => {
            let top = 63 - fraction.leading_zeros() as i32;
            let rest = (fraction & !(1u64 << top)) as u128;
            ((top - 1074 + 16383) as u128, rest << (112 - top))
        }
        0x7ff if fraction == 0 => (0x7fff, 0),
        0x7ff => (0x7fff, 1 << 111),
        _ => ((biased - 1023 + 16383) as u128, (fraction as u128) << 60),
    };

    sign << 127 | exponent << 112 | fraction
}

/// Returns the shortest decimal digits `d1 d2 ...` and `k` such that
/// `0.d1d2... * 10^k` rounds back to `mantissa * 2^exponent`.
fn shortest_digits(mantissa: u128, exponent: i32, precision: u32, min_exponent: i32) -> (Vec<u8>, i32) {
    let even = mantissa & 1 == 0;
    let unequal_gaps = mantissa == 1u128 << (precision - 1) && exponent > min_exponent;

    let (mut r, mut s, mut m_plus, mut m_minus) = if exponent >= 0 {
        let e = exponent as u32;
        if unequal_gaps {
            (
                Big::from_u128(mantissa).shl(e + 2),
                Big::from_u128(4),
                Big::from_u128(1).shl(e + 1),
                Big::from_u128(1).shl(e),
            )
        } else {
            (
                Big::from_u128(mantissa).shl(e + 1),
                Big::from_u128(2),
                Big::from_u128(1).shl(e),
                Big::from_u128(1).shl(e),
            )
        }
    } else {
        let e = exponent.unsigned_abs();
        if unequal_gaps {
            (
                Big::from_u128(mantissa).shl(2),
                Big::from_u128(1).shl(e + 2),
                Big::from_u128(2),
                Big::from_u128(1),
            )
        } else {
            (
                Big::from_u128(mantissa).shl(1),
                Big::from_u128(1).shl(e + 1),
                Big::from_u128(1),
                Big::from_u128(1),
            )
        }
    };

    let log2 = (exponent as i64 + (128 - mantissa.leading_zeros()) as i64 - 1) as f64;
    let mut k = (log2 * std::f64::consts::LOG10_2 - 1e-10).ceil() as i32;
    if k >= 0 {
        s.mul_pow10(k as u32);
    } else {
        let scale = k.unsigned_abs();
        r.mul_pow10(scale);
        m_plus.mul_pow10(scale);
        m_minus.mul_pow10(scale);
    }

    let reaches = |sum: &Big, s: &Big| match sum.cmp(s) {
        Ordering::Greater => true,
        Ordering::Equal => even,
        Ordering::Less => false,
    };

    while reaches(&r.add(&m_plus), &s) {
        s.mul_small(10);
        k += 1;
    }
    loop {
        let mut high = r.add(&m_plus);
        high.mul_small(10);
        if reaches(&high, &s) {
            break;
        }
        r.mul_small(10);
        m_plus.mul_small(10);
        m_minus.mul_small(10);
        k -= 1;
    }

    let mut digits = Vec::with_capacity(40);
    loop {
        r.mul_small(10);
        m_plus.mul_small(10);
        m_minus.mul_small(10);

        let mut digit = 0u8;
        while r.cmp(&s) != Ordering::Less {
            r.sub_assign(&s);
            digit += 1;
        }

        let low = match r.cmp(&m_minus) {
            Ordering::Less => true,
            Ordering::Equal => even,
            Ordering::Greater => false,
        };
        let high = reaches(&r.add(&m_plus), &s);

        match (low, high) {
            (false, false) => digits.push(digit),
            (true, false) => {
                digits.push(digit);
                break;
            }
            (false, true) => {
                digits.push(digit + 1);
                break;
            }
            (true, true) => {
                let twice = r.shl(1);
                digits.push(if twice.cmp(&s) == Ordering::Less { digit } else { digit + 1 });
                break;
            }
        }
    }

    (digits, k)
}

/// Minimal unsigned big integer, little-endian base 2^32 limbs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Big {
    limbs: Vec<u32>,
}

impl Big {
    fn from_u128(mut value: u128) -> Self {
        let mut limbs = Vec::with_capacity(4);
        while value != 0 {
            limbs.push(value as u32);
            value >>= 32;
        }
        Big { limbs }
    }

    fn trim(&mut self) {
        while self.limbs.last() == Some(&0) {
            self.limbs.pop();
        }
    }

    fn shl(&self, bits: u32) -> Big {
        let words = (bits / 32) as usize;
        let bits = bits % 32;
        let mut limbs = vec![0u32; words];
        limbs.reserve(self.limbs.len() + 1);

        let mut carry = 0u32;
        for limb in &self.limbs {
            if bits == 0 {
                limbs.push(*limb);
            } else {
                limbs.push(limb << bits | carry);
                carry = limb >> (32 - bits);
            }
        }
        limbs.push(carry);

        let mut out = Big { limbs };
        out.trim();
        out
    }

    fn mul_small(&mut self, factor: u32) {
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let product = *limb as u64 * factor as u64 + carry;
            *limb = product as u32;
            carry = product >> 32;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
    }

    fn mul_pow10(&mut self, mut n: u32) {
        while n >= 9 {
            self.mul_small(1_000_000_000);
            n -= 9;
        }
        if n > 0 {
            self.mul_small(10u32.pow(n));
        }
    }

    fn add(&self, other: &Big) -> Big {
        let len = self.limbs.len().max(other.limbs.len());
        let mut limbs = Vec::with_capacity(len + 1);
        let mut carry = 0u64;

        for i in 0..len {
            let a = *self.limbs.get(i).unwrap_or(&0) as u64;
            let b = *other.limbs.get(i).unwrap_or(&0) as u64;
            let sum = a + b + carry;
            limbs.push(sum as u32);
            carry = sum >> 32;
        }
        if carry != 0 {
            limbs.push(carry as u32);
        }

        Big { limbs }
    }

    /// `self -= other`; requires `self >= other`.
    fn sub_assign(&mut self, other: &Big) {
        let mut borrow = 0i64;
        for i in 0..self.limbs.len() {
            let b = *other.limbs.get(i).unwrap_or(&0) as i64;
            let mut diff = self.limbs[i] as i64 - b - borrow;
            borrow = 0;
            if diff < 0 {
                diff += 1 << 32;
                borrow = 1;
            }
            self.limbs[i] = diff as u32;
        }
        self.trim();
    }

    fn cmp(&self, other: &Big) -> Ordering {
        let a = self.limbs.len() - self.limbs.iter().rev().take_while(|l| **l == 0).count();
        let b = other.limbs.len() - other.limbs.iter().rev().take_while(|l| **l == 0).count();
        if a != b {
            return a.cmp(&b);
        }

        for i in (0..a).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }

        Ordering::Equal
    }
}
