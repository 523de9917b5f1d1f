//! Deterministic workload generation.
//!
//! All benchmark data is drawn from a 48-bit linear congruential stream using
//! integer arithmetic only. Given the same seed, count and bounds, every
//! generated string and index is identical on every platform, so two backends
//! always receive the same workload.

use rand::RngCore;

use crate::error::{Error, Result};

/// Default seed shared by every generation call.
pub const DEFAULT_SEED: i64 = -2_662_502_316_022_774;

/// Default minimum generated string length (inclusive).
pub const DEFAULT_MIN_LENGTH: usize = 5;

/// Default maximum generated string length (exclusive).
pub const DEFAULT_MAX_LENGTH: usize = 500;

/// Characters used for generated strings.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const MULTIPLIER: u64 = 0x5_DEEC_E66D;
const ADDEND: u64 = 0xB;
const MASK: u64 = (1 << 48) - 1;

/// Largest bound accepted by [`Lcg48::next_int_bounded`].
const MAX_BOUND: usize = i32::MAX as usize;

/// 48-bit linear congruential generator (multiplier `0x5DEECE66D`, addend `0xB`).
#[derive(Debug, Clone)]
pub struct Lcg48 {
    state: u64,
}

impl Lcg48 {
    /// Create a stream from a signed 64-bit seed.
    pub fn new(seed: i64) -> Self {
        Self {
            state: (seed as u64 ^ MULTIPLIER) & MASK,
        }
    }

    fn next(&mut self, bits: u32) -> i32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(ADDEND)
            & MASK;
        (self.state >> (48 - bits)) as i32
    }

    /// Uniform 32-bit signed value.
    pub fn next_int(&mut self) -> i32 {
        self.next(32)
    }

    /// Uniform value in `[0, bound)`.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is not positive.
    pub fn next_int_bounded(&mut self, bound: i32) -> i32 {
        assert!(bound > 0, "bound must be positive");

        let m = bound - 1;
        let mut r = self.next(31);
        if bound & m == 0 {
            return ((bound as i64 * r as i64) >> 31) as i32;
        }

        // Reject the top partial interval so every residue is equally likely.
        let mut u = r;
        loop {
            r = u % bound;
            if u.wrapping_sub(r).wrapping_add(m) >= 0 {
                return r;
            }
            u = self.next(31);
        }
    }

    /// Uniform 64-bit signed value.
    pub fn next_long(&mut self) -> i64 {
        let high = (self.next(32) as i64) << 32;
        high.wrapping_add(self.next(32) as i64)
    }

    /// Uniform boolean.
    pub fn next_boolean(&mut self) -> bool {
        self.next(1) != 0
    }

    /// Uniform value in `[0.0, 1.0)` with 24 bits of precision.
    pub fn next_float(&mut self) -> f32 {
        self.next(24) as f32 / (1 << 24) as f32
    }

    /// Uniform value in `[0.0, 1.0)` with 53 bits of precision.
    pub fn next_double(&mut self) -> f64 {
        let bits = ((self.next(26) as i64) << 27) + self.next(27) as i64;
        bits as f64 * (1.0 / (1i64 << 53) as f64)
    }
}

impl RngCore for Lcg48 {
    fn next_u32(&mut self) -> u32 {
        self.next_int() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_long() as u64
    }

    /// One 32-bit draw per four bytes, low byte first.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let mut value = self.next_int();
            for byte in chunk {
                *byte = value as u8;
                value >>= 8;
            }
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Check string length bounds before drawing from a stream.
pub(crate) fn check_length_bounds(min_length: usize, max_length: usize) -> Result<()> {
    if min_length >= max_length {
        return Err(Error::GeneratorMisuse(format!(
            "min length {} must be below max length {}",
            min_length, max_length
        )));
    }
    if max_length - min_length > MAX_BOUND {
        return Err(Error::GeneratorMisuse(format!(
            "length range {}..{} exceeds the stream's range",
            min_length, max_length
        )));
    }
    Ok(())
}

/// Draw one string with a length in `[min_length, max_length)`.
///
/// Callers must have validated the bounds with `check_length_bounds`.
pub(crate) fn random_string(rng: &mut Lcg48, min_length: usize, max_length: usize) -> String {
    let length = min_length + rng.next_int_bounded((max_length - min_length) as i32) as usize;
    random_string_of_length(rng, length)
}

/// Draw a string of exactly `length` characters.
///
/// Every 32-bit draw is split into four 8-bit lanes, low lane first; each lane
/// picks one character modulo the alphabet size. Lanes left over past `length`
/// are discarded.
pub fn random_string_of_length(rng: &mut Lcg48, length: usize) -> String {
    let mut chars = Vec::with_capacity(length + 4);
    while chars.len() < length {
        let value = rng.next_int();
        for shift in [0, 8, 16, 24] {
            let lane = ((value >> shift) & 0xff) as usize;
            chars.push(ALPHABET[lane % ALPHABET.len()]);
        }
    }
    chars.truncate(length);
    // The alphabet is ASCII, so every byte is a valid char.
    chars.into_iter().map(char::from).collect()
}

/// Deterministic producer of benchmark strings and index sequences.
///
/// A fresh stream seeded with [`WorkloadGenerator::seed`] is created for every
/// call, so repeated calls with the same arguments return the same values and
/// shorter sequences are prefixes of longer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadGenerator {
    seed: i64,
}

impl WorkloadGenerator {
    /// Create a generator for the given seed.
    pub fn new(seed: i64) -> Self {
        Self { seed }
    }

    /// The configured seed.
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// A fresh stream positioned at the start of the seeded sequence.
    pub fn stream(&self) -> Lcg48 {
        Lcg48::new(self.seed)
    }

    /// Generate `count` strings using the default length bounds.
    pub fn generate_strings(&self, count: usize) -> Result<Vec<String>> {
        self.generate_strings_with_bounds(count, DEFAULT_MIN_LENGTH, DEFAULT_MAX_LENGTH)
    }

    /// Generate `count` strings with lengths in `[min_length, max_length)`.
    pub fn generate_strings_with_bounds(
        &self,
        count: usize,
        min_length: usize,
        max_length: usize,
    ) -> Result<Vec<String>> {
        check_length_bounds(min_length, max_length)?;

        let mut rng = self.stream();
        Ok((0..count)
            .map(|_| random_string(&mut rng, min_length, max_length))
            .collect())
    }

    /// Generate `count` indices in `[0, max_value_inclusive]`.
    pub fn generate_indices(&self, count: usize, max_value_inclusive: usize) -> Result<Vec<usize>> {
        if max_value_inclusive >= MAX_BOUND {
            return Err(Error::GeneratorMisuse(format!(
                "max index {} exceeds the stream's range",
                max_value_inclusive
            )));
        }

        let bound = (max_value_inclusive + 1) as i32;
        let mut rng = self.stream();
        Ok((0..count)
            .map(|_| rng.next_int_bounded(bound) as usize)
            .collect())
    }
}

impl Default for WorkloadGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_matches_reference_values() {
        let mut rng = Lcg48::new(42);
        assert_eq!(rng.next_int(), -1_170_105_035);
        assert_eq!(rng.next_int(), 234_785_527);

        let mut rng = Lcg48::new(42);
        let bounded: Vec<i32> = (0..10).map(|_| rng.next_int_bounded(10)).collect();
        assert_eq!(bounded, vec![0, 3, 8, 4, 0, 5, 5, 8, 9, 3]);

        assert_eq!(Lcg48::new(42).next_long(), -5_025_562_857_975_149_833);
        assert_eq!(Lcg48::new(42).next_double(), 0.7275636800328681);
        assert_eq!(Lcg48::new(42).next_float(), 0.7275636792182922_f64 as f32);

        let mut rng = Lcg48::new(42);
        let flags: Vec<bool> = (0..4).map(|_| rng.next_boolean()).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_fill_bytes_uses_low_lanes_first() {
        let mut rng = Lcg48::new(42);
        let mut bytes = [0u8; 5];
        rng.fill_bytes(&mut bytes);
        let signed: Vec<i8> = bytes.iter().map(|b| *b as i8).collect();
        assert_eq!(signed, vec![53, -99, 65, -70, -9]);
    }

    #[test]
    fn test_default_strings_reference() {
        let strings = WorkloadGenerator::default().generate_strings(3).unwrap();
        let lengths: Vec<usize> = strings.iter().map(String::len).collect();
        assert_eq!(lengths, vec![360, 427, 78]);
        assert!(strings[0].starts_with("qqSbeE7PcwEPpv3vAOYQ"));
    }

    #[test]
    fn test_lane_splitting_with_short_bounds() {
        let strings = WorkloadGenerator::default()
            .generate_strings_with_bounds(2, 5, 10)
            .unwrap();
        assert_eq!(strings, vec!["qqSbe".to_string(), "pv3vAOY".to_string()]);
    }

    #[test]
    fn test_generate_strings_is_deterministic() {
        let generator = WorkloadGenerator::default();
        let first = generator.generate_strings(50).unwrap();
        let second = generator.generate_strings(50).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shorter_sequence_is_prefix() {
        let generator = WorkloadGenerator::default();
        let short = generator.generate_strings_with_bounds(7, 1, 40).unwrap();
        let long = generator.generate_strings_with_bounds(20, 1, 40).unwrap();
        assert_eq!(short[..], long[..7]);

        // Rebuild the prefix by hand from the documented lane algorithm.
        let mut rng = generator.stream();
        for expected in &short {
            let length = 1 + rng.next_int_bounded(39) as usize;
            let mut chars = String::new();
            while chars.len() < length {
                let value = rng.next_int();
                for shift in [0, 8, 16, 24] {
                    let lane = ((value >> shift) & 0xff) as usize;
                    chars.push(ALPHABET[lane % 62] as char);
                }
            }
            chars.truncate(length);
            assert_eq!(&chars, expected);
        }
    }

    #[test]
    fn test_strings_respect_bounds_and_alphabet() {
        let strings = WorkloadGenerator::new(7)
            .generate_strings_with_bounds(500, 3, 17)
            .unwrap();
        for s in &strings {
            assert!(s.len() >= 3 && s.len() < 17, "bad length {}", s.len());
            assert!(s.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        let generator = WorkloadGenerator::default();
        assert!(generator.generate_strings(0).unwrap().is_empty());
        assert!(generator.generate_indices(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        let generator = WorkloadGenerator::default();
        assert!(matches!(
            generator.generate_strings_with_bounds(1, 10, 10),
            Err(Error::GeneratorMisuse(_))
        ));
        assert!(matches!(
            generator.generate_indices(1, usize::MAX),
            Err(Error::GeneratorMisuse(_))
        ));
    }

    #[test]
    fn test_indices_reference_and_range() {
        let generator = WorkloadGenerator::default();
        assert_eq!(
            generator.generate_indices(5, 99).unwrap(),
            vec![20, 90, 50, 27, 30]
        );

        for max in [0, 1, 7, 64, 999] {
            let indices = generator.generate_indices(1_000, max).unwrap();
            assert!(indices.iter().all(|&i| i <= max));
        }
    }

    #[test]
    fn test_seed_changes_output() {
        let a = WorkloadGenerator::new(1).generate_strings(5).unwrap();
        let b = WorkloadGenerator::new(2).generate_strings(5).unwrap();
        assert_ne!(a, b);
    }
}
