use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Bits packed MSB-first with their exact count, so trailing padding in the
/// last byte is never mistaken for data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PackedBits", into = "PackedBits")]
pub struct BitString {
    data: Vec<u8>,
    len: usize,
}

impl BitString {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bit(&self, i: usize) -> Option<bool> {
        if i >= self.len {
            return None;
        }
        Some((self.data[i / 8] >> (7 - i % 8)) & 1 == 1)
    }

    pub fn reader(&self) -> BitReader<'_> {
        BitReader { bits: self, pos: 0 }
    }
}

impl std::fmt::Display for BitString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.len {
            let bit = self.bit(i).unwrap_or(false);
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PackedBits {
    len: usize,
    data: String,
}

impl From<BitString> for PackedBits {
    fn from(bits: BitString) -> Self {
        Self {
            len: bits.len,
            data: STANDARD.encode(&bits.data),
        }
    }
}

impl TryFrom<PackedBits> for BitString {
    type Error = String;

    fn try_from(packed: PackedBits) -> Result<Self, Self::Error> {
        let data = STANDARD
            .decode(packed.data.as_bytes())
            .map_err(|e| format!("bitstring payload is not base64: {e}"))?;
        if data.len() != packed.len.div_ceil(8) {
            return Err(format!(
                "bitstring of {} bits cannot be stored in {} bytes",
                packed.len,
                data.len()
            ));
        }
        Ok(Self {
            data,
            len: packed.len,
        })
    }
}

#[derive(Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    current_byte: u8,
    bits_in_current: u8,
    len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | (bit as u8);
        self.bits_in_current += 1;
        self.len += 1;
        if self.bits_in_current == 8 {
            self.buf.push(self.current_byte);
            self.current_byte = 0;
            self.bits_in_current = 0;
        }
    }

    pub fn write_bits(&mut self, value: u64, n: u8) {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    pub fn write_all(&mut self, bits: &[bool]) {
        for &bit in bits {
            self.write_bit(bit);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(mut self) -> BitString {
        if self.bits_in_current > 0 {
            self.current_byte <<= 8 - self.bits_in_current;
            self.buf.push(self.current_byte);
        }
        BitString {
            data: self.buf,
            len: self.len,
        }
    }
}

pub struct BitReader<'a> {
    bits: &'a BitString,
    pos: usize,
}

impl BitReader<'_> {
    pub fn read_bit(&mut self) -> Option<bool> {
        let bit = self.bits.bit(self.pos)?;
        self.pos += 1;
        Some(bit)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bits.len - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_true() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        let bits = w.finish();
        assert_eq!(bits.as_bytes(), &[0x80]);
        assert_eq!(bits.len(), 1);
    }

    #[test]
    fn write_3_bits() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        let bits = w.finish();
        assert_eq!(bits.as_bytes(), &[0xA0]);
        assert_eq!(bits.to_string(), "101");
    }

    #[test]
    fn write_across_byte_boundary() {
        let mut w = BitWriter::new();
        w.write_bits(0b11111, 5);
        w.write_bits(0b11111, 5);
        let bits = w.finish();
        assert_eq!(bits.as_bytes(), &[0xFF, 0xC0]);
        assert_eq!(bits.len(), 10);
    }

    #[test]
    fn empty_writer() {
        let bits = BitWriter::new().finish();
        assert!(bits.is_empty());
        assert!(bits.as_bytes().is_empty());
    }

    #[test]
    fn write_16_bits() {
        let mut w = BitWriter::new();
        w.write_bits(0xCAFE, 16);
        assert_eq!(w.finish().as_bytes(), &[0xCA, 0xFE]);
    }

    #[test]
    fn reader_stops_at_exact_length() {
        let mut w = BitWriter::new();
        w.write_all(&[true, false, true]);
        let bits = w.finish();
        let mut r = bits.reader();
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_bit(), Some(true));
        assert_eq!(r.read_bit(), Some(false));
        assert_eq!(r.read_bit(), Some(true));
        assert_eq!(r.position(), 3);
        assert_eq!(r.read_bit(), None);
    }

    #[test]
    fn serde_uses_base64_payload() {
        let mut w = BitWriter::new();
        w.write_bits(0xCAFE, 16);
        w.write_bit(true);
        let bits = w.finish();
        let json = serde_json::to_string(&bits).unwrap();
        assert_eq!(json, r#"{"len":17,"data":"yv6A"}"#);
        let back: BitString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bits);
    }

    #[test]
    fn serde_rejects_length_mismatch() {
        assert!(serde_json::from_str::<BitString>(r#"{"len":9,"data":"yg=="}"#).is_err());
        assert!(serde_json::from_str::<BitString>(r#"{"len":3,"data":"!!"}"#).is_err());
    }
}
