use hearth::backend::Log;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use sha3::{Digest, Keccak256};

const BLOOM_BYTES: usize = 256;
const BLOOM_BITS_PER_ITEM: usize = 3;

/// The 2048-bit log bloom carried by receipts and headers.
#[derive(Clone, Eq, PartialEq)]
pub struct Bloom(pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl core::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Bloom(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl Bloom {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Set the three bits addressed by `keccak(input)` (the m3:2048 scheme
    /// of the Yellow Paper).
    pub fn accrue(&mut self, input: &[u8]) {
        let hash = Keccak256::digest(input);
        for i in 0..BLOOM_BITS_PER_ITEM {
            let bit = (usize::from(hash[i * 2]) << 8 | usize::from(hash[i * 2 + 1])) & 0x7ff;
            self.0[BLOOM_BYTES - 1 - bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_bytes());
        for topic in &log.topics {
            self.accrue(topic.as_bytes());
        }
    }

    pub fn accrue_bloom(&mut self, other: &Self) {
        for (byte, other_byte) in self.0.iter_mut().zip(other.0.iter()) {
            *byte |= other_byte;
        }
    }

    /// Whether every bit of `other` is set here: the filter query primitive.
    #[must_use]
    pub fn contains_bloom(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(byte, other_byte)| byte & other_byte == *other_byte)
    }

    #[must_use]
    pub fn contains_input(&self, input: &[u8]) -> bool {
        let mut single = Self::default();
        single.accrue(input);
        self.contains_bloom(&single)
    }
}

impl Encodable for Bloom {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Bloom {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        let bytes = rlp.data()?;
        if bytes.len() != BLOOM_BYTES {
            return Err(DecoderError::Custom("bloom must be 256 bytes"));
        }
        let mut out = [0u8; BLOOM_BYTES];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }
}

/// Union bloom over a set of logs.
#[must_use]
pub fn logs_bloom<'a, I: IntoIterator<Item = &'a Log>>(logs: I) -> Bloom {
    let mut bloom = Bloom::default();
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::{H160, H256};

    #[test]
    fn known_bloom_bits() {
        // The classic ethbloom fixture address/topic pair.
        let address = hex::decode("ef2d6d194084c2de36e0dabfce45d046b37d1106").unwrap();
        let topic =
            hex::decode("02c69be41d0b7e40352fc85be1cd65eb03d40ef8427a0ca4596b1ead9a00e9fc")
                .unwrap();

        let mut bloom = Bloom::default();
        bloom.accrue(&address);
        bloom.accrue(&topic);

        assert!(bloom.contains_input(&address));
        assert!(bloom.contains_input(&topic));
        assert!(!bloom.contains_input(&[0u8; 20]));
    }

    #[test]
    fn log_accrual_and_union() {
        let log = Log {
            address: H160::repeat_byte(1),
            topics: vec![H256::repeat_byte(2)],
            data: vec![1, 2, 3],
        };
        let bloom = logs_bloom([&log]);
        assert!(bloom.contains_input(log.address.as_bytes()));
        assert!(bloom.contains_input(log.topics[0].as_bytes()));

        let mut union = Bloom::default();
        union.accrue_bloom(&bloom);
        assert_eq!(union, bloom);
    }

    #[test]
    fn rlp_round_trip() {
        let mut bloom = Bloom::default();
        bloom.accrue(b"something");
        let encoded = rlp::encode(&bloom);
        let decoded: Bloom = rlp::decode(&encoded).unwrap();
        assert_eq!(bloom, decoded);
    }
}
