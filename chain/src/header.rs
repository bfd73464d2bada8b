use crate::Bloom;
use primitive_types::{H160, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use sha3::{Digest, Keccak256};

/// `keccak(rlp([]))`: the ommers hash of a block with no uncles.
pub const EMPTY_OMMERS_HASH: H256 = H256([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4,
    0x1a, 0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4,
    0x93, 0x47,
]);

/// The 8-byte proof-of-work nonce. RLP-encoded as a fixed-width byte
/// string, never as an integer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BlockNonce(pub [u8; 8]);

impl BlockNonce {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 8]
    }

    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl Encodable for BlockNonce {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for BlockNonce {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        let bytes = rlp.data()?;
        if bytes.len() != 8 {
            return Err(DecoderError::Custom("block nonce must be 8 bytes"));
        }
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }
}

/// A block header. The optional tail fields appeared with London
/// (`base_fee_per_gas`), Shanghai (`withdrawals_root`) and Cancun (the blob
/// fields); they encode in that order, stopping at the first absent one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub parent_hash: H256,
    pub ommers_hash: H256,
    pub beneficiary: H160,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    /// `prev_randao` after the merge.
    pub mix_hash: H256,
    pub nonce: BlockNonce,
    pub base_fee_per_gas: Option<U256>,
    pub withdrawals_root: Option<H256>,
    pub blob_gas_used: Option<u64>,
    pub excess_blob_gas: Option<u64>,
    pub parent_beacon_block_root: Option<H256>,
}

impl Header {
    fn tail_len(&self) -> usize {
        // The tail must be contiguous; a later field without the earlier
        // ones cannot be represented on the wire.
        let mut len = 0;
        if self.base_fee_per_gas.is_some() {
            len = 1;
            if self.withdrawals_root.is_some() {
                len = 2;
                if self.blob_gas_used.is_some()
                    && self.excess_blob_gas.is_some()
                    && self.parent_beacon_block_root.is_some()
                {
                    len = 5;
                }
            }
        }
        len
    }

    fn rlp_append_inner(&self, s: &mut RlpStream, with_seal: bool) {
        let base = if with_seal { 15 } else { 13 };
        s.begin_list(base + self.tail_len());
        s.append(&self.parent_hash);
        s.append(&self.ommers_hash);
        s.append(&self.beneficiary);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data);
        if with_seal {
            s.append(&self.mix_hash);
            s.append(&self.nonce);
        }
        if let Some(base_fee) = self.base_fee_per_gas {
            s.append(&base_fee);
        }
        if let Some(withdrawals_root) = self.withdrawals_root {
            s.append(&withdrawals_root);
        }
        if self.tail_len() == 5 {
            s.append(&self.blob_gas_used.expect("tail_len checked"));
            s.append(&self.excess_blob_gas.expect("tail_len checked"));
            s.append(&self.parent_beacon_block_root.expect("tail_len checked"));
        }
    }

    /// Canonical block hash.
    #[must_use]
    pub fn hash(&self) -> H256 {
        H256::from_slice(Keccak256::digest(rlp::encode(self)).as_slice())
    }

    /// The hash Ethash seals over: the header without `mix_hash` and
    /// `nonce`.
    #[must_use]
    pub fn seal_hash(&self) -> H256 {
        let mut s = RlpStream::new();
        self.rlp_append_inner(&mut s, false);
        H256::from_slice(Keccak256::digest(s.out()).as_slice())
    }

    #[must_use]
    pub fn has_ommers(&self) -> bool {
        self.ommers_hash != EMPTY_OMMERS_HASH
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        self.rlp_append_inner(s, true);
    }
}

impl Decodable for Header {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        let item_count = rlp.item_count()?;
        if !matches!(item_count, 15 | 16 | 17 | 20) {
            return Err(DecoderError::Custom("unexpected header arity"));
        }

        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            ommers_hash: rlp.val_at(1)?,
            beneficiary: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at(12)?,
            mix_hash: rlp.val_at(13)?,
            nonce: rlp.val_at(14)?,
            base_fee_per_gas: if item_count > 15 {
                Some(rlp.val_at(15)?)
            } else {
                None
            },
            withdrawals_root: if item_count > 16 {
                Some(rlp.val_at(16)?)
            } else {
                None
            },
            blob_gas_used: if item_count > 17 {
                Some(rlp.val_at(17)?)
            } else {
                None
            },
            excess_blob_gas: if item_count > 18 {
                Some(rlp.val_at(18)?)
            } else {
                None
            },
            parent_beacon_block_root: if item_count > 19 {
                Some(rlp.val_at(19)?)
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            parent_hash: H256::repeat_byte(1),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: H160::repeat_byte(2),
            state_root: H256::repeat_byte(3),
            transactions_root: H256::repeat_byte(4),
            receipts_root: H256::repeat_byte(5),
            logs_bloom: Bloom::default(),
            difficulty: U256::from(131072),
            number: 1,
            gas_limit: 8_000_000,
            gas_used: 21_000,
            timestamp: 1_600_000_000,
            extra_data: b"hearth".to_vec(),
            mix_hash: H256::repeat_byte(6),
            nonce: BlockNonce::from_u64(42),
            base_fee_per_gas: None,
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
        }
    }

    #[test]
    fn empty_ommers_constant() {
        let encoded = RlpStream::new_list(0).out();
        assert_eq!(
            EMPTY_OMMERS_HASH,
            H256::from_slice(Keccak256::digest(encoded).as_slice())
        );
    }

    #[test]
    fn legacy_round_trip() {
        let header = sample_header();
        let decoded: Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn london_and_cancun_round_trip() {
        let mut header = sample_header();
        header.base_fee_per_gas = Some(U256::from(7));
        let decoded: Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(header, decoded);

        header.withdrawals_root = Some(H256::repeat_byte(9));
        header.blob_gas_used = Some(0);
        header.excess_blob_gas = Some(0);
        header.parent_beacon_block_root = Some(H256::repeat_byte(10));
        let decoded: Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn seal_hash_ignores_seal_fields() {
        let mut header = sample_header();
        let seal_hash = header.seal_hash();
        let hash = header.hash();
        header.nonce = BlockNonce::from_u64(7);
        header.mix_hash = H256::repeat_byte(0xaa);
        assert_eq!(header.seal_hash(), seal_hash);
        assert_ne!(header.hash(), hash);
    }
}
