use primitive_types::{H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// `keccak256([])`: the code hash of a codeless account.
pub const KECCAK_EMPTY: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
]);

/// `keccak256(rlp(""))`: the root of an empty trie.
pub const EMPTY_ROOT: H256 = H256([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
]);

/// The account record stored under `keccak(address)` in the state trie.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Account {
    pub nonce: U256,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage_root: EMPTY_ROOT,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl Account {
    /// EIP-161 emptiness: zero nonce, zero balance, no code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonce == U256::zero()
            && self.balance == U256::zero()
            && self.code_hash == KECCAK_EMPTY
    }

    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

impl Encodable for Account {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.nonce);
        s.append(&self.balance);
        s.append(&self.storage_root);
        s.append(&self.code_hash);
    }
}

impl Decodable for Account {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        Ok(Self {
            nonce: rlp.val_at(0)?,
            balance: rlp.val_at(1)?,
            storage_root: rlp.val_at(2)?,
            code_hash: rlp.val_at(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha3::{Digest, Keccak256};

    #[test]
    fn empty_constants_match_keccak() {
        assert_eq!(
            KECCAK_EMPTY,
            H256::from_slice(Keccak256::digest([]).as_slice())
        );
        assert_eq!(
            EMPTY_ROOT,
            H256::from_slice(Keccak256::digest(rlp::encode(&"").as_ref()).as_slice())
        );
    }

    #[test]
    fn rlp_round_trip() {
        let account = Account {
            nonce: U256::from(3),
            balance: U256::from(10u64.pow(18)),
            storage_root: EMPTY_ROOT,
            code_hash: KECCAK_EMPTY,
        };
        let encoded = rlp::encode(&account);
        let decoded: Account = rlp::decode(&encoded).unwrap();
        assert_eq!(account, decoded);
    }

    #[test]
    fn emptiness() {
        assert!(Account::default().is_empty());
        let mut account = Account::default();
        account.balance = U256::one();
        assert!(!account.is_empty());
    }
}
