use crate::TransactionError;
use hearth::precompiles::secp256k1::ecrecover;
use primitive_types::{H160, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use sha3::{Digest, Keccak256};

/// secp256k1 group order.
const SECP256K1N: U256 = U256([
    0xbfd2_5e8c_d036_4141,
    0xbaae_dce6_af48_a03b,
    0xffff_ffff_ffff_fffe,
    0xffff_ffff_ffff_ffff,
]);

/// `SECP256K1N / 2`, the EIP-2 malleability bound.
const SECP256K1N_HALF: U256 = U256([
    0xdfe9_2f46_681b_20a0,
    0x5d57_6e73_57a4_501d,
    0xffff_ffff_ffff_ffff,
    0x7fff_ffff_ffff_ffff,
]);

fn keccak(bytes: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(bytes).as_slice())
}

fn vrs_to_arr(v: u8, r: U256, s: U256) -> [u8; 65] {
    let mut signature = [0u8; 65];
    signature[0..32].copy_from_slice(&r.to_big_endian());
    signature[32..64].copy_from_slice(&s.to_big_endian());
    signature[64] = v;
    signature
}

fn recover(message_hash: H256, parity: u8, r: U256, s: U256) -> Result<H160, TransactionError> {
    if r == U256::zero() || s == U256::zero() || r >= SECP256K1N || s >= SECP256K1N {
        return Err(TransactionError::InvalidSignature);
    }
    ecrecover(message_hash, &vrs_to_arr(parity, r, s))
        .map_err(|_| TransactionError::InvalidSignature)
}

fn rlp_extract_to(rlp: &Rlp<'_>, index: usize) -> Result<Option<H160>, DecoderError> {
    let item = rlp.at(index)?;
    let data = item.data()?;
    match data.len() {
        0 => Ok(None),
        20 => Ok(Some(H160::from_slice(data))),
        _ => Err(DecoderError::Custom("address must be 0 or 20 bytes")),
    }
}

fn append_to(s: &mut RlpStream, to: Option<&H160>) {
    match to {
        None => s.append(&""),
        Some(address) => s.append(address),
    };
}

/// One access-list entry (EIP-2930).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessTuple {
    pub address: H160,
    pub storage_keys: Vec<H256>,
}

impl Encodable for AccessTuple {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list(&self.storage_keys);
    }
}

impl Decodable for AccessTuple {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

fn flatten_access_list(access_list: &[AccessTuple]) -> Vec<(H160, Vec<H256>)> {
    access_list
        .iter()
        .map(|tuple| (tuple.address, tuple.storage_keys.clone()))
        .collect()
}

/// The pre-EIP-2718 transaction shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    /// `None` deploys a contract.
    pub to: Option<H160>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    /// The signing payload: 6 fields pre-EIP-155, 9 with the chain id.
    pub fn rlp_append_unsigned(&self, s: &mut RlpStream, chain_id: Option<u64>) {
        s.begin_list(if chain_id.is_none() { 6 } else { 9 });
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        append_to(s, self.to.as_ref());
        s.append(&self.value);
        s.append(&self.data);
        if let Some(chain_id) = chain_id {
            s.append(&chain_id);
            s.append(&0u8);
            s.append(&0u8);
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedLegacyTransaction {
    pub transaction: LegacyTransaction,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedLegacyTransaction {
    /// EIP-155 chain id folded into `v`, if any.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        match self.v {
            0..=34 => None,
            v => Some((v - 35) / 2),
        }
    }

    /// Recover the sender.
    ///
    /// # Errors
    /// `InvalidSignature`.
    pub fn sender(&self) -> Result<H160, TransactionError> {
        let (chain_id, recovery_id) = match self.v {
            27 | 28 => (None, (self.v - 27) as u8),
            v if v >= 35 => (Some((v - 35) / 2), ((v - 35) % 2) as u8),
            _ => return Err(TransactionError::InvalidSignature),
        };

        let mut stream = RlpStream::new();
        self.transaction.rlp_append_unsigned(&mut stream, chain_id);
        recover(keccak(stream.as_raw()), recovery_id, self.r, self.s)
    }
}

impl Encodable for SignedLegacyTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.transaction.nonce);
        s.append(&self.transaction.gas_price);
        s.append(&self.transaction.gas_limit);
        append_to(s, self.transaction.to.as_ref());
        s.append(&self.transaction.value);
        s.append(&self.transaction.data);
        s.append(&self.v);
        s.append(&self.r);
        s.append(&self.s);
    }
}

impl Decodable for SignedLegacyTransaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            transaction: LegacyTransaction {
                nonce: rlp.val_at(0)?,
                gas_price: rlp.val_at(1)?,
                gas_limit: rlp.val_at(2)?,
                to: rlp_extract_to(rlp, 3)?,
                value: rlp.val_at(4)?,
                data: rlp.val_at(5)?,
            },
            v: rlp.val_at(6)?,
            r: rlp.val_at(7)?,
            s: rlp.val_at(8)?,
        })
    }
}

/// EIP-2930 access-list transaction, type `0x01`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Eip2930Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<H160>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessTuple>,
}

impl Eip2930Transaction {
    pub const TYPE_BYTE: u8 = 0x01;

    fn rlp_append_fields(&self, s: &mut RlpStream) {
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        append_to(s, self.to.as_ref());
        s.append(&self.value);
        s.append(&self.data);
        s.append_list(&self.access_list);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedEip2930Transaction {
    pub transaction: Eip2930Transaction,
    pub odd_y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignedEip2930Transaction {
    /// Recover the sender.
    ///
    /// # Errors
    /// `InvalidSignature`.
    pub fn sender(&self) -> Result<H160, TransactionError> {
        let mut stream = RlpStream::new();
        stream.append(&Eip2930Transaction::TYPE_BYTE);
        stream.begin_list(8);
        self.transaction.rlp_append_fields(&mut stream);
        recover(
            keccak(stream.as_raw()),
            self.odd_y_parity,
            self.r,
            self.s,
        )
    }
}

impl Encodable for SignedEip2930Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(11);
        self.transaction.rlp_append_fields(s);
        s.append(&self.odd_y_parity);
        s.append(&self.r);
        s.append(&self.s);
    }
}

impl Decodable for SignedEip2930Transaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 11 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            transaction: Eip2930Transaction {
                chain_id: rlp.val_at(0)?,
                nonce: rlp.val_at(1)?,
                gas_price: rlp.val_at(2)?,
                gas_limit: rlp.val_at(3)?,
                to: rlp_extract_to(rlp, 4)?,
                value: rlp.val_at(5)?,
                data: rlp.val_at(6)?,
                access_list: rlp.list_at(7)?,
            },
            odd_y_parity: rlp.val_at(8)?,
            r: rlp.val_at(9)?,
            s: rlp.val_at(10)?,
        })
    }
}

/// EIP-1559 dynamic-fee transaction, type `0x02`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: Option<H160>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessTuple>,
}

impl Eip1559Transaction {
    pub const TYPE_BYTE: u8 = 0x02;

    fn rlp_append_fields(&self, s: &mut RlpStream) {
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.max_fee_per_gas);
        s.append(&self.gas_limit);
        append_to(s, self.to.as_ref());
        s.append(&self.value);
        s.append(&self.data);
        s.append_list(&self.access_list);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedEip1559Transaction {
    pub transaction: Eip1559Transaction,
    pub odd_y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignedEip1559Transaction {
    /// Recover the sender.
    ///
    /// # Errors
    /// `InvalidSignature`.
    pub fn sender(&self) -> Result<H160, TransactionError> {
        let mut stream = RlpStream::new();
        stream.append(&Eip1559Transaction::TYPE_BYTE);
        stream.begin_list(9);
        self.transaction.rlp_append_fields(&mut stream);
        recover(
            keccak(stream.as_raw()),
            self.odd_y_parity,
            self.r,
            self.s,
        )
    }
}

impl Encodable for SignedEip1559Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(12);
        self.transaction.rlp_append_fields(s);
        s.append(&self.odd_y_parity);
        s.append(&self.r);
        s.append(&self.s);
    }
}

impl Decodable for SignedEip1559Transaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 12 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            transaction: Eip1559Transaction {
                chain_id: rlp.val_at(0)?,
                nonce: rlp.val_at(1)?,
                max_priority_fee_per_gas: rlp.val_at(2)?,
                max_fee_per_gas: rlp.val_at(3)?,
                gas_limit: rlp.val_at(4)?,
                to: rlp_extract_to(rlp, 5)?,
                value: rlp.val_at(6)?,
                data: rlp.val_at(7)?,
                access_list: rlp.list_at(8)?,
            },
            odd_y_parity: rlp.val_at(9)?,
            r: rlp.val_at(10)?,
            s: rlp.val_at(11)?,
        })
    }
}

/// EIP-4844 blob transaction, type `0x03`. Carries only the versioned
/// hashes; blob data itself travels on the consensus side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Eip4844Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    /// Blob transactions cannot deploy contracts.
    pub to: H160,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessTuple>,
    pub max_fee_per_blob_gas: U256,
    pub blob_versioned_hashes: Vec<H256>,
}

impl Eip4844Transaction {
    pub const TYPE_BYTE: u8 = 0x03;

    fn rlp_append_fields(&self, s: &mut RlpStream) {
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.max_fee_per_gas);
        s.append(&self.gas_limit);
        s.append(&self.to);
        s.append(&self.value);
        s.append(&self.data);
        s.append_list(&self.access_list);
        s.append(&self.max_fee_per_blob_gas);
        s.append_list(&self.blob_versioned_hashes);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedEip4844Transaction {
    pub transaction: Eip4844Transaction,
    pub odd_y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignedEip4844Transaction {
    /// Recover the sender.
    ///
    /// # Errors
    /// `InvalidSignature`.
    pub fn sender(&self) -> Result<H160, TransactionError> {
        let mut stream = RlpStream::new();
        stream.append(&Eip4844Transaction::TYPE_BYTE);
        stream.begin_list(11);
        self.transaction.rlp_append_fields(&mut stream);
        recover(
            keccak(stream.as_raw()),
            self.odd_y_parity,
            self.r,
            self.s,
        )
    }
}

impl Encodable for SignedEip4844Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(14);
        self.transaction.rlp_append_fields(s);
        s.append(&self.odd_y_parity);
        s.append(&self.r);
        s.append(&self.s);
    }
}

impl Decodable for SignedEip4844Transaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 14 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            transaction: Eip4844Transaction {
                chain_id: rlp.val_at(0)?,
                nonce: rlp.val_at(1)?,
                max_priority_fee_per_gas: rlp.val_at(2)?,
                max_fee_per_gas: rlp.val_at(3)?,
                gas_limit: rlp.val_at(4)?,
                to: rlp.val_at(5)?,
                value: rlp.val_at(6)?,
                data: rlp.val_at(7)?,
                access_list: rlp.list_at(8)?,
                max_fee_per_blob_gas: rlp.val_at(9)?,
                blob_versioned_hashes: rlp.list_at(10)?,
            },
            odd_y_parity: rlp.val_at(11)?,
            r: rlp.val_at(12)?,
            s: rlp.val_at(13)?,
        })
    }
}

/// Any canonical transaction shape. The envelope encoding is
/// `type_byte || rlp(payload)` for typed transactions and plain rlp for
/// legacy ones.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TypedTransaction {
    Legacy(SignedLegacyTransaction),
    AccessList(SignedEip2930Transaction),
    DynamicFee(SignedEip1559Transaction),
    Blob(SignedEip4844Transaction),
}

impl TypedTransaction {
    /// Decode from envelope bytes.
    ///
    /// # Errors
    /// `DecoderError` on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecoderError> {
        match bytes.first() {
            None => Err(DecoderError::RlpIsTooShort),
            Some(&Eip2930Transaction::TYPE_BYTE) => Ok(Self::AccessList(rlp::decode(&bytes[1..])?)),
            Some(&Eip1559Transaction::TYPE_BYTE) => Ok(Self::DynamicFee(rlp::decode(&bytes[1..])?)),
            Some(&Eip4844Transaction::TYPE_BYTE) => Ok(Self::Blob(rlp::decode(&bytes[1..])?)),
            Some(byte) if *byte <= 0x7f => Err(DecoderError::Custom("unknown transaction type")),
            Some(_) => Ok(Self::Legacy(rlp::decode(bytes)?)),
        }
    }

    /// Canonical envelope encoding.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Legacy(tx) => rlp::encode(tx).to_vec(),
            Self::AccessList(tx) => {
                let mut out = vec![Eip2930Transaction::TYPE_BYTE];
                out.extend_from_slice(&rlp::encode(tx));
                out
            }
            Self::DynamicFee(tx) => {
                let mut out = vec![Eip1559Transaction::TYPE_BYTE];
                out.extend_from_slice(&rlp::encode(tx));
                out
            }
            Self::Blob(tx) => {
                let mut out = vec![Eip4844Transaction::TYPE_BYTE];
                out.extend_from_slice(&rlp::encode(tx));
                out
            }
        }
    }

    /// Transaction hash over the envelope encoding.
    #[must_use]
    pub fn hash(&self) -> H256 {
        keccak(&self.encode())
    }

    #[must_use]
    pub const fn tx_type(&self) -> u8 {
        match self {
            Self::Legacy(_) => 0,
            Self::AccessList(_) => Eip2930Transaction::TYPE_BYTE,
            Self::DynamicFee(_) => Eip1559Transaction::TYPE_BYTE,
            Self::Blob(_) => Eip4844Transaction::TYPE_BYTE,
        }
    }

    /// Recover the sender.
    ///
    /// # Errors
    /// `InvalidSignature`.
    pub fn sender(&self) -> Result<H160, TransactionError> {
        match self {
            Self::Legacy(tx) => tx.sender(),
            Self::AccessList(tx) => tx.sender(),
            Self::DynamicFee(tx) => tx.sender(),
            Self::Blob(tx) => tx.sender(),
        }
    }

    /// Whether the `s` value is in the EIP-2 lower half.
    #[must_use]
    pub fn has_low_s(&self) -> bool {
        let s = match self {
            Self::Legacy(tx) => tx.s,
            Self::AccessList(tx) => tx.s,
            Self::DynamicFee(tx) => tx.s,
            Self::Blob(tx) => tx.s,
        };
        s <= SECP256K1N_HALF
    }

    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Self::Legacy(tx) => tx.chain_id(),
            Self::AccessList(tx) => Some(tx.transaction.chain_id),
            Self::DynamicFee(tx) => Some(tx.transaction.chain_id),
            Self::Blob(tx) => Some(tx.transaction.chain_id),
        }
    }

    #[must_use]
    pub fn nonce(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.transaction.nonce,
            Self::AccessList(tx) => tx.transaction.nonce,
            Self::DynamicFee(tx) => tx.transaction.nonce,
            Self::Blob(tx) => tx.transaction.nonce,
        }
    }

    #[must_use]
    pub fn gas_limit(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.transaction.gas_limit,
            Self::AccessList(tx) => tx.transaction.gas_limit,
            Self::DynamicFee(tx) => tx.transaction.gas_limit,
            Self::Blob(tx) => tx.transaction.gas_limit,
        }
    }

    #[must_use]
    pub fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.transaction.value,
            Self::AccessList(tx) => tx.transaction.value,
            Self::DynamicFee(tx) => tx.transaction.value,
            Self::Blob(tx) => tx.transaction.value,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Legacy(tx) => &tx.transaction.data,
            Self::AccessList(tx) => &tx.transaction.data,
            Self::DynamicFee(tx) => &tx.transaction.data,
            Self::Blob(tx) => &tx.transaction.data,
        }
    }

    #[must_use]
    pub fn to(&self) -> Option<H160> {
        match self {
            Self::Legacy(tx) => tx.transaction.to,
            Self::AccessList(tx) => tx.transaction.to,
            Self::DynamicFee(tx) => tx.transaction.to,
            Self::Blob(tx) => Some(tx.transaction.to),
        }
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        self.to().is_none()
    }

    #[must_use]
    pub fn access_list(&self) -> Vec<(H160, Vec<H256>)> {
        match self {
            Self::Legacy(_) => Vec::new(),
            Self::AccessList(tx) => flatten_access_list(&tx.transaction.access_list),
            Self::DynamicFee(tx) => flatten_access_list(&tx.transaction.access_list),
            Self::Blob(tx) => flatten_access_list(&tx.transaction.access_list),
        }
    }

    /// The most the sender can be charged per unit of gas.
    #[must_use]
    pub fn max_fee_per_gas(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.transaction.gas_price,
            Self::AccessList(tx) => tx.transaction.gas_price,
            Self::DynamicFee(tx) => tx.transaction.max_fee_per_gas,
            Self::Blob(tx) => tx.transaction.max_fee_per_gas,
        }
    }

    #[must_use]
    pub fn max_priority_fee_per_gas(&self) -> Option<U256> {
        match self {
            Self::Legacy(_) | Self::AccessList(_) => None,
            Self::DynamicFee(tx) => Some(tx.transaction.max_priority_fee_per_gas),
            Self::Blob(tx) => Some(tx.transaction.max_priority_fee_per_gas),
        }
    }

    #[must_use]
    pub fn blob_versioned_hashes(&self) -> &[H256] {
        match self {
            Self::Blob(tx) => &tx.transaction.blob_versioned_hashes,
            _ => &[],
        }
    }

    #[must_use]
    pub fn max_fee_per_blob_gas(&self) -> Option<U256> {
        match self {
            Self::Blob(tx) => Some(tx.transaction.max_fee_per_blob_gas),
            _ => None,
        }
    }

    /// Price actually charged per unit of gas:
    /// `min(max_fee, base_fee + max_priority_fee)` for dynamic-fee
    /// transactions, the stated gas price otherwise.
    #[must_use]
    pub fn effective_gas_price(&self, base_fee: U256) -> U256 {
        match self.max_priority_fee_per_gas() {
            None => self.max_fee_per_gas(),
            Some(max_priority) => core::cmp::min(
                self.max_fee_per_gas(),
                base_fee.saturating_add(max_priority),
            ),
        }
    }

    /// Per-gas amount the coinbase keeps after the base fee burn.
    #[must_use]
    pub fn effective_priority_fee(&self, base_fee: U256) -> U256 {
        self.effective_gas_price(base_fee).saturating_sub(base_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_legacy_transaction() {
        // A mainnet-era EIP-155 transfer.
        let encoded = hex::decode(
            "f86a8086d55698372431831e848094f0109fc8df283027b6285cc889f5aa624eac1f55843b9aca008025a009ebb6ca057a0535d6186462bc0b465b561c94a295bdb0621fc19208ab149a9ca0440ffd775ce91a833ab410777204d5341a6f9fa91216a6f3ee2c051fea6a0428",
        )
        .unwrap();
        let tx = TypedTransaction::decode(&encoded).unwrap();
        assert_eq!(tx.tx_type(), 0);
        assert_eq!(tx.chain_id(), Some(1));
        assert_eq!(tx.nonce(), U256::zero());
        assert_eq!(tx.value(), U256::from(1_000_000_000u64));
        assert_eq!(
            tx.sender().unwrap(),
            H160::from_slice(&hex::decode("2c7536e3605d9c16a7a3d7b1898e529396a65c23").unwrap())
        );
        assert_eq!(tx.encode(), encoded);
    }

    #[test]
    fn pre_eip155_sender_recovers() {
        let encoded = hex::decode(
            "f901f680883362396163613030836691b78080b901a06080604052600080546001600160a01b0319163317905534801561002257600080fd5b5061016e806100326000396000f3fe608060405234801561001057600080fd5b50600436106100415760003560e01c8063445df0ac146100465780638da5cb5b14610060578063fdacd57614610084575b600080fd5b61004e6100a3565b60408051918252519081900360200190f35b6100686100a9565b604080516001600160a01b039092168252519081900360200190f35b6100a16004803603602081101561009a57600080fd5b50356100b8565b005b60015481565b6000546001600160a01b031681565b6000546001600160a01b031633146101015760405162461bcd60e51b81526004018080602001828103825260338152602001806101076033913960400191505060405180910390fd5b60015556fe546869732066756e6374696f6e206973207265737472696374656420746f2074686520636f6e74726163742773206f776e6572a265627a7a72315820b7e3396b30da5009ea603d5c2bdfd68577b979d5817fbe4fbd7d983f5c04ff3464736f6c634300050f00321ca0f0133510c01bc64a64f84b411082ff74bbc4a3aa5c720d2b5f61ad76716ee232a03412d91486eb012423492af258a4cd3b03ce67dde7fdc93bbea142bce6a59c9f",
        )
        .unwrap();
        let tx = TypedTransaction::decode(&encoded).unwrap();
        assert_eq!(tx.chain_id(), None);
        assert!(tx.is_create());
        assert_eq!(
            tx.sender().unwrap(),
            H160::from_slice(&hex::decode("cf3c4c291ce0ad0ef5f6de577cd19d6d6ecf4db6").unwrap())
        );
    }

    #[test]
    fn typed_round_trips() {
        let access_list = vec![AccessTuple {
            address: H160::repeat_byte(0xaa),
            storage_keys: vec![H256::repeat_byte(1), H256::repeat_byte(2)],
        }];

        let eip1559 = TypedTransaction::DynamicFee(SignedEip1559Transaction {
            transaction: Eip1559Transaction {
                chain_id: 1,
                nonce: U256::from(7),
                max_priority_fee_per_gas: U256::from(2_000_000_000u64),
                max_fee_per_gas: U256::from(30_000_000_000u64),
                gas_limit: U256::from(21000),
                to: Some(H160::repeat_byte(0xbb)),
                value: U256::from(1),
                data: vec![],
                access_list: access_list.clone(),
            },
            odd_y_parity: 1,
            r: U256::from(10),
            s: U256::from(20),
        });
        let bytes = eip1559.encode();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(TypedTransaction::decode(&bytes).unwrap(), eip1559);

        let eip2930 = TypedTransaction::AccessList(SignedEip2930Transaction {
            transaction: Eip2930Transaction {
                chain_id: 1,
                nonce: U256::zero(),
                gas_price: U256::from(1_000_000_000u64),
                gas_limit: U256::from(60000),
                to: None,
                value: U256::zero(),
                data: vec![0x60, 0x00],
                access_list,
            },
            odd_y_parity: 0,
            r: U256::from(1),
            s: U256::from(2),
        });
        let bytes = eip2930.encode();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(TypedTransaction::decode(&bytes).unwrap(), eip2930);

        let blob = TypedTransaction::Blob(SignedEip4844Transaction {
            transaction: Eip4844Transaction {
                chain_id: 1,
                nonce: U256::zero(),
                max_priority_fee_per_gas: U256::from(1),
                max_fee_per_gas: U256::from(2),
                gas_limit: U256::from(21000),
                to: H160::repeat_byte(3),
                value: U256::zero(),
                data: vec![],
                access_list: vec![],
                max_fee_per_blob_gas: U256::from(1),
                blob_versioned_hashes: vec![H256::repeat_byte(1)],
            },
            odd_y_parity: 0,
            r: U256::from(1),
            s: U256::from(2),
        });
        let bytes = blob.encode();
        assert_eq!(bytes[0], 0x03);
        assert_eq!(TypedTransaction::decode(&bytes).unwrap(), blob);
    }

    #[test]
    fn effective_gas_price_math() {
        let tx = TypedTransaction::DynamicFee(SignedEip1559Transaction {
            transaction: Eip1559Transaction {
                chain_id: 1,
                nonce: U256::zero(),
                max_priority_fee_per_gas: U256::from(1_000_000_000u64),
                max_fee_per_gas: U256::from(3_000_000_000u64),
                gas_limit: U256::from(21000),
                to: Some(H160::zero()),
                value: U256::zero(),
                data: vec![],
                access_list: vec![],
            },
            odd_y_parity: 0,
            r: U256::from(1),
            s: U256::from(2),
        });

        let base_fee = U256::from(1_000_000_000u64);
        assert_eq!(
            tx.effective_gas_price(base_fee),
            U256::from(2_000_000_000u64)
        );
        assert_eq!(
            tx.effective_priority_fee(base_fee),
            U256::from(1_000_000_000u64)
        );

        // Fee cap binds when the base fee is high.
        let base_fee = U256::from(2_500_000_000u64);
        assert_eq!(
            tx.effective_gas_price(base_fee),
            U256::from(3_000_000_000u64)
        );
        assert_eq!(
            tx.effective_priority_fee(base_fee),
            U256::from(500_000_000u64)
        );
    }
}
