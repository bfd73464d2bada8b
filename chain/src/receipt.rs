use crate::{logs_bloom, Bloom};
use hearth::backend::Log;
use primitive_types::H256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// What the receipt commits to about the transaction's result: the
/// intermediate state root before Byzantium, a status code after.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransactionOutcome {
    StateRoot(H256),
    StatusCode(u8),
}

/// A transaction receipt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Receipt {
    pub outcome: TransactionOutcome,
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Build a receipt, deriving the bloom from the logs.
    #[must_use]
    pub fn new(outcome: TransactionOutcome, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let logs_bloom = logs_bloom(logs.iter());
        Self {
            outcome,
            cumulative_gas_used,
            logs_bloom,
            logs,
        }
    }

    /// Envelope encoding: plain rlp for legacy transactions,
    /// `type_byte || rlp(payload)` for typed ones.
    #[must_use]
    pub fn encode(&self, tx_type: u8) -> Vec<u8> {
        let payload = rlp::encode(self);
        if tx_type == 0 {
            payload.to_vec()
        } else {
            let mut out = vec![tx_type];
            out.extend_from_slice(&payload);
            out
        }
    }

    /// Decode from envelope bytes.
    ///
    /// # Errors
    /// `DecoderError` on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecoderError> {
        match bytes.first() {
            None => Err(DecoderError::RlpIsTooShort),
            Some(1..=3) => rlp::decode(&bytes[1..]),
            Some(byte) if *byte <= 0x7f => Err(DecoderError::Custom("unknown receipt type")),
            Some(_) => rlp::decode(bytes),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        match &self.outcome {
            TransactionOutcome::StateRoot(_) => true,
            TransactionOutcome::StatusCode(code) => *code == 1,
        }
    }
}

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        match &self.outcome {
            TransactionOutcome::StateRoot(root) => {
                s.append(root);
            }
            TransactionOutcome::StatusCode(code) => {
                s.append(code);
            }
        }
        s.append(&self.cumulative_gas_used);
        s.append(&self.logs_bloom);
        s.append_list(&self.logs);
    }
}

impl Decodable for Receipt {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let outcome_item = rlp.at(0)?;
        let outcome = match outcome_item.data()?.len() {
            32 => TransactionOutcome::StateRoot(outcome_item.as_val()?),
            0 | 1 => TransactionOutcome::StatusCode(outcome_item.as_val()?),
            _ => return Err(DecoderError::Custom("unexpected receipt outcome")),
        };
        Ok(Self {
            outcome,
            cumulative_gas_used: rlp.val_at(1)?,
            logs_bloom: rlp.val_at(2)?,
            logs: rlp.list_at(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H160;

    fn sample_logs() -> Vec<Log> {
        vec![Log {
            address: H160::repeat_byte(0x11),
            topics: vec![H256::repeat_byte(0x22)],
            data: vec![0xde, 0xad],
        }]
    }

    #[test]
    fn status_receipt_round_trip() {
        let receipt = Receipt::new(TransactionOutcome::StatusCode(1), 21_000, sample_logs());
        let encoded = receipt.encode(0);
        assert_eq!(Receipt::decode(&encoded).unwrap(), receipt);
        assert!(receipt.succeeded());

        let failed = Receipt::new(TransactionOutcome::StatusCode(0), 53_000, vec![]);
        let encoded = failed.encode(2);
        assert_eq!(encoded[0], 2);
        assert_eq!(Receipt::decode(&encoded).unwrap(), failed);
        assert!(!failed.succeeded());
    }

    #[test]
    fn state_root_receipt_round_trip() {
        let receipt = Receipt::new(
            TransactionOutcome::StateRoot(H256::repeat_byte(7)),
            100_000,
            sample_logs(),
        );
        let encoded = receipt.encode(0);
        assert_eq!(Receipt::decode(&encoded).unwrap(), receipt);
    }

    #[test]
    fn bloom_covers_log_address() {
        let receipt = Receipt::new(TransactionOutcome::StatusCode(1), 21_000, sample_logs());
        assert!(receipt
            .logs_bloom
            .contains_input(H160::repeat_byte(0x11).as_bytes()));
    }
}
