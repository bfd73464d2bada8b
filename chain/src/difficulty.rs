use crate::{DifficultyRule, Header, VmSpec};
use primitive_types::U256;

const MINIMUM_DIFFICULTY: u64 = 131_072;
const DIFFICULTY_BOUND_DIVISOR: u64 = 2048;
const BOMB_EXPONENTIAL_PERIOD: u64 = 100_000;
const BOMB_EXPONENTIAL_FREE_PERIODS: u64 = 2;

/// Canonical difficulty of a block with the given parent and timestamp.
#[must_use]
pub fn calculate_difficulty(spec: &VmSpec, parent: &Header, timestamp: u64) -> U256 {
    let adjustment = parent.difficulty / U256::from(DIFFICULTY_BOUND_DIVISOR);
    let elapsed = timestamp.saturating_sub(parent.timestamp);

    let mut difficulty = match spec.difficulty {
        DifficultyRule::Zero => return U256::zero(),

        DifficultyRule::Frontier => {
            if elapsed < 13 {
                parent.difficulty + adjustment
            } else {
                parent.difficulty.saturating_sub(adjustment)
            }
        }

        DifficultyRule::Homestead => {
            // max(1 - elapsed/10, -99)
            let factor = 1i64 - (elapsed / 10) as i64;
            apply_factor(parent.difficulty, adjustment, factor.max(-99))
        }

        DifficultyRule::Byzantium => {
            // EIP-100: max((2 if parent has ommers else 1) - elapsed/9, -99)
            let base = if parent.has_ommers() { 2i64 } else { 1 };
            let factor = base - (elapsed / 9) as i64;
            apply_factor(parent.difficulty, adjustment, factor.max(-99))
        }
    };

    // The bomb, with the fork's delay pretending the chain is younger.
    let number = parent.number + 1;
    let fake_number = number.saturating_sub(spec.bomb_delay);
    let period = fake_number / BOMB_EXPONENTIAL_PERIOD;
    if period >= BOMB_EXPONENTIAL_FREE_PERIODS {
        difficulty += U256::one() << (period - BOMB_EXPONENTIAL_FREE_PERIODS);
    }

    difficulty.max(U256::from(MINIMUM_DIFFICULTY))
}

fn apply_factor(parent_difficulty: U256, adjustment: U256, factor: i64) -> U256 {
    if factor >= 0 {
        parent_difficulty + adjustment * U256::from(factor as u64)
    } else {
        parent_difficulty.saturating_sub(adjustment * U256::from((-factor) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockNonce, Bloom, EMPTY_OMMERS_HASH};
    use primitive_types::{H160, H256};

    fn parent(difficulty: u64, number: u64, timestamp: u64) -> Header {
        Header {
            parent_hash: H256::zero(),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: H160::zero(),
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            logs_bloom: Bloom::default(),
            difficulty: U256::from(difficulty),
            number,
            gas_limit: 8_000_000,
            gas_used: 0,
            timestamp,
            extra_data: Vec::new(),
            mix_hash: H256::zero(),
            nonce: BlockNonce::default(),
            base_fee_per_gas: None,
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
        }
    }

    #[test]
    fn frontier_thirteen_second_rule() {
        let spec = VmSpec::frontier();
        let p = parent(2_000_000, 100, 1000);
        let adjustment = 2_000_000 / 2048;
        assert_eq!(
            calculate_difficulty(&spec, &p, 1010),
            U256::from(2_000_000 + adjustment)
        );
        assert_eq!(
            calculate_difficulty(&spec, &p, 1015),
            U256::from(2_000_000 - adjustment)
        );
    }

    #[test]
    fn homestead_smooth_adjustment() {
        let spec = VmSpec::homestead();
        let p = parent(2_000_000, 100, 1000);
        let adjustment = 2_000_000 / 2048;
        // 5 seconds: factor 1.
        assert_eq!(
            calculate_difficulty(&spec, &p, 1005),
            U256::from(2_000_000 + adjustment)
        );
        // 10..19 seconds: factor 0.
        assert_eq!(
            calculate_difficulty(&spec, &p, 1012),
            U256::from(2_000_000)
        );
        // 25 seconds: factor -1.
        assert_eq!(
            calculate_difficulty(&spec, &p, 1025),
            U256::from(2_000_000 - adjustment)
        );
    }

    #[test]
    fn byzantium_uncle_bonus() {
        let spec = VmSpec::byzantium();
        let mut p = parent(2_000_000, 4_370_100, 1000);
        let adjustment = 2_000_000 / 2048;
        // No uncles, 5 seconds: factor 1.
        assert_eq!(
            calculate_difficulty(&spec, &p, 1005),
            U256::from(2_000_000 + adjustment)
        );
        // With uncles the factor gains one.
        p.ommers_hash = H256::repeat_byte(1);
        assert_eq!(
            calculate_difficulty(&spec, &p, 1005),
            U256::from(2_000_000 + 2 * adjustment)
        );
    }

    #[test]
    fn bomb_delay_postpones_explosion() {
        // At block 5_000_000 the undelayed bomb term would be
        // 2^(50 - 2) while Byzantium's 3M delay leaves 2^(20 - 2).
        let spec = VmSpec::byzantium();
        let p = parent(2_000_000_000, 4_999_999, 1000);
        // Elapsed 9 seconds: adjustment factor 0, only the bomb term adds.
        let with_delay = calculate_difficulty(&spec, &p, 1009);
        assert_eq!(
            with_delay,
            U256::from(2_000_000_000u64) + (U256::one() << 18)
        );
    }

    #[test]
    fn floor_holds() {
        let spec = VmSpec::frontier();
        let p = parent(131_072, 1, 1000);
        assert_eq!(
            calculate_difficulty(&spec, &p, 2000),
            U256::from(MINIMUM_DIFFICULTY)
        );
    }

    #[test]
    fn zero_rule() {
        let spec = VmSpec::paris();
        let p = parent(0, 16_000_000, 1000);
        assert_eq!(calculate_difficulty(&spec, &p, 1012), U256::zero());
    }
}
