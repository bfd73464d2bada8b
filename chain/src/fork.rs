use hearth::precompiles::StandardPrecompiles;
use hearth::Config;
use primitive_types::U256;

/// When a fork turns on: by block number historically, by timestamp since
/// Shanghai.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ForkActivation {
    Block(u64),
    Timestamp(u64),
}

impl ForkActivation {
    #[must_use]
    pub const fn is_active(&self, number: u64, timestamp: u64) -> bool {
        match self {
            Self::Block(block) => number >= *block,
            Self::Timestamp(at) => timestamp >= *at,
        }
    }
}

/// Which difficulty formula a fork uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DifficultyRule {
    /// The 13-second up/down rule.
    Frontier,
    /// EIP-2 smooth adjustment.
    Homestead,
    /// EIP-100 uncle-aware adjustment.
    Byzantium,
    /// Proof of stake: difficulty is zero.
    Zero,
}

/// Which seal check applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SealRule {
    /// Ethash proof of work.
    Ethash,
    /// Post-merge: zero difficulty, zero nonce, no ommers.
    None,
}

/// Which precompile set a fork carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrecompileFork {
    Frontier,
    Byzantium,
    Istanbul,
    Berlin,
    Cancun,
}

impl PrecompileFork {
    #[must_use]
    pub fn build(self) -> StandardPrecompiles {
        match self {
            Self::Frontier => StandardPrecompiles::frontier(),
            Self::Byzantium => StandardPrecompiles::byzantium(),
            Self::Istanbul => StandardPrecompiles::istanbul(),
            Self::Berlin => StandardPrecompiles::berlin(),
            Self::Cancun => StandardPrecompiles::cancun(),
        }
    }
}

const fn wei(value: u64) -> U256 {
    U256([value, 0, 0, 0])
}

/// 5 ETH, the Frontier block reward.
const REWARD_FRONTIER: U256 = wei(5_000_000_000_000_000_000);
/// 3 ETH since Byzantium (EIP-649).
const REWARD_BYZANTIUM: U256 = wei(3_000_000_000_000_000_000);
/// 2 ETH since Constantinople (EIP-1234).
const REWARD_CONSTANTINOPLE: U256 = wei(2_000_000_000_000_000_000);

/// The complete rule set of one fork: the VM configuration plus everything
/// the chain layer needs to validate and apply blocks. One constructor per
/// fork, each reusing the previous fork's values.
#[derive(Clone, Debug)]
pub struct VmSpec {
    pub name: &'static str,
    pub config: Config,
    pub precompiles: PrecompileFork,
    /// Static block reward; zero after the merge.
    pub block_reward: U256,
    pub difficulty: DifficultyRule,
    /// Blocks subtracted from the number before the difficulty bomb.
    pub bomb_delay: u64,
    pub seal: SealRule,
    /// Highest transaction envelope type accepted.
    pub max_tx_type: u8,
    /// Receipts commit to intermediate state roots before Byzantium.
    pub receipts_carry_state_root: bool,
    /// Reject transactions with a high `s` (EIP-2, Homestead).
    pub reject_high_s: bool,
    /// Header carries a withdrawals root (Shanghai).
    pub has_withdrawals: bool,
    /// Header carries blob gas fields (Cancun).
    pub has_blob_gas: bool,
    /// EIP-1559 gas target divisor.
    pub elasticity_multiplier: u64,
}

impl VmSpec {
    #[must_use]
    pub const fn frontier() -> Self {
        Self {
            name: "Frontier",
            config: Config::frontier(),
            precompiles: PrecompileFork::Frontier,
            block_reward: REWARD_FRONTIER,
            difficulty: DifficultyRule::Frontier,
            bomb_delay: 0,
            seal: SealRule::Ethash,
            max_tx_type: 0,
            receipts_carry_state_root: true,
            reject_high_s: false,
            has_withdrawals: false,
            has_blob_gas: false,
            elasticity_multiplier: 2,
        }
    }

    #[must_use]
    pub const fn homestead() -> Self {
        let mut spec = Self::frontier();
        spec.name = "Homestead";
        spec.config = Config::homestead();
        spec.difficulty = DifficultyRule::Homestead;
        spec.reject_high_s = true;
        spec
    }

    #[must_use]
    pub const fn tangerine_whistle() -> Self {
        let mut spec = Self::homestead();
        spec.name = "TangerineWhistle";
        spec.config = Config::tangerine_whistle();
        spec
    }

    #[must_use]
    pub const fn spurious_dragon() -> Self {
        let mut spec = Self::tangerine_whistle();
        spec.name = "SpuriousDragon";
        spec.config = Config::spurious_dragon();
        spec
    }

    #[must_use]
    pub const fn byzantium() -> Self {
        let mut spec = Self::spurious_dragon();
        spec.name = "Byzantium";
        spec.config = Config::byzantium();
        spec.precompiles = PrecompileFork::Byzantium;
        spec.block_reward = REWARD_BYZANTIUM;
        spec.difficulty = DifficultyRule::Byzantium;
        spec.bomb_delay = 3_000_000;
        spec.receipts_carry_state_root = false;
        spec
    }

    #[must_use]
    pub const fn constantinople() -> Self {
        let mut spec = Self::byzantium();
        spec.name = "Constantinople";
        spec.config = Config::constantinople();
        spec.block_reward = REWARD_CONSTANTINOPLE;
        spec.bomb_delay = 5_000_000;
        spec
    }

    #[must_use]
    pub const fn petersburg() -> Self {
        let mut spec = Self::constantinople();
        spec.name = "Petersburg";
        spec.config = Config::petersburg();
        spec
    }

    #[must_use]
    pub const fn istanbul() -> Self {
        let mut spec = Self::petersburg();
        spec.name = "Istanbul";
        spec.config = Config::istanbul();
        spec.precompiles = PrecompileFork::Istanbul;
        spec
    }

    /// Difficulty-bomb delay only (EIP-2384).
    #[must_use]
    pub const fn muir_glacier() -> Self {
        let mut spec = Self::istanbul();
        spec.name = "MuirGlacier";
        spec.bomb_delay = 9_000_000;
        spec
    }

    #[must_use]
    pub const fn berlin() -> Self {
        let mut spec = Self::muir_glacier();
        spec.name = "Berlin";
        spec.config = Config::berlin();
        spec.precompiles = PrecompileFork::Berlin;
        spec.max_tx_type = 1;
        spec
    }

    #[must_use]
    pub const fn london() -> Self {
        let mut spec = Self::berlin();
        spec.name = "London";
        spec.config = Config::london();
        spec.max_tx_type = 2;
        spec.bomb_delay = 9_700_000;
        spec
    }

    /// Difficulty-bomb delay only (EIP-4345).
    #[must_use]
    pub const fn arrow_glacier() -> Self {
        let mut spec = Self::london();
        spec.name = "ArrowGlacier";
        spec.bomb_delay = 10_700_000;
        spec
    }

    /// Difficulty-bomb delay only (EIP-5133).
    #[must_use]
    pub const fn gray_glacier() -> Self {
        let mut spec = Self::arrow_glacier();
        spec.name = "GrayGlacier";
        spec.bomb_delay = 11_400_000;
        spec
    }

    /// The merge: proof of stake, no rewards, zero difficulty.
    #[must_use]
    pub const fn paris() -> Self {
        let mut spec = Self::gray_glacier();
        spec.name = "Paris";
        spec.config = Config::merge();
        spec.block_reward = U256([0, 0, 0, 0]);
        spec.difficulty = DifficultyRule::Zero;
        spec.seal = SealRule::None;
        spec
    }

    #[must_use]
    pub const fn shanghai() -> Self {
        let mut spec = Self::paris();
        spec.name = "Shanghai";
        spec.config = Config::shanghai();
        spec.has_withdrawals = true;
        spec
    }

    #[must_use]
    pub const fn cancun() -> Self {
        let mut spec = Self::shanghai();
        spec.name = "Cancun";
        spec.config = Config::cancun();
        spec.precompiles = PrecompileFork::Cancun;
        spec.max_tx_type = 3;
        spec.has_blob_gas = true;
        spec
    }
}

/// The ordered activation list: the latest entry whose activation covers a
/// header decides its rules.
#[derive(Clone, Debug)]
pub struct ForkSchedule {
    forks: Vec<(ForkActivation, VmSpec)>,
}

impl ForkSchedule {
    /// Build from an activation list; entries must be in activation order
    /// and start at block 0.
    ///
    /// # Panics
    /// If the list is empty or does not start at block 0.
    #[must_use]
    pub fn new(forks: Vec<(ForkActivation, VmSpec)>) -> Self {
        assert!(
            matches!(forks.first(), Some((ForkActivation::Block(0), _))),
            "a fork schedule must begin at block 0"
        );
        Self { forks }
    }

    /// A chain running one rule set from genesis on.
    #[must_use]
    pub fn single(spec: VmSpec) -> Self {
        Self::new(vec![(ForkActivation::Block(0), spec)])
    }

    /// The rule set for a block at `number`/`timestamp`.
    #[must_use]
    pub fn spec_at(&self, number: u64, timestamp: u64) -> &VmSpec {
        self.forks
            .iter()
            .rev()
            .find(|(activation, _)| activation.is_active(number, timestamp))
            .map(|(_, spec)| spec)
            .unwrap_or(&self.forks[0].1)
    }

    /// The Ethereum mainnet schedule. Paris activated by terminal total
    /// difficulty on the real network; its block number stands in here.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::new(vec![
            (ForkActivation::Block(0), VmSpec::frontier()),
            (ForkActivation::Block(1_150_000), VmSpec::homestead()),
            (ForkActivation::Block(2_463_000), VmSpec::tangerine_whistle()),
            (ForkActivation::Block(2_675_000), VmSpec::spurious_dragon()),
            (ForkActivation::Block(4_370_000), VmSpec::byzantium()),
            (ForkActivation::Block(7_280_000), VmSpec::petersburg()),
            (ForkActivation::Block(9_069_000), VmSpec::istanbul()),
            (ForkActivation::Block(9_200_000), VmSpec::muir_glacier()),
            (ForkActivation::Block(12_244_000), VmSpec::berlin()),
            (ForkActivation::Block(12_965_000), VmSpec::london()),
            (ForkActivation::Block(13_773_000), VmSpec::arrow_glacier()),
            (ForkActivation::Block(15_050_000), VmSpec::gray_glacier()),
            (ForkActivation::Block(15_537_394), VmSpec::paris()),
            (ForkActivation::Timestamp(1_681_338_455), VmSpec::shanghai()),
            (ForkActivation::Timestamp(1_710_338_135), VmSpec::cancun()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_dispatch() {
        let schedule = ForkSchedule::mainnet();
        assert_eq!(schedule.spec_at(0, 0).name, "Frontier");
        assert_eq!(schedule.spec_at(1_149_999, 0).name, "Frontier");
        assert_eq!(schedule.spec_at(1_150_000, 0).name, "Homestead");
        assert_eq!(schedule.spec_at(4_370_000, 0).name, "Byzantium");
        assert_eq!(schedule.spec_at(12_965_000, 0).name, "London");
        assert_eq!(schedule.spec_at(15_537_394, 0).name, "Paris");
        // Timestamp-keyed forks.
        assert_eq!(
            schedule.spec_at(17_000_000, 1_681_338_455).name,
            "Shanghai"
        );
        assert_eq!(schedule.spec_at(19_500_000, 1_710_338_135).name, "Cancun");
    }

    #[test]
    fn fork_ladder_properties() {
        assert!(VmSpec::frontier().receipts_carry_state_root);
        assert!(!VmSpec::byzantium().receipts_carry_state_root);
        assert_eq!(VmSpec::byzantium().block_reward, REWARD_BYZANTIUM);
        assert_eq!(VmSpec::paris().block_reward, U256::zero());
        assert_eq!(VmSpec::paris().difficulty, DifficultyRule::Zero);
        assert_eq!(VmSpec::cancun().max_tx_type, 3);
        assert_eq!(VmSpec::london().bomb_delay, 9_700_000);
    }
}
