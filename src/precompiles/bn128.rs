use super::{make_address, out_of_gas_check, Byzantium, HardFork, Istanbul, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use core::marker::PhantomData;
use primitive_types::H160;
use std::borrow::Cow;

const BYZANTIUM_ADD: u64 = 500;
const BYZANTIUM_MUL: u64 = 40_000;
const BYZANTIUM_PAIR_PER_POINT: u64 = 80_000;
const BYZANTIUM_PAIR_BASE: u64 = 100_000;
const ISTANBUL_ADD: u64 = 150;
const ISTANBUL_MUL: u64 = 6_000;
const ISTANBUL_PAIR_PER_POINT: u64 = 34_000;
const ISTANBUL_PAIR_BASE: u64 = 45_000;

const ADD_INPUT_LEN: usize = 128;
const MUL_INPUT_LEN: usize = 128;
const PAIR_ELEMENT_LEN: usize = 192;

/// Read an alt-bn128 G1 point from 64 input bytes at `pos`.
fn read_point(input: &[u8], pos: usize) -> Result<bn::G1, ExitError> {
    use bn::{AffineG1, Fq, Group, G1};

    let mut px_buf = [0u8; 64];
    px_buf[32..64].copy_from_slice(&input[pos..(pos + 32)]);
    let px = Fq::interpret(&px_buf);

    let mut py_buf = [0u8; 64];
    py_buf[32..64].copy_from_slice(&input[(pos + 32)..(pos + 64)]);
    let py = Fq::interpret(&py_buf);

    Ok(if px == Fq::zero() && py == Fq::zero() {
        G1::zero()
    } else {
        AffineG1::new(px, py)
            .map_err(|_| ExitError::Other(Cow::from("bn128: point not on curve")))?
            .into()
    })
}

/// The `0x06` alt-bn128 addition precompile.
pub struct Bn128Add<HF: HardFork>(PhantomData<HF>);

impl<HF: HardFork> Bn128Add<HF> {
    pub const ADDRESS: H160 = make_address(6);

    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    fn run_inner(input: &[u8]) -> Result<Vec<u8>, ExitError> {
        use bn::AffineG1;

        let mut input = input.to_vec();
        input.resize(ADD_INPUT_LEN, 0);

        let p1 = read_point(&input, 0)?;
        let p2 = read_point(&input, 64)?;

        let mut output = [0u8; 64];
        if let Some(sum) = AffineG1::from_jacobian(p1 + p2) {
            sum.x().into_u256().to_big_endian(&mut output[0..32]).ok();
            sum.y().into_u256().to_big_endian(&mut output[32..64]).ok();
        }

        Ok(output.to_vec())
    }

    fn run_with_cost(
        input: &[u8],
        cost: u64,
        target_gas: Option<u64>,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        out_of_gas_check(cost, target_gas)?;
        let output = Self::run_inner(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

impl Precompile for Bn128Add<Byzantium> {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(BYZANTIUM_ADD)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        Self::run_with_cost(input, BYZANTIUM_ADD, target_gas)
    }
}

impl Precompile for Bn128Add<Istanbul> {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(ISTANBUL_ADD)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        Self::run_with_cost(input, ISTANBUL_ADD, target_gas)
    }
}

/// The `0x07` alt-bn128 scalar multiplication precompile.
pub struct Bn128Mul<HF: HardFork>(PhantomData<HF>);

impl<HF: HardFork> Bn128Mul<HF> {
    pub const ADDRESS: H160 = make_address(7);

    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    fn run_inner(input: &[u8]) -> Result<Vec<u8>, ExitError> {
        use bn::AffineG1;

        let mut input = input.to_vec();
        input.resize(MUL_INPUT_LEN, 0);

        let p = read_point(&input, 0)?;
        let mut fr_buf = [0u8; 64];
        fr_buf[32..64].copy_from_slice(&input[64..96]);
        let fr = bn::Fr::interpret(&fr_buf);

        let mut output = [0u8; 64];
        if let Some(mul) = AffineG1::from_jacobian(p * fr) {
            mul.x().into_u256().to_big_endian(&mut output[0..32]).ok();
            mul.y().into_u256().to_big_endian(&mut output[32..64]).ok();
        }

        Ok(output.to_vec())
    }

    fn run_with_cost(
        input: &[u8],
        cost: u64,
        target_gas: Option<u64>,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        out_of_gas_check(cost, target_gas)?;
        let output = Self::run_inner(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

impl Precompile for Bn128Mul<Byzantium> {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(BYZANTIUM_MUL)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        Self::run_with_cost(input, BYZANTIUM_MUL, target_gas)
    }
}

impl Precompile for Bn128Mul<Istanbul> {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(ISTANBUL_MUL)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        Self::run_with_cost(input, ISTANBUL_MUL, target_gas)
    }
}

/// The `0x08` alt-bn128 pairing-check precompile.
pub struct Bn128Pair<HF: HardFork>(PhantomData<HF>);

impl<HF: HardFork> Bn128Pair<HF> {
    pub const ADDRESS: H160 = make_address(8);

    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    #[allow(clippy::too_many_lines)]
    fn run_inner(input: &[u8]) -> Result<Vec<u8>, ExitError> {
        use bn::{arith::U256, AffineG1, AffineG2, Fq, Fq2, Group, Gt, G1, G2};

        if input.len() % PAIR_ELEMENT_LEN != 0 {
            return Err(ExitError::Other(Cow::from("bn128: invalid input length")));
        }

        let output = if input.is_empty() {
            U256::one()
        } else {
            let elements = input.len() / PAIR_ELEMENT_LEN;
            let mut vals = Vec::with_capacity(elements);

            for idx in 0..elements {
                let base = idx * PAIR_ELEMENT_LEN;
                let mut buf = [0u8; 64];

                buf[32..64].copy_from_slice(&input[base..(base + 32)]);
                let ax = Fq::interpret(&buf);
                buf[32..64].copy_from_slice(&input[(base + 32)..(base + 64)]);
                let ay = Fq::interpret(&buf);
                buf[32..64].copy_from_slice(&input[(base + 64)..(base + 96)]);
                let bay = Fq::interpret(&buf);
                buf[32..64].copy_from_slice(&input[(base + 96)..(base + 128)]);
                let bax = Fq::interpret(&buf);
                buf[32..64].copy_from_slice(&input[(base + 128)..(base + 160)]);
                let bby = Fq::interpret(&buf);
                buf[32..64].copy_from_slice(&input[(base + 160)..(base + 192)]);
                let bbx = Fq::interpret(&buf);

                let a = if ax.is_zero() && ay.is_zero() {
                    G1::zero()
                } else {
                    G1::from(AffineG1::new(ax, ay).map_err(|_| {
                        ExitError::Other(Cow::from("bn128: a not on curve"))
                    })?)
                };
                let b = {
                    let ba = Fq2::new(bax, bay);
                    let bb = Fq2::new(bbx, bby);

                    if ba.is_zero() && bb.is_zero() {
                        G2::zero()
                    } else {
                        G2::from(AffineG2::new(ba, bb).map_err(|_| {
                            ExitError::Other(Cow::from("bn128: b not on curve"))
                        })?)
                    }
                };
                vals.push((a, b));
            }

            let mul = vals
                .into_iter()
                .fold(Gt::one(), |s, (a, b)| s * bn::pairing(a, b));

            if mul == Gt::one() {
                U256::one()
            } else {
                U256::zero()
            }
        };

        let mut output_buf = [0u8; 32];
        output.to_big_endian(&mut output_buf).ok();
        Ok(output_buf.to_vec())
    }

    fn pair_gas(input: &[u8], per_point: u64, base: u64) -> u64 {
        per_point * (input.len() / PAIR_ELEMENT_LEN) as u64 + base
    }

    fn run_with_cost(
        input: &[u8],
        cost: u64,
        target_gas: Option<u64>,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        out_of_gas_check(cost, target_gas)?;
        let output = Self::run_inner(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

impl Precompile for Bn128Pair<Byzantium> {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        Ok(Self::pair_gas(
            input,
            BYZANTIUM_PAIR_PER_POINT,
            BYZANTIUM_PAIR_BASE,
        ))
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        let cost = Self::pair_gas(input, BYZANTIUM_PAIR_PER_POINT, BYZANTIUM_PAIR_BASE);
        Self::run_with_cost(input, cost, target_gas)
    }
}

impl Precompile for Bn128Pair<Istanbul> {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        Ok(Self::pair_gas(
            input,
            ISTANBUL_PAIR_PER_POINT,
            ISTANBUL_PAIR_BASE,
        ))
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        let cost = Self::pair_gas(input, ISTANBUL_PAIR_PER_POINT, ISTANBUL_PAIR_BASE);
        Self::run_with_cost(input, cost, target_gas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn new_context() -> Context {
        Context {
            address: H160::default(),
            caller: H160::default(),
            apparent_value: U256::zero(),
        }
    }

    #[test]
    fn add_known_points() {
        let input = hex::decode(
            "18b18acfb4c2c30276db5411368e7185b311dd124691610c5d3b74034e093dc9\
             063c909c4720840cb5134cb9f59fa749755796819658d32efc0d288198f37266\
             07c2b7f58a84bd6145f00c9c2bc0bb1a187f20ff2c92963a88019e7c6a014eed\
             06614e20c147e940f2d70da3f74c9a17df361706a4485c742bd6788478fa17d7",
        )
        .unwrap();
        let expected = hex::decode(
            "2243525c5efd4b9c3d3c45ac0ca3fe4dd85e830a4ce6b65fa1eeaee202839703\
             301d1d33be6da8e509df21cc35964723180eed7532537db9ae5e7d48f195c915",
        )
        .unwrap();

        let res = Bn128Add::<Istanbul>::new()
            .run(&input, Some(150), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn add_identity() {
        // (0, 0) + (0, 0) = (0, 0)
        let res = Bn128Add::<Istanbul>::new()
            .run(&[0u8; 128], Some(150), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, vec![0u8; 64]);
    }

    #[test]
    fn empty_pairing_is_one() {
        let res = Bn128Pair::<Istanbul>::new()
            .run(&[], Some(45_000), &new_context(), false)
            .unwrap()
            .output;
        let mut expected = vec![0u8; 32];
        expected[31] = 1;
        assert_eq!(res, expected);
    }

    #[test]
    fn pairing_rejects_truncated_input() {
        let res = Bn128Pair::<Istanbul>::new().run(&[0u8; 191], Some(100_000), &new_context(), false);
        assert!(res.is_err());
    }
}
