use super::{make_address, out_of_gas_check, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use primitive_types::H160;
use std::borrow::Cow;

const INPUT_LEN: usize = 213;

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

const IV: [u64; 8] = [
    0x6a09_e667_f3bc_c908,
    0xbb67_ae85_84ca_a73b,
    0x3c6e_f372_fe94_f82b,
    0xa54f_f53a_5f1d_36f1,
    0x510e_527f_ade6_82d1,
    0x9b05_688c_2b3e_6c1f,
    0x1f83_d9ab_fb41_bd6b,
    0x5be0_cd19_137e_2179,
];

#[allow(clippy::many_single_char_names)]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// The BLAKE2b compression function F, per RFC 7693 with a configurable
/// round count (EIP-152).
fn compress(rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: &[u64; 2], finished: bool) {
    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&IV);

    v[12] ^= t[0];
    v[13] ^= t[1];
    if finished {
        v[14] = !v[14];
    }

    for round in 0..rounds as usize {
        let s = &SIGMA[round % 10];
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

/// The `0x09` BLAKE2b F precompile (EIP-152).
pub struct Blake2F;

impl Blake2F {
    pub const ADDRESS: H160 = make_address(9);
}

impl Precompile for Blake2F {
    /// One gas per round.
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        if input.len() != INPUT_LEN {
            return Err(ExitError::Other(Cow::from("blake2f: invalid input length")));
        }
        let mut rounds = [0u8; 4];
        rounds.copy_from_slice(&input[0..4]);
        Ok(u64::from(u32::from_be_bytes(rounds)))
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        let cost = Self::required_gas(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        out_of_gas_check(cost, target_gas)?;

        let mut rounds_bytes = [0u8; 4];
        rounds_bytes.copy_from_slice(&input[0..4]);
        let rounds = u32::from_be_bytes(rounds_bytes);

        let mut h = [0u64; 8];
        for (i, word) in h.iter_mut().enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[4 + i * 8..12 + i * 8]);
            *word = u64::from_le_bytes(bytes);
        }

        let mut m = [0u64; 16];
        for (i, word) in m.iter_mut().enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[68 + i * 8..76 + i * 8]);
            *word = u64::from_le_bytes(bytes);
        }

        let mut t = [0u64; 2];
        for (i, word) in t.iter_mut().enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[196 + i * 8..204 + i * 8]);
            *word = u64::from_le_bytes(bytes);
        }

        let finished = match input[212] {
            0 => false,
            1 => true,
            _ => {
                return Err(PrecompileFailure::Error {
                    exit_status: ExitError::Other(Cow::from("blake2f: invalid final flag")),
                })
            }
        };

        compress(rounds, &mut h, &m, &t, finished);

        let mut output = Vec::with_capacity(64);
        for word in &h {
            output.extend_from_slice(&word.to_le_bytes());
        }
        Ok(PrecompileOutput::without_logs(cost, output))
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

    // Test vectors 4-7 of EIP-152.
    #[test]
    fn eip_152_vector_4() {
        let input = hex::decode(
            "0000000048c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5d182e6ad7f520e511f6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b61626300000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000300000000000000000000000000000001",
        )
        .unwrap();
        let expected = hex::decode(
            "08c9bcf367e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5d282e6ad7f520e511f6c3e2b8c68059b9442be0454267ce079217e1319cde05b",
        )
        .unwrap();
        let res = Blake2F
            .run(&input, Some(0), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn eip_152_vector_5() {
        let input = hex::decode(
            "0000000c48c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5d182e6ad7f520e511f6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b61626300000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000300000000000000000000000000000001",
        )
        .unwrap();
        let expected = hex::decode(
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d17d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923",
        )
        .unwrap();
        let res = Blake2F
            .run(&input, Some(12), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn rejects_short_input() {
        let res = Blake2F.run(&[0u8; 212], Some(12), &new_context(), false);
        assert!(res.is_err());
    }
}
