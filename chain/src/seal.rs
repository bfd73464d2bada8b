//! Ethash light verification: per-epoch cache generation and
//! hashimoto-light, enough to check imported proof-of-work seals. Mining
//! (full-dataset generation, nonce search) is a host concern.

pub mod ethash {
    use crate::Header;
    use primitive_types::{H256, U256, U512};
    use sha3::{Digest, Keccak256, Keccak512};
    use std::sync::Mutex;

    pub const EPOCH_LENGTH: u64 = 30_000;
    const HASH_BYTES: usize = 64;
    const MIX_BYTES: u64 = 128;
    const CACHE_BYTES_INIT: u64 = 1 << 24;
    const CACHE_BYTES_GROWTH: u64 = 1 << 17;
    const DATASET_BYTES_INIT: u64 = 1 << 30;
    const DATASET_BYTES_GROWTH: u64 = 1 << 23;
    const CACHE_ROUNDS: usize = 3;
    const ACCESSES: usize = 64;
    const DATASET_PARENTS: u32 = 256;

    const FNV_PRIME: u32 = 0x0100_0193;

    const fn fnv(a: u32, b: u32) -> u32 {
        a.wrapping_mul(FNV_PRIME) ^ b
    }

    fn is_prime(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        if n % 2 == 0 {
            return n == 2;
        }
        let mut i = 3;
        while i * i <= n {
            if n % i == 0 {
                return false;
            }
            i += 2;
        }
        true
    }

    /// Byte size of the light cache for an epoch.
    #[must_use]
    pub fn cache_size(epoch: u64) -> u64 {
        let mut size = CACHE_BYTES_INIT + CACHE_BYTES_GROWTH * epoch - HASH_BYTES as u64;
        while !is_prime(size / HASH_BYTES as u64) {
            size -= 2 * HASH_BYTES as u64;
        }
        size
    }

    /// Byte size of the full dataset for an epoch; hashimoto only needs the
    /// number, not the data.
    #[must_use]
    pub fn dataset_size(epoch: u64) -> u64 {
        let mut size = DATASET_BYTES_INIT + DATASET_BYTES_GROWTH * epoch - MIX_BYTES;
        while !is_prime(size / MIX_BYTES) {
            size -= 2 * MIX_BYTES;
        }
        size
    }

    /// Seed of an epoch: keccak256 iterated over 32 zero bytes.
    #[must_use]
    pub fn seed_hash(epoch: u64) -> H256 {
        let mut seed = [0u8; 32];
        for _ in 0..epoch {
            seed = Keccak256::digest(seed).into();
        }
        H256(seed)
    }

    fn keccak512(data: &[u8]) -> [u8; 64] {
        Keccak512::digest(data).into()
    }

    /// The per-epoch light cache.
    pub struct LightCache {
        epoch: u64,
        data: Vec<u8>,
    }

    impl LightCache {
        /// Generate the cache for `epoch`; tens of megabytes of keccak512,
        /// so callers memoize per epoch.
        #[must_use]
        pub fn new(epoch: u64) -> Self {
            let size = cache_size(epoch) as usize;
            let rows = size / HASH_BYTES;
            let seed = seed_hash(epoch);

            let mut data = vec![0u8; size];
            let mut prev = keccak512(seed.as_bytes());
            data[..HASH_BYTES].copy_from_slice(&prev);
            for i in 1..rows {
                prev = keccak512(&prev);
                data[i * HASH_BYTES..(i + 1) * HASH_BYTES].copy_from_slice(&prev);
            }

            // RANDMEMOHASH rounds.
            for _ in 0..CACHE_ROUNDS {
                for i in 0..rows {
                    let src = (i + rows - 1) % rows;
                    let target = read_u32_le(&data, i * HASH_BYTES) as usize % rows;

                    let mut mixed = [0u8; HASH_BYTES];
                    for k in 0..HASH_BYTES {
                        mixed[k] =
                            data[src * HASH_BYTES + k] ^ data[target * HASH_BYTES + k];
                    }
                    let hashed = keccak512(&mixed);
                    data[i * HASH_BYTES..(i + 1) * HASH_BYTES].copy_from_slice(&hashed);
                }
            }

            Self { epoch, data }
        }

        #[must_use]
        pub const fn epoch(&self) -> u64 {
            self.epoch
        }

        fn rows(&self) -> u32 {
            (self.data.len() / HASH_BYTES) as u32
        }

        fn row(&self, index: u32) -> &[u8] {
            let start = index as usize * HASH_BYTES;
            &self.data[start..start + HASH_BYTES]
        }

        /// Compute one 64-byte full-dataset item from the cache.
        fn dataset_item(&self, index: u32) -> [u8; 64] {
            let rows = self.rows();

            let mut mix = [0u8; HASH_BYTES];
            mix.copy_from_slice(self.row(index % rows));
            let head = read_u32_le(&mix, 0) ^ index;
            mix[0..4].copy_from_slice(&head.to_le_bytes());
            let mut mix = keccak512(&mix);

            for j in 0..DATASET_PARENTS {
                let word = read_u32_le(&mix, (j as usize % 16) * 4);
                let parent = fnv(index ^ j, word) % rows;
                let row = self.row(parent);
                for k in 0..16 {
                    let mixed = fnv(read_u32_le(&mix, k * 4), read_u32_le(row, k * 4));
                    mix[k * 4..k * 4 + 4].copy_from_slice(&mixed.to_le_bytes());
                }
            }

            keccak512(&mix)
        }
    }

    fn read_u32_le(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    /// Hashimoto over the light cache: returns `(mix_digest, result)`.
    #[must_use]
    pub fn hashimoto_light(
        seal_hash: H256,
        nonce: u64,
        full_size: u64,
        cache: &LightCache,
    ) -> (H256, H256) {
        let mut seed_input = [0u8; 40];
        seed_input[..32].copy_from_slice(seal_hash.as_bytes());
        seed_input[32..].copy_from_slice(&nonce.to_le_bytes());
        let seed = keccak512(&seed_input);
        let seed_head = read_u32_le(&seed, 0);

        // 128 bytes of mix, as 32 little-endian words.
        let mut mix = [0u32; 32];
        for (i, word) in mix.iter_mut().enumerate() {
            *word = read_u32_le(&seed, (i % 16) * 4);
        }

        let pages = (full_size / MIX_BYTES) as u32;
        for i in 0..ACCESSES as u32 {
            let p = fnv(i ^ seed_head, mix[i as usize % 32]) % pages;
            let mut newdata = [0u32; 32];
            for j in 0..2u32 {
                let item = cache.dataset_item(2 * p + j);
                for k in 0..16 {
                    newdata[(j as usize) * 16 + k] = read_u32_le(&item, k * 4);
                }
            }
            for k in 0..32 {
                mix[k] = fnv(mix[k], newdata[k]);
            }
        }

        // Compress to 32 bytes.
        let mut digest = [0u8; 32];
        for i in 0..8 {
            let compressed = fnv(
                fnv(fnv(mix[i * 4], mix[i * 4 + 1]), mix[i * 4 + 2]),
                mix[i * 4 + 3],
            );
            digest[i * 4..i * 4 + 4].copy_from_slice(&compressed.to_le_bytes());
        }

        let mut result_input = Vec::with_capacity(96);
        result_input.extend_from_slice(&seed);
        result_input.extend_from_slice(&digest);
        let result: [u8; 32] = Keccak256::digest(&result_input).into();

        (H256(digest), H256(result))
    }

    static CACHE: Mutex<Option<LightCache>> = Mutex::new(None);

    /// Verify a header's proof-of-work seal, generating (and memoizing) the
    /// epoch cache as needed.
    #[must_use]
    pub fn verify(header: &Header) -> bool {
        if header.difficulty.is_zero() {
            return false;
        }

        let epoch = header.number / EPOCH_LENGTH;
        let full_size = dataset_size(epoch);

        let mut slot = CACHE.lock().expect("ethash cache lock poisoned");
        if slot.as_ref().map(LightCache::epoch) != Some(epoch) {
            *slot = Some(LightCache::new(epoch));
        }
        let cache = slot.as_ref().expect("cache just ensured");

        let (mix, result) = hashimoto_light(
            header.seal_hash(),
            header.nonce.as_u64(),
            full_size,
            cache,
        );
        if mix != header.mix_hash {
            return false;
        }

        // result <= 2^256 / difficulty
        let boundary = (U512::one() << 256) / U512::from(header.difficulty);
        U512::from(U256::from_big_endian(result.as_bytes())) <= boundary
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn size_tables_start_at_known_values() {
            assert_eq!(cache_size(0), 16_776_896);
            assert_eq!(cache_size(1), 16_907_456);
            assert_eq!(dataset_size(0), 1_073_739_904);
            assert_eq!(dataset_size(1), 1_082_130_304);
        }

        #[test]
        fn seed_hash_chains() {
            assert_eq!(seed_hash(0), H256::zero());
            let expected: [u8; 32] = Keccak256::digest([0u8; 32]).into();
            assert_eq!(seed_hash(1), H256(expected));
            let expected: [u8; 32] = Keccak256::digest(expected).into();
            assert_eq!(seed_hash(2), H256(expected));
        }

        // The block-22 vector from the ethash reference tests. Generating
        // the epoch-0 cache takes a while, so this runs only on demand.
        #[test]
        #[ignore]
        fn hashimoto_light_known_vector() {
            let seal_hash = H256::from_slice(
                &hex::decode("372eca2454ead349c3df0ab5d00b0b706b23e49d469387db91811cee0358fc6d")
                    .unwrap(),
            );
            let nonce = 0x495732e0ed7a801c_u64;
            let cache = LightCache::new(0);
            let (mix, result) = hashimoto_light(seal_hash, nonce, dataset_size(0), &cache);
            assert_eq!(
                mix,
                H256::from_slice(
                    &hex::decode(
                        "2f74cdeb198af0b9abe65d22d372e22fb2d474371774a9583c1cc427a07939f5"
                    )
                    .unwrap()
                )
            );
            assert_eq!(
                result,
                H256::from_slice(
                    &hex::decode(
                        "00000b184f1fdd88bfd94c86c39e65db0c36144d5e43f745f722196e730cb614"
                    )
                    .unwrap()
                )
            );
        }
    }
}
