use rand_core::impls::fill_bytes_via_next;
use rand_core::le::read_u32_into;
use rand_core::{Error, RngCore, SeedableRng};

const STATE_WORDS: usize = 32;
const M1: usize = 3;
const M2: usize = 24;
const M3: usize = 10;

/// The WELL1024a pseudorandom number generator.
///
/// A generator from the Well Equidistributed Long-period Linear family with
/// a period of 2^1024 - 1. Used as the quantizer selector: the encoder and
/// decoder step identically seeded instances in lockstep, so the low/high
/// quantizer choices agree on both sides without any side channel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Well1024a {
    state: [u32; STATE_WORDS],
    index: usize,
}

impl Well1024a {
    /// Returns the next variate as a float in `[0, 1]`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / u32::MAX as f64
    }
}

impl RngCore for Well1024a {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        let i = self.index;
        let z0 = self.state[(i + 31) & 31];
        let vm1 = self.state[(i + M1) & 31];
        let vm2 = self.state[(i + M2) & 31];
        let vm3 = self.state[(i + M3) & 31];

        let z1 = self.state[i] ^ vm1 ^ (vm1 >> 8);
        let z2 = (vm2 ^ (vm2 << 19)) ^ (vm3 ^ (vm3 << 14));
        self.state[i] = z1 ^ z2;
        self.state[(i + 31) & 31] =
            (z0 ^ (z0 << 11)) ^ (z1 ^ (z1 << 7)) ^ (z2 ^ (z2 << 13));

        self.index = (i + 31) & 31;
        self.state[self.index]
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        fill_bytes_via_next(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// A 1024-bit seed for [`Well1024a`].
#[derive(Clone)]
pub struct Seed1024(pub [u8; 128]);

impl Default for Seed1024 {
    fn default() -> Self {
        Self([0; 128])
    }
}

impl AsRef<[u8]> for Seed1024 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Seed1024 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl SeedableRng for Well1024a {
    type Seed = Seed1024;

    fn from_seed(seed: Self::Seed) -> Self {
        let mut state = [0_u32; STATE_WORDS];
        read_u32_into(&seed.0, &mut state);
        // The all-zero state is a fixed point of the recurrence
        if state.iter().all(|&word| word == 0) {
            state[0] = 1;
        }

        Self { state, index: 0 }
    }
}
