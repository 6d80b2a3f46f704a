use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("system randomness unavailable")]
pub struct RngError;

// Randomness provider for deterministic testing.
pub trait Rng: Send + Sync {
    fn fill(&self, bytes: &mut [u8]) -> Result<(), RngError>;
}

pub struct SystemRng;

impl Rng for SystemRng {
    fn fill(&self, bytes: &mut [u8]) -> Result<(), RngError> {
        SystemRandom::new().fill(bytes).map_err(|_| RngError)
    }
}

/// Uniform draw in `[lo, hi]` via rejection sampling on the u32 space.
pub fn uniform_in(rng: &dyn Rng, lo: u16, hi: u16) -> Result<u16, RngError> {
    debug_assert!(lo <= hi);
    let n = u32::from(hi - lo) + 1;
    let zone = (u32::MAX / n) * n;
    loop {
        let mut b = [0u8; 4];
        rng.fill(&mut b)?;
        let x = u32::from_le_bytes(b);
        if x < zone {
            return Ok(lo + (x % n) as u16);
        }
    }
}
