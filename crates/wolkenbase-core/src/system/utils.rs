//! Small numeric helpers

use crate::constants::INV_PHI;

/// Greatest common divisor
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Stride for shuffling a buffer of `n` slots.
///
/// The integer nearest `n / φ` that is coprime to `n`, so that repeated
/// steps visit every slot before returning to the first.
pub fn relprime(n: usize) -> usize {
    if n < 3 {
        return 1;
    }
    let base = (n as f64 * INV_PHI).round() as usize;
    let coprime = |c: usize| c > 0 && c < n && gcd(c as u64, n as u64) == 1;
    for d in 0..n {
        if base >= d && coprime(base - d) {
            return base - d;
        }
        if coprime(base + d) {
            return base + d;
        }
    }
    1
}
