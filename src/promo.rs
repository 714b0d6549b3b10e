//! Promo code generation.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_CODE_LEN: usize = 5;

/// Generates a code of `len` characters drawn uniformly and independently
/// from `A-Z0-9`. Codes are not guaranteed unique across calls; callers
/// needing uniqueness must de-duplicate themselves.
pub fn generate_promo_code_with<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// `generate_promo_code_with` seeded from the thread RNG.
pub fn generate_promo_code(len: usize) -> String {
    generate_promo_code_with(len, &mut rand::thread_rng())
}

pub fn generate_promo_code_default() -> String {
    generate_promo_code(DEFAULT_CODE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn code_has_requested_length_and_alphabet() {
        for len in [1, 5, 12] {
            let code = generate_promo_code(len);
            assert_eq!(code.len(), len);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn default_length_is_five() {
        assert_eq!(generate_promo_code_default().len(), DEFAULT_CODE_LEN);
    }

    #[test]
    fn successive_codes_differ_with_overwhelming_probability() {
        // 10 chars over a 36-symbol alphabet; a collision here means the
        // generator is broken, not unlucky.
        let a = generate_promo_code(10);
        let b = generate_promo_code(10);
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let a = generate_promo_code_with(8, &mut StdRng::seed_from_u64(1));
        let b = generate_promo_code_with(8, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }
}
