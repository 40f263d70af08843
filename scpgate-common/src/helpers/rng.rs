use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

pub const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn get_crypto_rng() -> ChaCha20Rng {
    ChaCha20Rng::from_entropy()
}

/// Draws `length` characters uniformly from `charset`.
pub fn random_string(charset: &[u8], length: usize) -> String {
    let mut rng = get_crypto_rng();
    (0..length)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string() {
        let username = random_string(LOWERCASE, 8);
        assert_eq!(username.len(), 8);
        assert!(username.bytes().all(|c| c.is_ascii_lowercase()));

        let password = random_string(ALPHANUMERIC, 12);
        assert_eq!(password.len(), 12);
        assert!(password.bytes().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, random_string(ALPHANUMERIC, 12));
    }
}
