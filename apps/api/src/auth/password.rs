//! Password hashing with scrypt (N=16384, r=16, p=1, dkLen=64) and a random
//! 16-byte salt. Stored format: `hex(salt):hex(key)`.

use anyhow::{anyhow, Result};
use rand::RngCore;
use scrypt::{scrypt, Params};

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 16;
const SCRYPT_P: u32 = 1;
const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let key = derive_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Constant-time verification against a hash produced by `hash_password`.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let (salt_hex, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid password hash format"))?;

    let expected = hex::decode(key_hex).map_err(|e| anyhow!("invalid hex in password hash: {e}"))?;
    let derived = derive_key(password, salt_hex)?;

    Ok(bool::from(subtle::ConstantTimeEq::ct_eq(
        derived.as_slice(),
        expected.as_slice(),
    )))
}

fn derive_key(password: &str, salt_hex: &str) -> Result<Vec<u8>> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| anyhow!("invalid scrypt params: {e}"))?;

    let mut output = vec![0u8; KEY_LEN];
    scrypt(password.as_bytes(), salt_hex.as_bytes(), &params, &mut output)
        .map_err(|e| anyhow!("scrypt failed: {e}"))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.contains(':'));
        assert!(verify_password(&hash, "correct horse battery staple").unwrap());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("secret-one").unwrap();
        assert!(!verify_password(&hash, "secret-two").unwrap());
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("not-a-valid-hash", "pw").is_err());
    }
}
