//! AES-256-GCM string encryption for at-rest secrets (OAuth tokens).
//!
//! Adapted from the same construction used for encrypted account
//! credentials: a random salt derives a key via PBKDF2, a random nonce
//! is generated per call, and `salt || nonce || ciphertext` is
//! base64url-encoded as the stored value.

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, SealingKey, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

use crate::modules::error::{code::ErrorCode, AppResult};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;

struct SingleNonceSequence(Option<[u8; 12]>);

impl NonceSequence for SingleNonceSequence {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        let bytes = self.0.take().ok_or(ring::error::Unspecified)?;
        Ok(Nonce::assume_unique_for_key(bytes))
    }
}

pub fn encrypt_string(plaintext: &str) -> AppResult<String> {
    internal_encrypt(&SETTINGS.curator_encrypt_password, plaintext)
        .map_err(|_| raise_error!("failed to encrypt token".into(), ErrorCode::InternalError))
}

pub fn decrypt_string(data: &str) -> AppResult<String> {
    internal_decrypt(&SETTINGS.curator_encrypt_password, data).map_err(|_| {
        raise_error!(
            "decryption failed: wrong key or corrupted data".into(),
            ErrorCode::InternalError
        )
    })
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(100_000).unwrap(),
        salt,
        password.as_bytes(),
        &mut key,
    );
    key
}

fn internal_encrypt(password: &str, plaintext: &str) -> Result<String, ring::error::Unspecified> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; 16];
    rng.fill(&mut salt)?;
    let key = derive_key(password, &salt);
    let mut nonce_bytes = [0u8; 12];
    rng.fill(&mut nonce_bytes)?;

    let unbound = UnboundKey::new(&AES_256_GCM, &key)?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonceSequence(Some(nonce_bytes)));
    let mut in_out = plaintext.as_bytes().to_vec();
    sealing_key.seal_in_place_append_tag(Aad::empty(), &mut in_out)?;

    let mut out = Vec::with_capacity(16 + 12 + in_out.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(out))
}

fn internal_decrypt(password: &str, data: &str) -> Result<String, ring::error::Unspecified> {
    let raw = general_purpose::URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| ring::error::Unspecified)?;
    if raw.len() < 16 + 12 {
        return Err(ring::error::Unspecified);
    }
    let salt = &raw[0..16];
    let nonce_bytes: [u8; 12] = raw[16..28].try_into().map_err(|_| ring::error::Unspecified)?;
    let ciphertext = &raw[28..];
    let key = derive_key(password, salt);

    let unbound = UnboundKey::new(&AES_256_GCM, &key)?;
    let mut opening_key = ring::aead::OpeningKey::new(unbound, SingleNonceSequence(Some(nonce_bytes)));
    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key.open_in_place(Aad::empty(), &mut in_out)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| ring::error::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let secret = "refresh-token-abc123";
        let encrypted = internal_encrypt("test-password", secret).unwrap();
        let decrypted = internal_decrypt("test-password", &encrypted).unwrap();
        assert_eq!(secret, decrypted);
    }

    #[test]
    fn wrong_password_fails() {
        let encrypted = internal_encrypt("right", "secret").unwrap();
        assert!(internal_decrypt("wrong", &encrypted).is_err());
    }
}
