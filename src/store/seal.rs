use aes_gcm::aead::{Aead, KeyInit, generic_array::GenericArray};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const PBKDF2_ITERATIONS: u32 = 600_000;
const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 12;

/// Seals and unseals account secrets with AES-256-GCM under a
/// passphrase-derived key. Secrets are unsealed only at the moment of
/// submission; everything else in the engine carries the sealed form.
///
/// Sealed format: base64(iv[12] || ciphertext || auth_tag[16]).
#[derive(Clone)]
pub struct Vault {
    key: [u8; KEY_LENGTH],
}

impl Vault {
    pub fn from_passphrase(passphrase: &str, salt_b64: &str) -> Result<Vault> {
        let salt = BASE64.decode(salt_b64).context("decoding vault salt")?;
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut key);
        Ok(Vault { key })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        use rand::Rng;
        let iv_bytes: [u8; IV_LENGTH] = rand::rng().random();
        let nonce = Nonce::from_slice(&iv_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("sealing failed: {e}"))?;

        // aes-gcm appends the auth tag to the ciphertext already
        let mut out = Vec::with_capacity(IV_LENGTH + ciphertext.len());
        out.extend_from_slice(&iv_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn unseal(&self, sealed_b64: &str) -> Result<String> {
        let data = BASE64.decode(sealed_b64).context("decoding sealed secret")?;
        if data.len() < IV_LENGTH + 16 {
            bail!("sealed data too short");
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = Nonce::from_slice(&data[..IV_LENGTH]);

        let plaintext = cipher
            .decrypt(nonce, &data[IV_LENGTH..])
            .map_err(|e| anyhow::anyhow!("unsealing failed: {e}"))?;

        String::from_utf8(plaintext).context("unsealed secret is not valid utf8")
    }
}

pub fn generate_salt() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_round_trip() {
        let vault = Vault::from_passphrase("hunter2", &generate_salt()).unwrap();
        let sealed = vault.seal("0xdeadbeef").unwrap();
        assert_ne!(sealed, "0xdeadbeef");
        assert_eq!(vault.unseal(&sealed).unwrap(), "0xdeadbeef");
    }

    #[test]
    fn wrong_key_fails() {
        let salt = generate_salt();
        let a = Vault::from_passphrase("right", &salt).unwrap();
        let b = Vault::from_passphrase("wrong", &salt).unwrap();
        let sealed = a.seal("secret").unwrap();
        assert!(b.unseal(&sealed).is_err());
    }
}
