//! Encrypted history collaborator (component Q, §6.8). Storage format is
//! exactly the declared `{salt, nonce, ciphertext}` JSON envelope; the
//! plaintext is a JSON array of every recorded payload, encrypted under a
//! PBKDF2-derived key.
//!
//! Grounded on the original's `client/history.py::EncryptedHistory`: load
//! failures fall back to a blank history rather than propagating, and
//! `append` failures are swallowed by the caller (the receive loop), never
//! by this module itself.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmdchat_core::crypto::{derive_key_from_passphrase, generate_salt, AeadCipher};
use serde_json::Value;

pub struct EncryptedHistory {
    path: PathBuf,
    passphrase: String,
    salt: Option<Vec<u8>>,
    messages: Vec<Value>,
}

impl EncryptedHistory {
    pub fn open(path: PathBuf, passphrase: String) -> Self {
        let mut history = Self {
            path,
            passphrase,
            salt: None,
            messages: Vec::new(),
        };
        history.load();
        history
    }

    fn load(&mut self) {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return;
        };
        if let Some((salt, messages)) = Self::try_decode(&raw, &self.passphrase) {
            self.salt = Some(salt);
            self.messages = messages;
        }
    }

    fn try_decode(raw: &str, passphrase: &str) -> Option<(Vec<u8>, Vec<Value>)> {
        let envelope: Value = serde_json::from_str(raw).ok()?;
        let salt = BASE64.decode(envelope.get("salt")?.as_str()?).ok()?;
        let nonce = BASE64.decode(envelope.get("nonce")?.as_str()?).ok()?;
        let ciphertext = BASE64.decode(envelope.get("ciphertext")?.as_str()?).ok()?;
        let key = derive_key_from_passphrase(passphrase, &salt).ok()?;
        let cipher = AeadCipher::from_bytes(*key);
        let plaintext = cipher.decrypt(&nonce, &ciphertext).ok()?;
        let messages: Vec<Value> = serde_json::from_slice(&plaintext).ok()?;
        Some((salt, messages))
    }

    /// Appends `payload` and persists immediately. Any failure is reported
    /// to the caller so it can be logged and ignored; never panics.
    pub fn append(&mut self, payload: Value) -> anyhow::Result<()> {
        self.messages.push(payload);
        self.persist()
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        let salt = match &self.salt {
            Some(salt) => salt.clone(),
            None => {
                let generated = generate_salt().to_vec();
                self.salt = Some(generated.clone());
                generated
            }
        };
        let key = derive_key_from_passphrase(&self.passphrase, &salt)?;
        let cipher = AeadCipher::from_bytes(*key);
        let data = serde_json::to_vec(&self.messages)?;
        let (nonce, ciphertext) = cipher.encrypt(&data)?;

        let envelope = serde_json::json!({
            "salt": BASE64.encode(&salt),
            "nonce": BASE64.encode(nonce),
            "ciphertext": BASE64.encode(ciphertext),
        });

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&envelope)?)?;
        Ok(())
    }
}
