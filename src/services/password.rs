//! Salted PBKDF2-HMAC-SHA256 password digests.
//!
//! Salt and digest are stored base64 encoded next to each other on the user
//! row. Derivation is deliberately slow, so callers on the async runtime
//! should go through `spawn_blocking`.

use std::num::NonZeroU32;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use ring::pbkdf2;
use subtle::ConstantTimeEq;

pub const PASSWORD_PBKDF2_ROUNDS: u32 = 210_000;

const SALT_LENGTH: usize = 16;
const DIGEST_LENGTH: usize = 32;

const ROUNDS: NonZeroU32 = match NonZeroU32::new(PASSWORD_PBKDF2_ROUNDS) {
    Some(rounds) => rounds,
    None => panic!("PBKDF2 rounds must be non-zero"),
};

/// Base64 salt and digest of one password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecord {
    pub salt: String,
    pub digest: String,
}

fn derive_digest(salt: &[u8], password: &str) -> [u8; DIGEST_LENGTH] {
    let mut digest = [0u8; DIGEST_LENGTH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        ROUNDS,
        salt,
        password.as_bytes(),
        &mut digest,
    );
    digest
}

impl PasswordRecord {
    /// Derives a record for `password` under a fresh random salt
    pub fn derive(password: &str) -> Self {
        let salt: [u8; SALT_LENGTH] = rand::rng().random();
        let digest = derive_digest(&salt, password);
        Self {
            salt: BASE64.encode(salt),
            digest: BASE64.encode(digest),
        }
    }

    /// Well-formed record no password matches in practice. Verifying against it
    /// costs the same as a real check.
    pub fn placeholder() -> Self {
        Self {
            salt: BASE64.encode([0u8; SALT_LENGTH]),
            digest: BASE64.encode([0u8; DIGEST_LENGTH]),
        }
    }

    /// True only if `password` derives to the stored digest under the stored salt.
    /// A record that does not decode never verifies.
    pub fn verify(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (BASE64.decode(&self.salt), BASE64.decode(&self.digest))
        else {
            return false;
        };
        if expected.len() != DIGEST_LENGTH {
            return false;
        }

        let actual = derive_digest(&salt, password);
        actual[..].ct_eq(&expected[..]).into()
    }
}
