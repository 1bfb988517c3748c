//! Property-based tests for the verification layer.
//!
//! These tests check properties that must always hold:
//! - Sealed payloads decrypt only with the secret they were sealed for
//! - Any bit flip in ciphertext or tag is detected
//! - Any change to a signed key payload breaks its signature

mod common;

use common::{sign_key, test_keypair};
use keyward_crypto::{
    Algorithm, Certificate, CryptoError, EncryptedData, NONCE_SIZE, decrypt, decrypt_certificate,
    derive_key, encrypt, seal, verify_signed_key,
};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

fn secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z0-9-]{1,64}").unwrap()
}

// =============================================================================
// DECRYPTION PROPERTIES
// =============================================================================

mod decryption_properties {
    use super::*;

    proptest! {
        /// A sealed payload decrypts back to the original with its secret.
        #[test]
        fn sealed_payload_opens_with_secret(
            plaintext in plaintext_strategy(),
            secret in secret_strategy(),
        ) {
            let enc = seal(&secret, &plaintext).unwrap();
            let cert = Certificate::new(Algorithm::Aes256GcmEd25519, enc, "");
            prop_assert_eq!(decrypt_certificate(&cert, &secret).unwrap(), plaintext);
        }

        /// A different secret never decrypts.
        #[test]
        fn other_secret_fails(
            plaintext in plaintext_strategy(),
            secret in secret_strategy(),
            other in secret_strategy(),
        ) {
            prop_assume!(secret != other);
            let enc = seal(&secret, &plaintext).unwrap();
            let cert = Certificate::new(Algorithm::Aes256GcmEd25519, enc, "");
            prop_assert_eq!(decrypt_certificate(&cert, &other), Err(CryptoError::Decryption));
        }

        /// Flipping any bit of ciphertext or tag is detected.
        #[test]
        fn bit_flip_is_detected(
            plaintext in prop::collection::vec(any::<u8>(), 1..512),
            nonce in prop::array::uniform12(any::<u8>()),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = derive_key("secret");
            let encrypted = encrypt(&key, nonce, &plaintext).unwrap();
            let mut tampered: EncryptedData = encrypted.clone();

            let total = tampered.ciphertext.len() + tampered.tag.len();
            let at = index.index(total);
            if at < tampered.ciphertext.len() {
                tampered.ciphertext[at] ^= 1 << bit;
            } else {
                tampered.tag[at - tampered.ciphertext.len()] ^= 1 << bit;
            }

            prop_assert_eq!(decrypt(&key, &tampered), Err(CryptoError::Decryption));
        }

        /// The `enc` encoding preserves every segment.
        #[test]
        fn enc_segments_survive_encoding(
            plaintext in plaintext_strategy(),
            nonce in prop::array::uniform12(any::<u8>()),
        ) {
            let key = derive_key("secret");
            let encrypted = encrypt(&key, nonce, &plaintext).unwrap();
            let parsed = EncryptedData::parse(&encrypted.to_enc()).unwrap();
            prop_assert_eq!(parsed.nonce.len(), NONCE_SIZE);
            prop_assert_eq!(parsed, encrypted);
        }
    }
}

// =============================================================================
// SIGNED KEY PROPERTIES
// =============================================================================

mod signed_key_properties {
    use super::*;

    proptest! {
        /// Signed keys verify and return exactly the signed payload.
        #[test]
        fn signed_payload_is_returned(payload in "[ -~]{0,256}") {
            let (signing_key, public_key) = test_keypair();
            let key = sign_key(&signing_key, &payload);
            prop_assert_eq!(verify_signed_key(&key, &public_key).unwrap(), payload.into_bytes());
        }

        /// Swapping in a different payload under the same signature fails.
        #[test]
        fn payload_swap_is_rejected(a in "[a-z]{1,64}", b in "[a-z]{1,64}") {
            prop_assume!(a != b);
            let (signing_key, public_key) = test_keypair();
            let key_a = sign_key(&signing_key, &a);
            let key_b = sign_key(&signing_key, &b);

            let (payload_b, _) = key_b.split_once('.').unwrap();
            let (_, sig_a) = key_a.split_once('.').unwrap();
            let forged = format!("{payload_b}.{sig_a}");

            prop_assert_eq!(verify_signed_key(&forged, &public_key), Err(CryptoError::NotGenuine));
        }
    }
}
