//! Digest and signature primitives
//!
//! Digests are selected by OID through [`crate::oid::name`]. Signature
//! verification goes through `ring`; algorithms `ring` cannot verify
//! (DSA, MD5 and SHA-224 based RSA) are reported as unsupported.

use md5_digest::Md5;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::MessageError;
use crate::oid;

/// Hash `data` with the digest named by `algorithm_oid`.
///
/// Signature OIDs are accepted where their name identifies the digest
/// unambiguously (`RSA-SHA1`, `RSA-MD5`, `sha*WithRSAEncryption`).
pub fn digest(algorithm_oid: &str, data: &[u8]) -> Result<Vec<u8>, MessageError> {
    let name = oid::name(algorithm_oid)
        .ok_or_else(|| MessageError::unimplemented(format!("digest {}", algorithm_oid)))?;

    let out = match name {
        "SHA1" | "RSA-SHA1" => Sha1::digest(data).to_vec(),
        "SHA224" => Sha224::digest(data).to_vec(),
        "SHA256" => Sha256::digest(data).to_vec(),
        "SHA384" => Sha384::digest(data).to_vec(),
        "SHA512" => Sha512::digest(data).to_vec(),
        "MD5" | "RSA-MD5" => Md5::digest(data).to_vec(),
        other => return Err(MessageError::unimplemented(format!("digest {}", other))),
    };
    Ok(out)
}

/// Lowercase hex of [`digest`]
pub fn digest_hex(algorithm_oid: &str, data: &[u8]) -> Result<String, MessageError> {
    digest(algorithm_oid, data).map(hex::encode)
}

/// Check that a verification primitive exists for `algorithm` (an
/// algorithm name from the OID table).
pub fn ensure_supported(algorithm: &str) -> Result<(), MessageError> {
    match algorithm {
        "RSA-SHA1" | "SHA256" | "SHA384" | "SHA512" | "ECDSA-SHA256" | "ECDSA-SHA384"
        | "ED25519" => Ok(()),
        other => Err(MessageError::unsupported_algorithm(other)),
    }
}

/// Verify `sig` over `data` with a raw subject public key (the BIT STRING
/// payload of a SubjectPublicKeyInfo).
///
/// Returns `Ok(false)` for a signature that does not verify.
pub fn verify(
    algorithm: &str,
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
) -> Result<bool, MessageError> {
    let primitive: &'static dyn VerificationAlgorithm = match algorithm {
        "RSA-SHA1" => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        "SHA256" => &signature::RSA_PKCS1_2048_8192_SHA256,
        "SHA384" => &signature::RSA_PKCS1_2048_8192_SHA384,
        "SHA512" => &signature::RSA_PKCS1_2048_8192_SHA512,
        // Curve follows from the uncompressed point length
        "ECDSA-SHA256" if public_key.len() == 97 => &signature::ECDSA_P384_SHA256_ASN1,
        "ECDSA-SHA256" => &signature::ECDSA_P256_SHA256_ASN1,
        "ECDSA-SHA384" if public_key.len() == 65 => &signature::ECDSA_P256_SHA384_ASN1,
        "ECDSA-SHA384" => &signature::ECDSA_P384_SHA384_ASN1,
        "ED25519" => &signature::ED25519,
        other => return Err(MessageError::unsupported_algorithm(other)),
    };

    Ok(UnparsedPublicKey::new(primitive, public_key)
        .verify(data, sig)
        .is_ok())
}
