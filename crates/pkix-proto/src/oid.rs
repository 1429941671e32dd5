//! Object identifiers used across OCSP, TSP and X.509 handling

/// id-pkix-ocsp-basic
pub const OCSP_BASIC: &str = "1.3.6.1.5.5.7.48.1.1";
/// id-signedData (CMS)
pub const SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
/// id-ct-TSTInfo
pub const TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";

pub const SHA1: &str = "1.3.14.3.2.26";
pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";
pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";
pub const MD5: &str = "1.2.840.113549.2.5";
pub const ED25519: &str = "1.3.101.112";

/// OID to algorithm name. Names follow OpenSSL conventions, so the
/// sha*WithRSAEncryption signature OIDs share their digest's name.
const NAMES: &[(&str, &str)] = &[
    ("1.2.840.10040.4.3", "DSA-SHA1"),
    ("1.2.840.113549.1.1.1", "RSA"),
    ("1.2.840.113549.1.1.4", "RSA-MD5"),
    ("1.2.840.113549.1.1.5", "RSA-SHA1"),
    ("1.2.840.113549.1.1.11", "SHA256"),
    ("1.2.840.113549.1.1.12", "SHA384"),
    ("1.2.840.113549.1.1.13", "SHA512"),
    ("1.2.840.113549.1.1.14", "SHA224"),
    ("1.2.840.10045.2.1", "EC"),
    ("1.2.840.10045.4.3.2", "ECDSA-SHA256"),
    ("1.2.840.10045.4.3.3", "ECDSA-SHA384"),
    (ED25519, "ED25519"),
    (SHA256, "SHA256"),
    (SHA384, "SHA384"),
    (SHA512, "SHA512"),
    (SHA224, "SHA224"),
    (SHA1, "SHA1"),
    (MD5, "MD5"),
];

/// Algorithm name for an OID, if known
pub fn name(oid: &str) -> Option<&'static str> {
    NAMES
        .iter()
        .find(|(candidate, _)| *candidate == oid)
        .map(|(_, name)| *name)
}
