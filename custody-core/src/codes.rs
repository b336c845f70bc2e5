//! Voucher code generation and checksum
//!
//! Codes are `FS-XXXX-YYYY`: two groups of four characters drawn from a
//! 32-character alphabet that excludes `0`/`O` and `1`/`I`. The checksum is a
//! keyed BLAKE3 MAC of the canonical code, truncated to eight base-36
//! characters. Verifying it requires the configured secret, so a checksum
//! cannot be produced for a guessed code without custody of that secret.

use rand::Rng;

/// Code prefix for field-issued vouchers
pub const CODE_PREFIX: &str = "FS";

/// Characters allowed in code groups (no 0/O, no 1/I)
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Characters per code group
const GROUP_LEN: usize = 4;

/// Checksum length in base-36 characters
const CHECKSUM_LEN: usize = 8;

/// Base-36 digit set for checksum rendering
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Key derivation context (must never change; rotating it invalidates every
/// issued checksum)
const KEY_CONTEXT: &str = "fieldvault-rail v1 voucher code checksum";

/// Draw a random code in canonical `FS-XXXX-YYYY` form
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    let mut body = [0u8; GROUP_LEN * 2];
    for slot in body.iter_mut() {
        *slot = CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())];
    }
    // body is drawn from CODE_ALPHABET, always valid UTF-8
    let body = std::str::from_utf8(&body).unwrap_or_default();
    format!(
        "{}-{}-{}",
        CODE_PREFIX,
        &body[..GROUP_LEN],
        &body[GROUP_LEN..]
    )
}

/// Normalize operator input into canonical code form
///
/// Accepts lowercase, stray whitespace, and missing dashes. Returns the
/// canonical `FS-XXXX-YYYY` rendering, or the cleaned input unchanged when it
/// does not look like a code at all (lookup will then miss).
pub fn normalize_code(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() == CODE_PREFIX.len() + GROUP_LEN * 2 && cleaned.starts_with(CODE_PREFIX) {
        let body = &cleaned[CODE_PREFIX.len()..];
        format!(
            "{}-{}-{}",
            CODE_PREFIX,
            &body[..GROUP_LEN],
            &body[GROUP_LEN..]
        )
    } else {
        cleaned
    }
}

/// Whether a string is a canonical code
pub fn is_well_formed(code: &str) -> bool {
    let mut parts = code.split('-');
    let prefix = parts.next();
    let first = parts.next();
    let second = parts.next();
    if parts.next().is_some() {
        return false;
    }
    match (prefix, first, second) {
        (Some(p), Some(a), Some(b)) => {
            p == CODE_PREFIX
                && a.len() == GROUP_LEN
                && b.len() == GROUP_LEN
                && a.bytes().chain(b.bytes()).all(|c| CODE_ALPHABET.contains(&c))
        }
        _ => false,
    }
}

/// Keyed checksum generator/verifier for voucher codes
#[derive(Clone)]
pub struct CodeSigner {
    key: [u8; 32],
}

impl CodeSigner {
    /// Derive the MAC key from the configured secret
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    /// Compute the checksum for a canonical code
    pub fn checksum(&self, code: &str) -> String {
        let mac = blake3::keyed_hash(&self.key, code.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&mac.as_bytes()[..8]);
        let mut n = u64::from_be_bytes(prefix) % 36u64.pow(CHECKSUM_LEN as u32);

        let mut out = [b'0'; CHECKSUM_LEN];
        for slot in out.iter_mut().rev() {
            *slot = BASE36[(n % 36) as usize];
            n /= 36;
        }
        // out is drawn from BASE36, always valid UTF-8
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Verify a presented checksum against a canonical code
    ///
    /// Comparison is case-insensitive and whitespace-tolerant; it recomputes
    /// the MAC rather than trusting any stored value.
    pub fn verify(&self, code: &str, presented: &str) -> bool {
        let presented: String = presented
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        self.checksum(code) == presented
    }
}

impl std::fmt::Debug for CodeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("CodeSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_canonical() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert!(is_well_formed(&code), "bad code: {}", code);
            assert_eq!(code.len(), 12);
        }
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_chars() {
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!CODE_ALPHABET.contains(&c));
        }
        assert_eq!(CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_normalize_accepts_field_input() {
        assert_eq!(normalize_code("fs-abcd-efgh"), "FS-ABCD-EFGH");
        assert_eq!(normalize_code("FSABCDEFGH"), "FS-ABCD-EFGH");
        assert_eq!(normalize_code("  fs abcd efgh \n"), "FS-ABCD-EFGH");
        // Unrecognized shapes pass through cleaned, so lookup misses
        assert_eq!(normalize_code("garbage"), "GARBAGE");
    }

    #[test]
    fn test_checksum_is_deterministic_and_keyed() {
        let signer = CodeSigner::new("secret-a");
        let other = CodeSigner::new("secret-b");

        let sum = signer.checksum("FS-ABCD-EFGH");
        assert_eq!(sum.len(), 8);
        assert!(sum.bytes().all(|c| BASE36.contains(&c)));
        assert_eq!(sum, signer.checksum("FS-ABCD-EFGH"));
        assert_ne!(sum, other.checksum("FS-ABCD-EFGH"));
        assert_ne!(sum, signer.checksum("FS-ABCD-EFGJ"));
    }

    #[test]
    fn test_verify_tolerates_case_and_spacing() {
        let signer = CodeSigner::new("secret-a");
        let code = "FS-ABCD-EFGH";
        let sum = signer.checksum(code);

        assert!(signer.verify(code, &sum));
        assert!(signer.verify(code, &sum.to_lowercase()));
        assert!(signer.verify(code, &format!(" {} ", sum)));
        assert!(!signer.verify(code, "00000000"));
    }
}
