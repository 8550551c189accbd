use crate::utils::{current_timestamp, fill_random, hmac_sha256};
use crate::{Error, Result};

/// C1/S1/C2/S2 size
pub const HANDSHAKE_SIZE: usize = 1536;

/// RTMP version byte
pub const RTMP_VERSION: u8 = 3;

// "Genuine Adobe Flash Media Server 001" + 32 trailing bytes
pub(crate) const GENUINE_FMS_KEY: [u8; 68] = [
    0x47, 0x65, 0x6e, 0x75, 0x69, 0x6e, 0x65, 0x20, 0x41, 0x64, 0x6f, 0x62, 0x65, 0x20, 0x46,
    0x6c, 0x61, 0x73, 0x68, 0x20, 0x4d, 0x65, 0x64, 0x69, 0x61, 0x20, 0x53, 0x65, 0x72, 0x76,
    0x65, 0x72, 0x20, 0x30, 0x30, 0x31, 0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e,
    0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e, 0x57, 0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab,
    0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb, 0x31, 0xae,
];

// "Genuine Adobe Flash Player 001" + 32 trailing bytes
pub(crate) const GENUINE_FP_KEY: [u8; 62] = [
    0x47, 0x65, 0x6e, 0x75, 0x69, 0x6e, 0x65, 0x20, 0x41, 0x64, 0x6f, 0x62, 0x65, 0x20, 0x46,
    0x6c, 0x61, 0x73, 0x68, 0x20, 0x50, 0x6c, 0x61, 0x79, 0x65, 0x72, 0x20, 0x30, 0x30, 0x31,
    0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e, 0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e,
    0x57, 0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab, 0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb,
    0x31, 0xae,
];

/// Ordering of the key and digest blocks inside the 1528-byte payload.
/// Scheme 0 is key-then-digest, scheme 1 digest-then-key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Scheme0,
    Scheme1,
}

impl Scheme {
    fn other(self) -> Scheme {
        match self {
            Scheme::Scheme0 => Scheme::Scheme1,
            Scheme::Scheme1 => Scheme::Scheme0,
        }
    }
}

/// Digest start for a 1536-byte C1/S1 block under the given scheme. The
/// four offset bytes are summed modulo 728 and biased by the scheme's base.
pub(crate) fn digest_start(block: &[u8], scheme: Scheme) -> usize {
    let offset_bytes = match scheme {
        Scheme::Scheme0 => &block[772..776],
        Scheme::Scheme1 => &block[8..12],
    };
    let sum: usize = offset_bytes.iter().map(|&b| b as usize).sum();
    match scheme {
        Scheme::Scheme0 => sum % 728 + 776,
        Scheme::Scheme1 => sum % 728 + 12,
    }
}

fn digest_over_elided(block: &[u8], start: usize, key: &[u8]) -> [u8; 32] {
    hmac_sha256(key, &[&block[..start], &block[start + 32..]])
}

/// Verify the C1 digest, trying scheme 0 first then scheme 1. Returns the
/// digest start and the 32 digest bytes of the accepted scheme.
pub(crate) fn verify_c1(c1: &[u8]) -> Result<(usize, [u8; 32])> {
    let mut scheme = Scheme::Scheme0;
    for _ in 0..2 {
        let start = digest_start(c1, scheme);
        let expected = digest_over_elided(c1, start, &GENUINE_FP_KEY[..30]);
        if c1[start..start + 32] == expected {
            let mut digest = [0u8; 32];
            digest.copy_from_slice(&c1[start..start + 32]);
            return Ok((start, digest));
        }
        scheme = scheme.other();
    }
    Err(Error::handshake("C1 digest matches neither scheme"))
}

/// Build S1: random payload with C1's layout, server time and version up
/// front, and the digest recomputed in place under the accepted scheme.
pub(crate) fn make_s1(scheme: Scheme) -> Vec<u8> {
    let mut s1 = vec![0u8; HANDSHAKE_SIZE];
    fill_random(&mut s1);
    s1[..4].copy_from_slice(&current_timestamp().to_be_bytes());
    s1[4..8].copy_from_slice(&[0x04, 0x05, 0x00, 0x01]);

    let start = digest_start(&s1, scheme);
    let digest = digest_over_elided(&s1, start, &GENUINE_FMS_KEY[..36]);
    s1[start..start + 32].copy_from_slice(&digest);
    s1
}

/// Build S2: random fill with the trailing 32 bytes holding the HMAC of the
/// first 1504 bytes under a key derived from the accepted C1 digest.
pub(crate) fn make_s2(c1_digest: &[u8; 32]) -> Vec<u8> {
    let key = hmac_sha256(&GENUINE_FMS_KEY, &[c1_digest]);
    let mut s2 = vec![0u8; HANDSHAKE_SIZE];
    fill_random(&mut s2);
    let digest = hmac_sha256(&key, &[&s2[..1504]]);
    s2[1504..].copy_from_slice(&digest);
    s2
}

#[cfg(test)]
pub(crate) fn make_client_c1(scheme: Scheme) -> Vec<u8> {
    let mut c1 = vec![0u8; HANDSHAKE_SIZE];
    fill_random(&mut c1);
    c1[4..8].copy_from_slice(&[0x80, 0x00, 0x07, 0x02]); // non-zero client version
    let start = digest_start(&c1, scheme);
    let digest = digest_over_elided(&c1, start, &GENUINE_FP_KEY[..30]);
    c1[start..start + 32].copy_from_slice(&digest);
    c1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_start_ranges() {
        let mut block = vec![0u8; HANDSHAKE_SIZE];
        block[772..776].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let start = digest_start(&block, Scheme::Scheme0);
        // 4*255 = 1020; 1020 % 728 = 292; + 776
        assert_eq!(start, 1068);
        assert!(start + 32 <= HANDSHAKE_SIZE);

        block[8..12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let start = digest_start(&block, Scheme::Scheme1);
        assert_eq!(start, 304);
    }

    #[test]
    fn test_verify_accepts_both_schemes() {
        for scheme in [Scheme::Scheme0, Scheme::Scheme1] {
            let c1 = make_client_c1(scheme);
            let (start, digest) = verify_c1(&c1).unwrap();
            assert_eq!(start, digest_start(&c1, scheme));
            assert_eq!(&c1[start..start + 32], &digest);
        }
    }

    #[test]
    fn test_verify_rejects_corrupted_digest() {
        let mut c1 = make_client_c1(Scheme::Scheme0);
        let start = digest_start(&c1, Scheme::Scheme0);
        c1[start] ^= 0xFF;
        assert!(verify_c1(&c1).is_err());
    }

    #[test]
    fn test_s1_digest_is_self_consistent() {
        let s1 = make_s1(Scheme::Scheme0);
        let start = digest_start(&s1, Scheme::Scheme0);
        let expected = digest_over_elided(&s1, start, &GENUINE_FMS_KEY[..36]);
        assert_eq!(&s1[start..start + 32], &expected);
    }

    #[test]
    fn test_s2_trailing_digest() {
        let c1 = make_client_c1(Scheme::Scheme1);
        let (_, c1_digest) = verify_c1(&c1).unwrap();
        let s2 = make_s2(&c1_digest);

        let key = hmac_sha256(&GENUINE_FMS_KEY, &[&c1_digest]);
        let expected = hmac_sha256(&key, &[&s2[..1504]]);
        assert_eq!(&s2[1504..], &expected);
    }
}
