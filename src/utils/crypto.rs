use hmac::{Hmac, Mac};
use rand::{rng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fill a buffer with random bytes
pub fn fill_random(buf: &mut [u8]) {
    rng().fill_bytes(buf);
}

/// Generate random bytes
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    fill_random(&mut bytes);
    bytes
}

/// HMAC-SHA256 over a sequence of data parts. The handshake digests are
/// computed over a message with 32 bytes elided from the middle, which is
/// why the data arrives as separate slices.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key size");
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result.into_bytes());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_length() {
        let bytes = generate_random_bytes(32);
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_hmac_sha256_vector() {
        let key = b"key";
        let data = b"The quick brown fox jumps over the lazy dog";
        let mac = hmac_sha256(key, &[data]);

        // RFC test vector
        let expected = [
            0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f,
            0xb1, 0x43, 0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc,
            0x2d, 0x1a, 0x3c, 0xd8,
        ];

        assert_eq!(mac, expected);
    }

    #[test]
    fn test_hmac_split_input_matches_whole() {
        let key = b"secret";
        let data = b"0123456789abcdef";
        let whole = hmac_sha256(key, &[data]);
        let split = hmac_sha256(key, &[&data[..7], &data[7..]]);
        assert_eq!(whole, split);
    }
}
