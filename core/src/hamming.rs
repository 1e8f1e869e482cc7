//! Hamming(7,4) forward error correction.
//!
//! Every 4-bit nibble becomes a 7-bit codeword with parity bits at
//! positions 1, 2 and 4 (1-indexed) and data bits at 3, 5, 6, 7. Syndrome
//! decoding repairs any single flipped bit per block; a block is never
//! rejected, so a two-bit error silently mis-corrects. That is an accepted
//! trade-off for the expected bit-error rate of the acoustic channel.

/// Result of decoding one 7-bit block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub value: u8,
    pub corrected: bool,
}

/// Encode the low 4 bits of `value` into a 7-bit codeword.
pub fn encode_nibble(value: u8) -> [bool; 7] {
    let d1 = (value >> 3) & 1 == 1;
    let d2 = (value >> 2) & 1 == 1;
    let d3 = (value >> 1) & 1 == 1;
    let d4 = value & 1 == 1;
    let p1 = d1 ^ d2 ^ d4;
    let p2 = d1 ^ d3 ^ d4;
    let p3 = d2 ^ d3 ^ d4;
    [p1, p2, d1, p3, d2, d3, d4]
}

/// Decode a 7-bit block, fixing at most one flipped bit.
pub fn decode_block(bits: &[bool; 7]) -> Decoded {
    let mut b = *bits;
    let syndrome = (((b[3] ^ b[4] ^ b[5] ^ b[6]) as u8) << 2)
        | (((b[1] ^ b[2] ^ b[5] ^ b[6]) as u8) << 1)
        | ((b[0] ^ b[2] ^ b[4] ^ b[6]) as u8);
    let mut corrected = false;
    if syndrome != 0 {
        let pos = (syndrome - 1) as usize;
        b[pos] = !b[pos];
        corrected = true;
    }
    let value =
        ((b[2] as u8) << 3) | ((b[4] as u8) << 2) | ((b[5] as u8) << 1) | (b[6] as u8);
    Decoded { value, corrected }
}

/// Encode a byte string: high nibble then low nibble, 14 coded bits per byte.
pub fn encode_bytes(data: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(data.len() * 14);
    for &byte in data {
        bits.extend_from_slice(&encode_nibble((byte >> 4) & 0x0F));
        bits.extend_from_slice(&encode_nibble(byte & 0x0F));
    }
    bits
}

/// Decode a coded bitstream back to bytes, discarding an incomplete
/// trailing block. Returns the bytes and the number of corrected bits.
pub fn decode_bytes(bits: &[bool]) -> (Vec<u8>, u32) {
    let mut bytes = Vec::with_capacity(bits.len() / 14);
    let mut corrections = 0u32;
    for pair in bits.chunks_exact(14) {
        let hi: [bool; 7] = pair[..7].try_into().expect("chunk is 14 bits");
        let lo: [bool; 7] = pair[7..].try_into().expect("chunk is 14 bits");
        let hi = decode_block(&hi);
        let lo = decode_block(&lo);
        corrections += hi.corrected as u32 + lo.corrected as u32;
        bytes.push((hi.value << 4) | lo.value);
    }
    (bytes, corrections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_nibbles() {
        for v in 0u8..16 {
            let code = encode_nibble(v);
            let decoded = decode_block(&code);
            assert_eq!(decoded.value, v);
            assert!(!decoded.corrected, "clean codeword for {} flagged", v);
        }
    }

    #[test]
    fn test_single_bit_flip_corrected() {
        for v in 0u8..16 {
            let code = encode_nibble(v);
            for pos in 0..7 {
                let mut noisy = code;
                noisy[pos] = !noisy[pos];
                let decoded = decode_block(&noisy);
                assert_eq!(
                    decoded.value, v,
                    "nibble {:X} not recovered after flipping bit {}",
                    v, pos
                );
                assert!(decoded.corrected);
            }
        }
    }

    #[test]
    fn test_byte_stream_roundtrip() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let bits = encode_bytes(data);
        assert_eq!(bits.len(), data.len() * 14);

        let (decoded, corrections) = decode_bytes(&bits);
        assert_eq!(decoded, data);
        assert_eq!(corrections, 0);
    }

    #[test]
    fn test_byte_stream_roundtrip_binary() {
        let data: Vec<u8> = (0..=255).collect();
        let bits = encode_bytes(&data);
        let (decoded, corrections) = decode_bytes(&bits);
        assert_eq!(decoded, data);
        assert_eq!(corrections, 0);
    }

    #[test]
    fn test_flipped_bits_counted() {
        let data = b"hello";
        let mut bits = encode_bytes(data);
        // One flip per 14-bit block, all recoverable.
        for block in 0..data.len() * 2 {
            bits[block * 7 + (block % 7)] ^= true;
        }
        let (decoded, corrections) = decode_bytes(&bits);
        assert_eq!(decoded, data);
        assert_eq!(corrections, data.len() as u32 * 2);
    }

    #[test]
    fn test_incomplete_tail_discarded() {
        let data = b"ab";
        let mut bits = encode_bytes(data);
        bits.extend_from_slice(&[true; 9]); // less than one block
        let (decoded, corrections) = decode_bytes(&bits);
        assert_eq!(decoded, data);
        assert_eq!(corrections, 0);
    }
}
