//! MurmurHash3 x86 32-bit, pinned in-crate.
//!
//! Bucketing must produce identical assignments across every client
//! implementation, so the hash is part of the wire contract: seed and
//! byte order are fixed here and verified against reference vectors
//! rather than delegated to an external crate.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Hash `data` with the x86 32-bit MurmurHash3 variant.
///
/// Operates on the raw byte sequence; callers hashing strings pass the
/// UTF-8 encoding. Returns the unsigned 32-bit hash.
pub fn murmurhash3_x86_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    let mut k1: u32 = 0;
    if tail.len() >= 3 {
        k1 ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        k1 ^= u32::from(tail[0]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    fmix32(h1 ^ data.len() as u32)
}

// Finalization mix; forces avalanche of the final 32-bit block.
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
