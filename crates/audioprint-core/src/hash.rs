//! Packing classifier levels into 32-bit subfingerprint hashes

/// Maps quantizer level to symbol so neighbouring levels differ in one bit
pub const GRAY_CODE: [u32; 4] = [0, 1, 3, 2];

/// Number of 2-bit symbols that fit into a `u32`
pub const MAX_SYMBOLS: usize = 16;

pub fn gray_code(level: u32) -> u32 {
    GRAY_CODE[level as usize & 0x3]
}

/// Pack quantizer levels into a hash, first level in the most significant bits.
pub fn assemble<I>(levels: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    levels
        .into_iter()
        .fold(0u32, |hash, level| (hash << 2) | gray_code(level))
}

/// Split a hash built from `count` levels back into its gray-coded symbols.
pub fn unpack(hash: u32, count: usize) -> Vec<u32> {
    debug_assert!(count <= MAX_SYMBOLS);
    (0..count)
        .rev()
        .map(|i| (hash >> (2 * i)) & 0x3)
        .collect()
}
