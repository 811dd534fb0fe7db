//! Non-linear lookup-table formats: IQ4_NL, IQ4_XS and MXFP4.
//!
//! Each 4-bit code indexes a 16-entry table instead of being used as an
//! integer directly. Within a 32-value group, value `j` comes from the low
//! nibble of byte `j` and value `j + 16` from the high nibble.

use byteorder::{ByteOrder, LittleEndian};

use crate::dequant::{dequantize_blocks, read_f16, QK};
use crate::k_quants::QK_K;

/// IQ4 non-linear code table.
pub const KVALUES_IQ4NL: [i8; 16] = [
    -127, -104, -83, -65, -49, -35, -22, -10, 1, 13, 25, 38, 53, 69, 89, 113,
];

/// FP4 (E2M1) code table, doubled so every entry is an integer.
///
/// The block exponent is halved to compensate, see [`e8m0_to_f32_half`].
pub const KVALUES_MXFP4: [i8; 16] = [0, 1, 2, 3, 4, 6, 8, 12, 0, -1, -2, -3, -4, -6, -8, -12];

/// Bytes per IQ4_NL block.
pub const IQ4_NL_BYTES: usize = 18;

/// Bytes per IQ4_XS block.
pub const IQ4_XS_BYTES: usize = 136;

/// Bytes per MXFP4 block.
pub const MXFP4_BYTES: usize = 17;

/// Half of `2^(e - 127)`, built directly from the bit pattern.
#[inline]
pub fn e8m0_to_f32_half(e: u8) -> f32 {
    let bits = if e < 2 {
        // Subnormal results
        0x0020_0000u32 << e
    } else {
        ((e as u32) - 1) << 23
    };
    f32::from_bits(bits)
}

/// Expand 16 packed bytes of 4-bit codes through `table`.
#[inline]
fn decode_nibbles(qs: &[u8], table: &[i8; 16], scale: f32, output: &mut [f32]) {
    let (lo, hi) = output.split_at_mut(qs.len());
    for ((&byte, l), h) in qs.iter().zip(lo).zip(hi) {
        *l = scale * table[(byte & 0x0F) as usize] as f32;
        *h = scale * table[(byte >> 4) as usize] as f32;
    }
}

/// IQ4_NL dequantization.
///
/// Block structure (18 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-17: 4-bit table indices
pub fn dequantize_iq4nl_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    decode_nibbles(&block[2..18], &KVALUES_IQ4NL, d, output);
}

/// IQ4_XS dequantization.
///
/// Block structure (136 bytes per 256 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-3: high 2 bits of the eight sub-block scales (u16)
/// - bytes 4-7: low 4 bits of the eight sub-block scales
/// - bytes 8-135: 4-bit table indices, 16 bytes per 32-value sub-block
///
/// Each sub-block scale is a 6-bit value biased by 32.
pub fn dequantize_iq4xs_block(block: &[u8], output: &mut [f32; QK_K]) {
    let d = read_f16(block, 0);
    let scales_h = LittleEndian::read_u16(&block[2..4]);
    let scales_l = &block[4..8];

    for (ib, (qs, y)) in block[8..136]
        .chunks_exact(16)
        .zip(output.chunks_exact_mut(32))
        .enumerate()
    {
        let low = (scales_l[ib / 2] >> (4 * (ib % 2))) & 0xF;
        let high = ((scales_h >> (2 * ib)) & 3) as u8;
        let ls = (low | (high << 4)) as i32;
        let dl = d * (ls - 32) as f32;
        decode_nibbles(qs, &KVALUES_IQ4NL, dl, y);
    }
}

/// MXFP4 dequantization.
///
/// Block structure (17 bytes per 32 values):
/// - byte 0: shared E8M0 exponent
/// - bytes 1-16: 4-bit E2M1 codes
pub fn dequantize_mxfp4_block(block: &[u8], output: &mut [f32; QK]) {
    let d = e8m0_to_f32_half(block[0]);
    decode_nibbles(&block[1..17], &KVALUES_MXFP4, d, output);
}

/// Dequantize IQ4_NL data from raw bytes.
pub fn dequantize_iq4nl_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, IQ4_NL_BYTES, n_elements, dequantize_iq4nl_block)
}

/// Dequantize IQ4_XS data from raw bytes.
pub fn dequantize_iq4xs_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, IQ4_XS_BYTES, n_elements, dequantize_iq4xs_block)
}

/// Dequantize MXFP4 data from raw bytes.
pub fn dequantize_mxfp4_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, MXFP4_BYTES, n_elements, dequantize_mxfp4_block)
}
