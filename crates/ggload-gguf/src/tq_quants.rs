//! Ternary formats (TQ1_0, TQ2_0).
//!
//! Every value is one of `{-1, 0, 1}` times a per-block f16 scale.

use crate::dequant::{dequantize_blocks, read_f16};
use crate::k_quants::QK_K;

/// Bytes per TQ1_0 block.
pub const TQ1_0_BYTES: usize = 54;

/// Bytes per TQ2_0 block.
pub const TQ2_0_BYTES: usize = 66;

const POW3: [u8; 6] = [1, 3, 9, 27, 81, 243];

/// Extract trit `n` of a base-3 packed byte as `-1`, `0` or `1`.
///
/// Bytes store `ceil(value * 256 / 243)`, so multiplying by `3^n` rotates the
/// wanted trit into the top of the byte.
#[inline]
fn trit(byte: u8, n: usize) -> i32 {
    let q = byte.wrapping_mul(POW3[n]);
    ((q as u16 * 3) >> 8) as i32 - 1
}

/// TQ1_0 dequantization.
///
/// Block structure (54 bytes per 256 values):
/// - bytes 0-47: five trits per byte
/// - bytes 48-51: four trits per byte
/// - bytes 52-53: scale (f16)
pub fn dequantize_tq1_0_block(block: &[u8], output: &mut [f32; QK_K]) {
    let d = read_f16(block, 52);
    let qs = &block[0..48];
    let qh = &block[48..52];

    let mut out = output.iter_mut();
    for (bytes, trits) in [(&qs[..32], 5), (&qs[32..], 5), (qh, 4)] {
        for n in 0..trits {
            for (&byte, y) in bytes.iter().zip(out.by_ref()) {
                *y = trit(byte, n) as f32 * d;
            }
        }
    }
}

/// TQ2_0 dequantization.
///
/// Block structure (66 bytes per 256 values):
/// - bytes 0-63: four 2-bit codes per byte, code `c` meaning `c - 1`
/// - bytes 64-65: scale (f16)
pub fn dequantize_tq2_0_block(block: &[u8], output: &mut [f32; QK_K]) {
    let d = read_f16(block, 64);

    let mut out = output.iter_mut();
    for qs in block[0..64].chunks_exact(32) {
        for shift in (0..8).step_by(2) {
            for (&byte, y) in qs.iter().zip(out.by_ref()) {
                let q = ((byte >> shift) & 3) as i32;
                *y = (q - 1) as f32 * d;
            }
        }
    }
}

/// Dequantize TQ1_0 data from raw bytes.
pub fn dequantize_tq1_0_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, TQ1_0_BYTES, n_elements, dequantize_tq1_0_block)
}

/// Dequantize TQ2_0 data from raw bytes.
pub fn dequantize_tq2_0_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, TQ2_0_BYTES, n_elements, dequantize_tq2_0_block)
}
