//! K-Quant (Q2K-Q8K) block structures and decoding.
//!
//! K-Quants use 256-element superblocks with hierarchical sub-block scaling.
//! Layouts and arithmetic follow the GGML reference decoder exactly.
//!
//! # Block Sizes
//!
//! | Type | Block Size | Bytes/Block | Bits/Element |
//! |------|------------|-------------|--------------|
//! | Q2K  | 256        | 84          | ~2.6         |
//! | Q3K  | 256        | 110         | ~3.4         |
//! | Q4K  | 256        | 144         | ~4.5         |
//! | Q5K  | 256        | 176         | ~5.5         |
//! | Q6K  | 256        | 210         | ~6.6         |
//! | Q8K  | 256        | 292         | ~9.1         |

use byteorder::{ByteOrder, LittleEndian};
use half::f16;

use crate::dequant::dequantize_blocks;

/// Block size for all K-quants (256 elements per block).
pub const QK_K: usize = 256;

/// Size of scale encoding for Q3K/Q4K/Q5K (12 bytes).
pub const K_SCALE_SIZE: usize = 12;

// =============================================================================
// Block Structures
// =============================================================================

/// Q2K block: 2-bit quantization with dual scales.
///
/// Structure: 84 bytes for 256 elements
/// - scales: 16 bytes (low nibble scale, high nibble min, per 16 elements)
/// - qs: 64 bytes (2-bit quantized values, 4 per byte)
/// - d: 2 bytes (f16 scale factor)
/// - dmin: 2 bytes (f16 minimum scale factor)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ2K {
    /// 4-bit scale/min pairs for 16 sub-blocks.
    pub scales: [u8; QK_K / 16],
    /// 2-bit quantized values (4 values per byte).
    pub qs: [u8; QK_K / 4],
    /// Scale factor.
    pub d: f16,
    /// Minimum scale factor.
    pub dmin: f16,
}

/// Q3K block: 3-bit quantization with high-bit mask.
///
/// Structure: 110 bytes for 256 elements
/// - hmask: 32 bytes (high bit for each element)
/// - qs: 64 bytes (lower 2 bits of quantized values)
/// - scales: 12 bytes (sixteen 6-bit scales)
/// - d: 2 bytes (f16 scale factor)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ3K {
    /// High bit mask.
    pub hmask: [u8; QK_K / 8],
    /// Lower 2 bits of 3-bit quantized values.
    pub qs: [u8; QK_K / 4],
    /// Packed 6-bit scales.
    pub scales: [u8; K_SCALE_SIZE],
    /// Scale factor.
    pub d: f16,
}

/// Q4K block: 4-bit quantization with per-subblock scales.
///
/// Structure: 144 bytes for 256 elements
/// - d: 2 bytes (f16 scale)
/// - dmin: 2 bytes (f16 minimum scale)
/// - scales: 12 bytes (6-bit scales and mins for 8 sub-blocks of 32 elements)
/// - qs: 128 bytes (4-bit quantized values, 2 per byte)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ4K {
    /// Scale factor.
    pub d: f16,
    /// Minimum scale factor.
    pub dmin: f16,
    /// 6-bit scale/min pairs for 8 sub-blocks (packed into 12 bytes).
    pub scales: [u8; K_SCALE_SIZE],
    /// 4-bit quantized values (2 values per byte).
    pub qs: [u8; QK_K / 2],
}

/// Q5K block: 5-bit quantization with high-bit array.
///
/// Structure: 176 bytes for 256 elements
/// - d: 2 bytes (f16 scale)
/// - dmin: 2 bytes (f16 minimum scale)
/// - scales: 12 bytes (6-bit scales for 8 sub-blocks)
/// - qh: 32 bytes (fifth bit for each element)
/// - qs: 128 bytes (lower 4 bits of quantized values)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ5K {
    /// Scale factor.
    pub d: f16,
    /// Minimum scale factor.
    pub dmin: f16,
    /// 6-bit scale/min pairs for 8 sub-blocks.
    pub scales: [u8; K_SCALE_SIZE],
    /// Fifth bit of each value.
    pub qh: [u8; QK_K / 8],
    /// Lower 4 bits of 5-bit quantized values.
    pub qs: [u8; QK_K / 2],
}

/// Q6K block: 6-bit quantization with split storage.
///
/// Structure: 210 bytes for 256 elements
/// - ql: 128 bytes (lower 4 bits)
/// - qh: 64 bytes (upper 2 bits)
/// - scales: 16 bytes (i8 scale per 16 elements)
/// - d: 2 bytes (f16 scale factor)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ6K {
    /// Lower 4 bits of quantized values.
    pub ql: [u8; QK_K / 2],
    /// Upper 2 bits of quantized values.
    pub qh: [u8; QK_K / 4],
    /// Signed sub-block scales.
    pub scales: [i8; QK_K / 16],
    /// Scale factor.
    pub d: f16,
}

/// Q8K block: 8-bit quantization with an f32 scale.
///
/// Structure: 292 bytes for 256 elements
/// - d: 4 bytes (f32 scale factor)
/// - qs: 256 bytes (i8 quantized values)
/// - bsums: 32 bytes (i16 sums of 16-element groups, unused when decoding)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockQ8K {
    /// Scale factor.
    pub d: f32,
    /// Quantized values.
    pub qs: [i8; QK_K],
    /// Sums of groups of 16 quantized values.
    pub bsums: [i16; QK_K / 16],
}

const _: () = assert!(std::mem::size_of::<BlockQ2K>() == 84);
const _: () = assert!(std::mem::size_of::<BlockQ3K>() == 110);
const _: () = assert!(std::mem::size_of::<BlockQ4K>() == 144);
const _: () = assert!(std::mem::size_of::<BlockQ5K>() == 176);
const _: () = assert!(std::mem::size_of::<BlockQ6K>() == 210);
const _: () = assert!(std::mem::size_of::<BlockQ8K>() == 292);

// =============================================================================
// Parsing From Bytes
// =============================================================================

fn f16_at(bytes: &[u8], offset: usize) -> f16 {
    f16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn copy_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn copy_signed<const N: usize>(bytes: &[u8]) -> [i8; N] {
    let mut out = [0i8; N];
    for (o, &b) in out.iter_mut().zip(bytes) {
        *o = b as i8;
    }
    out
}

impl BlockQ2K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            scales: copy_bytes(&bytes[0..16]),
            qs: copy_bytes(&bytes[16..80]),
            d: f16_at(bytes, 80),
            dmin: f16_at(bytes, 82),
        }
    }
}

impl BlockQ3K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hmask: copy_bytes(&bytes[0..32]),
            qs: copy_bytes(&bytes[32..96]),
            scales: copy_bytes(&bytes[96..108]),
            d: f16_at(bytes, 108),
        }
    }
}

impl BlockQ4K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            d: f16_at(bytes, 0),
            dmin: f16_at(bytes, 2),
            scales: copy_bytes(&bytes[4..16]),
            qs: copy_bytes(&bytes[16..144]),
        }
    }
}

impl BlockQ5K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            d: f16_at(bytes, 0),
            dmin: f16_at(bytes, 2),
            scales: copy_bytes(&bytes[4..16]),
            qh: copy_bytes(&bytes[16..48]),
            qs: copy_bytes(&bytes[48..176]),
        }
    }
}

impl BlockQ6K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            ql: copy_bytes(&bytes[0..128]),
            qh: copy_bytes(&bytes[128..192]),
            scales: copy_signed(&bytes[192..208]),
            d: f16_at(bytes, 208),
        }
    }
}

impl BlockQ8K {
    /// Bytes per block.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Parse a block from exactly [`Self::BYTES`] little-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bsums = [0i16; QK_K / 16];
        LittleEndian::read_i16_into(&bytes[260..292], &mut bsums);
        Self {
            d: LittleEndian::read_f32(&bytes[0..4]),
            qs: copy_signed(&bytes[4..260]),
            bsums,
        }
    }
}

// =============================================================================
// Scale Unpacking
// =============================================================================

/// Unpack the 6-bit scale and min of sub-block `j` (0..8) from the 12-byte
/// Q4K/Q5K scale array.
#[inline]
pub fn get_scale_min_k4(j: usize, q: &[u8; K_SCALE_SIZE]) -> (u8, u8) {
    if j < 4 {
        (q[j] & 63, q[j + 4] & 63)
    } else {
        let d = (q[j + 4] & 0xF) | ((q[j - 4] >> 6) << 4);
        let m = (q[j + 4] >> 4) | ((q[j] >> 6) << 4);
        (d, m)
    }
}

/// Unpack the sixteen biased 6-bit Q3K scales.
///
/// Bytes 0..8 hold the low nibbles, bytes 8..12 the high two bits.
pub fn unpack_q3k_scales(packed: &[u8; K_SCALE_SIZE]) -> [i8; 16] {
    const KMASK1: u32 = 0x0303_0303;
    const KMASK2: u32 = 0x0f0f_0f0f;

    let a0 = LittleEndian::read_u32(&packed[0..4]);
    let a1 = LittleEndian::read_u32(&packed[4..8]);
    let tmp = LittleEndian::read_u32(&packed[8..12]);

    let aux = [
        (a0 & KMASK2) | ((tmp & KMASK1) << 4),
        (a1 & KMASK2) | (((tmp >> 2) & KMASK1) << 4),
        ((a0 >> 4) & KMASK2) | (((tmp >> 4) & KMASK1) << 4),
        ((a1 >> 4) & KMASK2) | (((tmp >> 6) & KMASK1) << 4),
    ];

    let mut scales = [0i8; 16];
    for (chunk, word) in scales.chunks_exact_mut(4).zip(aux) {
        for (s, b) in chunk.iter_mut().zip(word.to_le_bytes()) {
            *s = b as i8;
        }
    }
    scales
}

// =============================================================================
// Dequantization Functions
// =============================================================================

/// Dequantize Q2K block to f32.
pub fn dequantize_q2k(block: &BlockQ2K, output: &mut [f32; QK_K]) {
    let d = block.d.to_f32();
    let min = block.dmin.to_f32();

    let mut out = output.iter_mut();
    let mut is = 0;
    for q in block.qs.chunks_exact(32) {
        for shift in (0..8).step_by(2) {
            for half in [&q[..16], &q[16..]] {
                let sc = block.scales[is];
                is += 1;
                let dl = d * (sc & 0xF) as f32;
                let ml = min * (sc >> 4) as f32;
                for (&byte, y) in half.iter().zip(out.by_ref()) {
                    *y = dl * ((byte >> shift) & 3) as f32 - ml;
                }
            }
        }
    }
}

/// Dequantize Q3K block to f32.
pub fn dequantize_q3k(block: &BlockQ3K, output: &mut [f32; QK_K]) {
    let d_all = block.d.to_f32();
    let scales = unpack_q3k_scales(&block.scales);

    let mut out = output.iter_mut();
    let mut is = 0;
    let mut m: u8 = 1;
    for q in block.qs.chunks_exact(32) {
        for shift in (0..8).step_by(2) {
            for (q_half, hm_half) in [(&q[..16], &block.hmask[..16]), (&q[16..], &block.hmask[16..])] {
                let dl = d_all * (scales[is] as i32 - 32) as f32;
                is += 1;
                for ((&byte, &hm), y) in q_half.iter().zip(hm_half).zip(out.by_ref()) {
                    let low = ((byte >> shift) & 3) as i32;
                    let high = if hm & m != 0 { 0 } else { 4 };
                    *y = dl * (low - high) as f32;
                }
            }
            m = m.wrapping_shl(1);
        }
    }
}

/// Dequantize Q4K block to f32.
pub fn dequantize_q4k(block: &BlockQ4K, output: &mut [f32; QK_K]) {
    let d = block.d.to_f32();
    let min = block.dmin.to_f32();

    for (j, (q, y)) in block
        .qs
        .chunks_exact(32)
        .zip(output.chunks_exact_mut(64))
        .enumerate()
    {
        let (sc, m) = get_scale_min_k4(2 * j, &block.scales);
        let (d1, m1) = (d * sc as f32, min * m as f32);
        let (sc, m) = get_scale_min_k4(2 * j + 1, &block.scales);
        let (d2, m2) = (d * sc as f32, min * m as f32);

        let (lo, hi) = y.split_at_mut(32);
        for l in 0..32 {
            lo[l] = d1 * (q[l] & 0xF) as f32 - m1;
            hi[l] = d2 * (q[l] >> 4) as f32 - m2;
        }
    }
}

/// Dequantize Q5K block to f32.
pub fn dequantize_q5k(block: &BlockQ5K, output: &mut [f32; QK_K]) {
    let d = block.d.to_f32();
    let min = block.dmin.to_f32();

    let mut u1: u8 = 1;
    let mut u2: u8 = 2;
    for (j, (ql, y)) in block
        .qs
        .chunks_exact(32)
        .zip(output.chunks_exact_mut(64))
        .enumerate()
    {
        let (sc, m) = get_scale_min_k4(2 * j, &block.scales);
        let (d1, m1) = (d * sc as f32, min * m as f32);
        let (sc, m) = get_scale_min_k4(2 * j + 1, &block.scales);
        let (d2, m2) = (d * sc as f32, min * m as f32);

        let (lo, hi) = y.split_at_mut(32);
        for l in 0..32 {
            let h1 = if block.qh[l] & u1 != 0 { 16 } else { 0 };
            let h2 = if block.qh[l] & u2 != 0 { 16 } else { 0 };
            lo[l] = d1 * ((ql[l] & 0xF) + h1) as f32 - m1;
            hi[l] = d2 * ((ql[l] >> 4) + h2) as f32 - m2;
        }
        u1 = u1.wrapping_shl(2);
        u2 = u2.wrapping_shl(2);
    }
}

/// Dequantize Q6K block to f32.
pub fn dequantize_q6k(block: &BlockQ6K, output: &mut [f32; QK_K]) {
    let d = block.d.to_f32();

    for (n, y) in output.chunks_exact_mut(128).enumerate() {
        let ql = &block.ql[n * 64..n * 64 + 64];
        let qh = &block.qh[n * 32..n * 32 + 32];
        let sc = &block.scales[n * 8..n * 8 + 8];

        for l in 0..32 {
            let is = l / 16;
            let q1 = ((ql[l] & 0xF) | ((qh[l] & 3) << 4)) as i32 - 32;
            let q2 = ((ql[l + 32] & 0xF) | (((qh[l] >> 2) & 3) << 4)) as i32 - 32;
            let q3 = ((ql[l] >> 4) | (((qh[l] >> 4) & 3) << 4)) as i32 - 32;
            let q4 = ((ql[l + 32] >> 4) | (((qh[l] >> 6) & 3) << 4)) as i32 - 32;

            y[l] = d * sc[is] as f32 * q1 as f32;
            y[l + 32] = d * sc[is + 2] as f32 * q2 as f32;
            y[l + 64] = d * sc[is + 4] as f32 * q3 as f32;
            y[l + 96] = d * sc[is + 6] as f32 * q4 as f32;
        }
    }
}

/// Dequantize Q8K block to f32.
pub fn dequantize_q8k(block: &BlockQ8K, output: &mut [f32; QK_K]) {
    for (y, &q) in output.iter_mut().zip(&block.qs) {
        *y = block.d * q as f32;
    }
}

// =============================================================================
// Dequantization From Byte Slices
// =============================================================================
//
// Each function expects whole blocks; the output is truncated to `n_elements`.

/// Dequantize Q2K data from raw bytes.
pub fn dequantize_q2k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ2K::BYTES, n_elements, |bytes, out| {
        dequantize_q2k(&BlockQ2K::from_bytes(bytes), out)
    })
}

/// Dequantize Q3K data from raw bytes.
pub fn dequantize_q3k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ3K::BYTES, n_elements, |bytes, out| {
        dequantize_q3k(&BlockQ3K::from_bytes(bytes), out)
    })
}

/// Dequantize Q4K data from raw bytes.
pub fn dequantize_q4k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ4K::BYTES, n_elements, |bytes, out| {
        dequantize_q4k(&BlockQ4K::from_bytes(bytes), out)
    })
}

/// Dequantize Q5K data from raw bytes.
pub fn dequantize_q5k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ5K::BYTES, n_elements, |bytes, out| {
        dequantize_q5k(&BlockQ5K::from_bytes(bytes), out)
    })
}

/// Dequantize Q6K data from raw bytes.
pub fn dequantize_q6k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ6K::BYTES, n_elements, |bytes, out| {
        dequantize_q6k(&BlockQ6K::from_bytes(bytes), out)
    })
}

/// Dequantize Q8K data from raw bytes.
pub fn dequantize_q8k_bytes(data: &[u8], n_elements: usize) -> Vec<f32> {
    dequantize_blocks(data, BlockQ8K::BYTES, n_elements, |bytes, out| {
        dequantize_q8k(&BlockQ8K::from_bytes(bytes), out)
    })
}
