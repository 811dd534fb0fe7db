//! Dequantization routines for GGUF tensor data.
//!
//! Converts the raw bytes of a tensor into `f32` values, matching the GGML
//! reference decoder bit for bit.
//!
//! # Supported Types
//!
//! - **F32, F64, F16, BF16, I8, I16, I32, I64**: element-wise widening
//! - **Q4_0, Q4_1, Q5_0, Q5_1, Q8_0, Q8_1**: 32-value blocks, see this module
//! - **Q2K-Q8K**: 256-value superblocks, see [`crate::k_quants`]
//! - **IQ4_NL, IQ4_XS, MXFP4**: non-linear lookup tables, see [`crate::iq_quants`]
//! - **TQ1_0, TQ2_0**: ternary, see [`crate::tq_quants`]
//!
//! The remaining IQ types have known sizes but no decode path and fail with
//! [`DequantError::UnsupportedConversion`].
//!
//! # Block Quantization
//!
//! For Q4_0:
//! - Block size: 32 values
//! - Block bytes: 18 (2 bytes scale + 16 bytes data)
//! - Dequantization: `value = (quant - 8) * scale`
//! - Value `j` comes from the low nibble of byte `j`, value `j + 16` from the
//!   high nibble.

use byteorder::{ByteOrder, LittleEndian};
use half::{bf16, f16};

use crate::{iq_quants, k_quants, tq_quants, GgmlType};

/// Error type for dequantization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DequantError {
    /// The type is recognised but has no decode path.
    #[error("Unsupported conversion from {0} to f32")]
    UnsupportedConversion(GgmlType),
    /// Input length does not match the element count.
    #[error("Invalid data size: expected {expected} bytes, got {actual}")]
    InvalidSize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },
}

/// Elements per block for the legacy formats.
pub const QK: usize = 32;

/// Dequantize raw tensor data to f32 values.
///
/// `data.len()` must equal `dtype.tensor_size(n_elements)`. The result holds
/// exactly `n_elements` values; a trailing partial block is decoded in full
/// and then truncated.
///
/// # Example
///
/// ```ignore
/// let raw = content.tensor_data(0, &bytes)?;
/// let info = &content.tensor_infos()[0];
/// let floats = dequantize(raw, info.dtype, info.n_elements_checked()?)?;
/// ```
pub fn dequantize(
    data: &[u8],
    dtype: GgmlType,
    n_elements: usize,
) -> Result<Vec<f32>, DequantError> {
    if !is_supported(dtype) {
        return Err(DequantError::UnsupportedConversion(dtype));
    }

    let expected = dtype
        .tensor_size_checked(n_elements)
        .ok_or(DequantError::InvalidSize {
            expected: usize::MAX,
            actual: data.len(),
        })?;
    if data.len() != expected {
        return Err(DequantError::InvalidSize {
            expected,
            actual: data.len(),
        });
    }

    let output = match dtype {
        GgmlType::F32 => data.chunks_exact(4).map(LittleEndian::read_f32).collect(),
        GgmlType::F64 => data
            .chunks_exact(8)
            .map(|b| LittleEndian::read_f64(b) as f32)
            .collect(),
        GgmlType::F16 => data
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        GgmlType::Bf16 => data
            .chunks_exact(2)
            .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        GgmlType::I8 => data.iter().map(|&b| b as i8 as f32).collect(),
        GgmlType::I16 => data
            .chunks_exact(2)
            .map(|b| LittleEndian::read_i16(b) as f32)
            .collect(),
        GgmlType::I32 => data
            .chunks_exact(4)
            .map(|b| LittleEndian::read_i32(b) as f32)
            .collect(),
        GgmlType::I64 => data
            .chunks_exact(8)
            .map(|b| LittleEndian::read_i64(b) as f32)
            .collect(),
        GgmlType::Q4_0 => dequantize_blocks(data, 18, n_elements, dequantize_q4_0_block),
        GgmlType::Q4_1 => dequantize_blocks(data, 20, n_elements, dequantize_q4_1_block),
        GgmlType::Q5_0 => dequantize_blocks(data, 22, n_elements, dequantize_q5_0_block),
        GgmlType::Q5_1 => dequantize_blocks(data, 24, n_elements, dequantize_q5_1_block),
        GgmlType::Q8_0 => dequantize_blocks(data, 34, n_elements, dequantize_q8_0_block),
        GgmlType::Q8_1 => dequantize_blocks(data, 36, n_elements, dequantize_q8_1_block),
        // K-quant types
        GgmlType::Q2K => k_quants::dequantize_q2k_bytes(data, n_elements),
        GgmlType::Q3K => k_quants::dequantize_q3k_bytes(data, n_elements),
        GgmlType::Q4K => k_quants::dequantize_q4k_bytes(data, n_elements),
        GgmlType::Q5K => k_quants::dequantize_q5k_bytes(data, n_elements),
        GgmlType::Q6K => k_quants::dequantize_q6k_bytes(data, n_elements),
        GgmlType::Q8K => k_quants::dequantize_q8k_bytes(data, n_elements),
        // Lookup-table types
        GgmlType::Iq4Nl => iq_quants::dequantize_iq4nl_bytes(data, n_elements),
        GgmlType::Iq4Xs => iq_quants::dequantize_iq4xs_bytes(data, n_elements),
        GgmlType::Mxfp4 => iq_quants::dequantize_mxfp4_bytes(data, n_elements),
        // Ternary types
        GgmlType::Tq1_0 => tq_quants::dequantize_tq1_0_bytes(data, n_elements),
        GgmlType::Tq2_0 => tq_quants::dequantize_tq2_0_bytes(data, n_elements),
        GgmlType::Iq2Xxs
        | GgmlType::Iq2Xs
        | GgmlType::Iq2S
        | GgmlType::Iq3Xxs
        | GgmlType::Iq3S
        | GgmlType::Iq1S
        | GgmlType::Iq1M => return Err(DequantError::UnsupportedConversion(dtype)),
    };

    Ok(output)
}

/// Check if a tensor type can be decoded to f32.
pub fn is_supported(dtype: GgmlType) -> bool {
    match dtype {
        GgmlType::F32
        | GgmlType::F16
        | GgmlType::Bf16
        | GgmlType::F64
        | GgmlType::I8
        | GgmlType::I16
        | GgmlType::I32
        | GgmlType::I64
        | GgmlType::Q4_0
        | GgmlType::Q4_1
        | GgmlType::Q5_0
        | GgmlType::Q5_1
        | GgmlType::Q8_0
        | GgmlType::Q8_1
        | GgmlType::Q2K
        | GgmlType::Q3K
        | GgmlType::Q4K
        | GgmlType::Q5K
        | GgmlType::Q6K
        | GgmlType::Q8K
        | GgmlType::Iq4Nl
        | GgmlType::Iq4Xs
        | GgmlType::Mxfp4
        | GgmlType::Tq1_0
        | GgmlType::Tq2_0 => true,
        GgmlType::Iq2Xxs
        | GgmlType::Iq2Xs
        | GgmlType::Iq2S
        | GgmlType::Iq3Xxs
        | GgmlType::Iq3S
        | GgmlType::Iq1S
        | GgmlType::Iq1M => false,
    }
}

/// Decode `data` block by block and truncate to `n_elements`.
///
/// `data` is expected to hold whole blocks of `block_bytes`; a trailing
/// fragment is ignored.
pub(crate) fn dequantize_blocks<const N: usize>(
    data: &[u8],
    block_bytes: usize,
    n_elements: usize,
    decode: impl Fn(&[u8], &mut [f32; N]),
) -> Vec<f32> {
    let n_blocks = data.len() / block_bytes;
    let mut output = Vec::with_capacity(n_blocks * N);
    let mut block_output = [0.0f32; N];

    for block in data.chunks_exact(block_bytes) {
        decode(block, &mut block_output);
        output.extend_from_slice(&block_output);
    }

    // Last block may be partial
    output.truncate(n_elements);
    output
}

/// Read a little-endian f16 at `offset` and widen it.
#[inline]
pub(crate) fn read_f16(block: &[u8], offset: usize) -> f32 {
    f16::from_le_bytes([block[offset], block[offset + 1]]).to_f32()
}

// =============================================================================
// Legacy 32-value block formats
// =============================================================================

/// Q4_0 dequantization.
///
/// Block structure (18 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-17: 32 4-bit quantized values packed in 16 bytes
///
/// Dequantization: `value = (quant - 8) * scale`
pub fn dequantize_q4_0_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    let qs = &block[2..18];

    for (j, &byte) in qs.iter().enumerate() {
        let x0 = (byte & 0x0F) as i32 - 8;
        let x1 = (byte >> 4) as i32 - 8;
        output[j] = x0 as f32 * d;
        output[j + QK / 2] = x1 as f32 * d;
    }
}

/// Q4_1 dequantization.
///
/// Block structure (20 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-3: minimum (f16)
/// - bytes 4-19: 32 4-bit quantized values
///
/// Dequantization: `value = quant * scale + min`
pub fn dequantize_q4_1_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    let m = read_f16(block, 2);
    let qs = &block[4..20];

    for (j, &byte) in qs.iter().enumerate() {
        output[j] = (byte & 0x0F) as f32 * d + m;
        output[j + QK / 2] = (byte >> 4) as f32 * d + m;
    }
}

/// Q5_0 dequantization.
///
/// Block structure (22 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-5: fifth bit of each value (u32, bit `j` belongs to value `j`)
/// - bytes 6-21: low 4 bits, packed like Q4_0
///
/// Dequantization: `value = (quant - 16) * scale`
pub fn dequantize_q5_0_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    let qh = LittleEndian::read_u32(&block[2..6]);
    let qs = &block[6..22];

    for (j, &byte) in qs.iter().enumerate() {
        let xh0 = (((qh >> j) << 4) & 0x10) as u8;
        let xh1 = ((qh >> (j + 12)) & 0x10) as u8;

        let x0 = ((byte & 0x0F) | xh0) as i32 - 16;
        let x1 = ((byte >> 4) | xh1) as i32 - 16;

        output[j] = x0 as f32 * d;
        output[j + QK / 2] = x1 as f32 * d;
    }
}

/// Q5_1 dequantization.
///
/// Block structure (24 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-3: minimum (f16)
/// - bytes 4-7: fifth bit of each value (u32)
/// - bytes 8-23: low 4 bits
///
/// Dequantization: `value = quant * scale + min`
pub fn dequantize_q5_1_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    let m = read_f16(block, 2);
    let qh = LittleEndian::read_u32(&block[4..8]);
    let qs = &block[8..24];

    for (j, &byte) in qs.iter().enumerate() {
        let xh0 = (((qh >> j) << 4) & 0x10) as u8;
        let xh1 = ((qh >> (j + 12)) & 0x10) as u8;

        output[j] = ((byte & 0x0F) | xh0) as f32 * d + m;
        output[j + QK / 2] = ((byte >> 4) | xh1) as f32 * d + m;
    }
}

/// Q8_0 dequantization.
///
/// Block structure (34 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-33: 32 8-bit quantized values
///
/// Dequantization: `value = quant * scale`
pub fn dequantize_q8_0_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    for (out, &q) in output.iter_mut().zip(&block[2..34]) {
        *out = q as i8 as f32 * d;
    }
}

/// Q8_1 dequantization.
///
/// Block structure (36 bytes per 32 values):
/// - bytes 0-1: scale (f16)
/// - bytes 2-3: `d * sum(qs)` (f16, unused when decoding)
/// - bytes 4-35: 32 8-bit quantized values
pub fn dequantize_q8_1_block(block: &[u8], output: &mut [f32; QK]) {
    let d = read_f16(block, 0);
    for (out, &q) in output.iter_mut().zip(&block[4..36]) {
        *out = q as i8 as f32 * d;
    }
}
