//! GGUF format types and constants.

use std::fmt;
use std::hash::{Hash, Hasher};

/// GGUF magic number: the ASCII bytes "GGUF" read as a big-endian `u32`.
pub const GGUF_MAGIC: u32 = 0x4747_5546;

/// The only GGUF version this crate reads.
pub const GGUF_VERSION: u32 = 3;

/// Default alignment for tensor data.
pub const GGUF_DEFAULT_ALIGNMENT: u32 = 32;

/// Maximum tensor name length in bytes.
pub const GGUF_MAX_TENSOR_NAME_BYTES: usize = 64;

/// GGML tensor data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GgmlType {
    /// 32-bit float
    F32 = 0,
    /// 16-bit float
    F16 = 1,
    /// 4-bit quantization (type 0)
    Q4_0 = 2,
    /// 4-bit quantization (type 1)
    Q4_1 = 3,
    /// 5-bit quantization (type 0)
    Q5_0 = 6,
    /// 5-bit quantization (type 1)
    Q5_1 = 7,
    /// 8-bit quantization (type 0)
    Q8_0 = 8,
    /// 8-bit quantization (type 1)
    Q8_1 = 9,
    /// K-quant 2-bit
    Q2K = 10,
    /// K-quant 3-bit
    Q3K = 11,
    /// K-quant 4-bit
    Q4K = 12,
    /// K-quant 5-bit
    Q5K = 13,
    /// K-quant 6-bit
    Q6K = 14,
    /// K-quant 8-bit
    Q8K = 15,
    /// IQ2 extra-extra-small
    Iq2Xxs = 16,
    /// IQ2 extra-small
    Iq2Xs = 17,
    /// IQ3 extra-extra-small
    Iq3Xxs = 18,
    /// IQ1 small
    Iq1S = 19,
    /// IQ4 non-linear
    Iq4Nl = 20,
    /// IQ3 small
    Iq3S = 21,
    /// IQ2 small
    Iq2S = 22,
    /// IQ4 extra-small
    Iq4Xs = 23,
    /// 8-bit integer
    I8 = 24,
    /// 16-bit integer
    I16 = 25,
    /// 32-bit integer
    I32 = 26,
    /// 64-bit integer
    I64 = 27,
    /// 64-bit float
    F64 = 28,
    /// IQ1 medium
    Iq1M = 29,
    /// BFloat16
    Bf16 = 30,
    /// Ternary, base-3 packed
    Tq1_0 = 34,
    /// Ternary, 2 bits per trit
    Tq2_0 = 35,
    /// Microscaling FP4 (E2M1 values, E8M0 block exponent)
    Mxfp4 = 39,
}

impl GgmlType {
    /// Every type, in wire-id order.
    pub const ALL: [GgmlType; 32] = [
        Self::F32,
        Self::F16,
        Self::Q4_0,
        Self::Q4_1,
        Self::Q5_0,
        Self::Q5_1,
        Self::Q8_0,
        Self::Q8_1,
        Self::Q2K,
        Self::Q3K,
        Self::Q4K,
        Self::Q5K,
        Self::Q6K,
        Self::Q8K,
        Self::Iq2Xxs,
        Self::Iq2Xs,
        Self::Iq3Xxs,
        Self::Iq1S,
        Self::Iq4Nl,
        Self::Iq3S,
        Self::Iq2S,
        Self::Iq4Xs,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::F64,
        Self::Iq1M,
        Self::Bf16,
        Self::Tq1_0,
        Self::Tq2_0,
        Self::Mxfp4,
    ];

    /// Get the number of bytes per block.
    ///
    /// For non-quantized types a block is a single element.
    pub fn type_size(&self) -> usize {
        match self {
            Self::I8 => 1,
            Self::F16 | Self::Bf16 | Self::I16 => 2,
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
            Self::Q4_0 => 18, // 2 (d) + 16 (qs)
            Self::Q4_1 => 20, // 2 (d) + 2 (m) + 16 (qs)
            Self::Q5_0 => 22, // 2 (d) + 4 (qh) + 16 (qs)
            Self::Q5_1 => 24, // 2 (d) + 2 (m) + 4 (qh) + 16 (qs)
            Self::Q8_0 => 34, // 2 (d) + 32 (qs)
            Self::Q8_1 => 36, // 2 (d) + 2 (s) + 32 (qs)
            Self::Q2K => 84,
            Self::Q3K => 110,
            Self::Q4K => 144,
            Self::Q5K => 176,
            Self::Q6K => 210,
            Self::Q8K => 292,
            Self::Iq2Xxs => 66,
            Self::Iq2Xs => 74,
            Self::Iq2S => 82,
            Self::Iq3Xxs => 98,
            Self::Iq3S => 110,
            Self::Iq1S => 50,
            Self::Iq1M => 56,
            Self::Iq4Nl => 18,
            Self::Iq4Xs => 136,
            Self::Tq1_0 => 54,
            Self::Tq2_0 => 66,
            Self::Mxfp4 => 17,
        }
    }

    /// Get the block size (number of elements per block).
    pub fn block_size(&self) -> usize {
        match self {
            Self::F32 | Self::F16 | Self::Bf16 | Self::F64 => 1,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 1,
            Self::Q4_0 | Self::Q4_1 | Self::Q5_0 | Self::Q5_1 | Self::Q8_0 | Self::Q8_1 => 32,
            Self::Iq4Nl | Self::Mxfp4 => 32,
            Self::Q2K | Self::Q3K | Self::Q4K | Self::Q5K | Self::Q6K | Self::Q8K => 256,
            Self::Iq1S
            | Self::Iq1M
            | Self::Iq2Xxs
            | Self::Iq2Xs
            | Self::Iq2S
            | Self::Iq3Xxs
            | Self::Iq3S
            | Self::Iq4Xs => 256,
            Self::Tq1_0 | Self::Tq2_0 => 256,
        }
    }

    /// Whether values are stored in multi-element blocks.
    pub fn is_quantized(&self) -> bool {
        self.block_size() > 1
    }

    /// Calculate the byte size for a tensor with given number of elements.
    ///
    /// A trailing partial block still occupies a whole block. Saturates at
    /// `usize::MAX`; use [`GgmlType::tensor_size_checked`] for untrusted counts.
    pub fn tensor_size(&self, n_elements: usize) -> usize {
        n_elements
            .div_ceil(self.block_size())
            .saturating_mul(self.type_size())
    }

    /// Calculate the byte size with checked arithmetic.
    ///
    /// Returns `None` if the calculation would overflow.
    pub fn tensor_size_checked(&self, n_elements: usize) -> Option<usize> {
        n_elements
            .div_ceil(self.block_size())
            .checked_mul(self.type_size())
    }

    /// Canonical GGML name, e.g. `Q4_K`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::F32 => "F32",
            Self::F16 => "F16",
            Self::Q4_0 => "Q4_0",
            Self::Q4_1 => "Q4_1",
            Self::Q5_0 => "Q5_0",
            Self::Q5_1 => "Q5_1",
            Self::Q8_0 => "Q8_0",
            Self::Q8_1 => "Q8_1",
            Self::Q2K => "Q2_K",
            Self::Q3K => "Q3_K",
            Self::Q4K => "Q4_K",
            Self::Q5K => "Q5_K",
            Self::Q6K => "Q6_K",
            Self::Q8K => "Q8_K",
            Self::Iq2Xxs => "IQ2_XXS",
            Self::Iq2Xs => "IQ2_XS",
            Self::Iq3Xxs => "IQ3_XXS",
            Self::Iq1S => "IQ1_S",
            Self::Iq4Nl => "IQ4_NL",
            Self::Iq3S => "IQ3_S",
            Self::Iq2S => "IQ2_S",
            Self::Iq4Xs => "IQ4_XS",
            Self::I8 => "I8",
            Self::I16 => "I16",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::F64 => "F64",
            Self::Iq1M => "IQ1_M",
            Self::Bf16 => "BF16",
            Self::Tq1_0 => "TQ1_0",
            Self::Tq2_0 => "TQ2_0",
            Self::Mxfp4 => "MXFP4",
        }
    }
}

impl fmt::Display for GgmlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl TryFrom<u32> for GgmlType {
    /// The unrecognised wire id.
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| *ty as u32 == value)
            .ok_or(value)
    }
}

/// GGUF metadata value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MetadataValueType {
    /// 8-bit unsigned integer
    Uint8 = 0,
    /// 8-bit signed integer
    Int8 = 1,
    /// 16-bit unsigned integer
    Uint16 = 2,
    /// 16-bit signed integer
    Int16 = 3,
    /// 32-bit unsigned integer
    Uint32 = 4,
    /// 32-bit signed integer
    Int32 = 5,
    /// 32-bit float
    Float32 = 6,
    /// Boolean (1 byte)
    Bool = 7,
    /// UTF-8 string with length prefix
    String = 8,
    /// Array of values
    Array = 9,
    /// 64-bit unsigned integer
    Uint64 = 10,
    /// 64-bit signed integer
    Int64 = 11,
    /// 64-bit float
    Float64 = 12,
}

impl MetadataValueType {
    /// Lower-case name used in human-readable output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Array => "array",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for MetadataValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl TryFrom<u32> for MetadataValueType {
    /// The unrecognised wire id.
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Uint8,
            1 => Self::Int8,
            2 => Self::Uint16,
            3 => Self::Int16,
            4 => Self::Uint32,
            5 => Self::Int32,
            6 => Self::Float32,
            7 => Self::Bool,
            8 => Self::String,
            9 => Self::Array,
            10 => Self::Uint64,
            11 => Self::Int64,
            12 => Self::Float64,
            other => return Err(other),
        })
    }
}

/// A metadata value in GGUF format.
///
/// Equality and hashing compare floats by bit pattern, so a parsed value is
/// always equal to itself (including NaN payloads) and `-0.0 != 0.0`.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    /// 8-bit unsigned integer
    Uint8(u8),
    /// 8-bit signed integer
    Int8(i8),
    /// 16-bit unsigned integer
    Uint16(u16),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit unsigned integer
    Uint32(u32),
    /// 32-bit signed integer
    Int32(i32),
    /// 32-bit float
    Float32(f32),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// Array of values, all of the declared element type
    Array(MetadataValueType, Vec<MetadataValue>),
    /// 64-bit unsigned integer
    Uint64(u64),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit float
    Float64(f64),
}

impl MetadataValue {
    /// Get the type of this value.
    pub fn value_type(&self) -> MetadataValueType {
        match self {
            Self::Uint8(_) => MetadataValueType::Uint8,
            Self::Int8(_) => MetadataValueType::Int8,
            Self::Uint16(_) => MetadataValueType::Uint16,
            Self::Int16(_) => MetadataValueType::Int16,
            Self::Uint32(_) => MetadataValueType::Uint32,
            Self::Int32(_) => MetadataValueType::Int32,
            Self::Float32(_) => MetadataValueType::Float32,
            Self::Bool(_) => MetadataValueType::Bool,
            Self::String(_) => MetadataValueType::String,
            Self::Array(..) => MetadataValueType::Array,
            Self::Uint64(_) => MetadataValueType::Uint64,
            Self::Int64(_) => MetadataValueType::Int64,
            Self::Float64(_) => MetadataValueType::Float64,
        }
    }

    /// Get the declared element type for arrays.
    pub fn array_element_type(&self) -> Option<MetadataValueType> {
        match self {
            Self::Array(elem_type, _) => Some(*elem_type),
            _ => None,
        }
    }

    /// Borrow the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Borrow the array elements.
    pub fn as_array(&self) -> Option<&[MetadataValue]> {
        match self {
            Self::Array(_, values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Any unsigned integer, widened to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Uint8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Uint64(v) => Some(v),
            _ => None,
        }
    }

    /// Any signed integer, widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Either float width, widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float32(v) => Some(v.into()),
            Self::Float64(v) => Some(v),
            _ => None,
        }
    }

    /// The boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uint8(a), Self::Uint8(b)) => a == b,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Uint16(a), Self::Uint16(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Uint32(a), Self::Uint32(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(ta, va), Self::Array(tb, vb)) => ta == tb && va == vb,
            (Self::Uint64(a), Self::Uint64(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for MetadataValue {}

impl Hash for MetadataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value_type().hash(state);
        match self {
            Self::Uint8(v) => v.hash(state),
            Self::Int8(v) => v.hash(state),
            Self::Uint16(v) => v.hash(state),
            Self::Int16(v) => v.hash(state),
            Self::Uint32(v) => v.hash(state),
            Self::Int32(v) => v.hash(state),
            Self::Float32(v) => v.to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
            Self::String(v) => v.hash(state),
            Self::Array(elem_type, values) => {
                elem_type.hash(state);
                values.hash(state);
            }
            Self::Uint64(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint8(v) => write!(f, "{v} (uint8)"),
            Self::Int8(v) => write!(f, "{v} (int8)"),
            Self::Uint16(v) => write!(f, "{v} (uint16)"),
            Self::Int16(v) => write!(f, "{v} (int16)"),
            Self::Uint32(v) => write!(f, "{v} (uint32)"),
            Self::Int32(v) => write!(f, "{v} (int32)"),
            Self::Float32(v) => write!(f, "{v} (float32)"),
            Self::Bool(v) => write!(f, "{v} (bool)"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Array(elem_type, values) => write!(f, "[{} x {elem_type}]", values.len()),
            Self::Uint64(v) => write!(f, "{v} (uint64)"),
            Self::Int64(v) => write!(f, "{v} (int64)"),
            Self::Float64(v) => write!(f, "{v} (float64)"),
        }
    }
}

/// A metadata key/value pair, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// Metadata key, e.g. `general.architecture`.
    pub key: String,
    /// Parsed value; its type is the tag read from the file.
    pub value: MetadataValue,
}

/// Information about a tensor in the GGUF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    /// Name of the tensor (max 64 bytes).
    pub name: String,
    /// Dimensions of the tensor, in file order (innermost first).
    pub dimensions: Vec<u64>,
    /// Data type of the tensor.
    pub dtype: GgmlType,
    /// Offset of tensor data (relative to tensor_data section).
    pub offset: u64,
}

/// Error type for tensor size calculations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorSizeError {
    /// Integer overflow in element count calculation.
    #[error("Integer overflow calculating tensor element count")]
    ElementCountOverflow,
    /// Tensor element count exceeds usize limits.
    #[error("Tensor element count {0} exceeds system limits")]
    ElementCountTooLarge(u64),
    /// Integer overflow in byte size calculation.
    #[error("Integer overflow calculating tensor byte size")]
    ByteSizeOverflow,
}

impl TensorInfo {
    /// Create a new tensor info.
    pub fn new(name: impl Into<String>, dimensions: Vec<u64>, dtype: GgmlType, offset: u64) -> Self {
        Self {
            name: name.into(),
            dimensions,
            dtype,
            offset,
        }
    }

    /// Number of dimensions.
    pub fn n_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// Get the number of elements in the tensor with checked arithmetic.
    ///
    /// A tensor with no dimensions holds a single element.
    pub fn n_elements_checked(&self) -> Result<usize, TensorSizeError> {
        let total = self
            .dimensions
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
            .ok_or(TensorSizeError::ElementCountOverflow)?;

        usize::try_from(total).map_err(|_| TensorSizeError::ElementCountTooLarge(total))
    }

    /// Get the byte size of the tensor data with checked arithmetic.
    pub fn byte_size_checked(&self) -> Result<usize, TensorSizeError> {
        let n_elements = self.n_elements_checked()?;
        self.dtype
            .tensor_size_checked(n_elements)
            .ok_or(TensorSizeError::ByteSizeOverflow)
    }
}

/// Standard metadata keys for GGUF files.
pub mod keys {
    /// Model architecture name
    pub const GENERAL_ARCHITECTURE: &str = "general.architecture";
    /// Quantization format version
    pub const GENERAL_QUANTIZATION_VERSION: &str = "general.quantization_version";
    /// Data alignment
    pub const GENERAL_ALIGNMENT: &str = "general.alignment";
    /// Model name
    pub const GENERAL_NAME: &str = "general.name";
    /// File type (quantization)
    pub const GENERAL_FILE_TYPE: &str = "general.file_type";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ggml_type_conversion() {
        assert_eq!(GgmlType::try_from(0), Ok(GgmlType::F32));
        assert_eq!(GgmlType::try_from(2), Ok(GgmlType::Q4_0));
        assert_eq!(GgmlType::try_from(10), Ok(GgmlType::Q2K));
        assert_eq!(GgmlType::try_from(30), Ok(GgmlType::Bf16));
        assert_eq!(GgmlType::try_from(39), Ok(GgmlType::Mxfp4));
        // Retired ids 4/5 (Q4_2/Q4_3) and the gap 31..33 are not valid.
        assert_eq!(GgmlType::try_from(4), Err(4));
        assert_eq!(GgmlType::try_from(31), Err(31));
        assert_eq!(GgmlType::try_from(255), Err(255));
    }

    #[test]
    fn test_all_types_round_trip_ids() {
        for ty in GgmlType::ALL {
            assert_eq!(GgmlType::try_from(ty as u32), Ok(ty));
        }
    }

    #[test]
    fn test_block_constants() {
        let expected = [
            (GgmlType::F32, 1, 4),
            (GgmlType::F16, 1, 2),
            (GgmlType::Bf16, 1, 2),
            (GgmlType::I8, 1, 1),
            (GgmlType::I16, 1, 2),
            (GgmlType::I32, 1, 4),
            (GgmlType::I64, 1, 8),
            (GgmlType::F64, 1, 8),
            (GgmlType::Q4_0, 32, 18),
            (GgmlType::Q4_1, 32, 20),
            (GgmlType::Q5_0, 32, 22),
            (GgmlType::Q5_1, 32, 24),
            (GgmlType::Q8_0, 32, 34),
            (GgmlType::Q8_1, 32, 36),
            (GgmlType::Q2K, 256, 84),
            (GgmlType::Q3K, 256, 110),
            (GgmlType::Q4K, 256, 144),
            (GgmlType::Q5K, 256, 176),
            (GgmlType::Q6K, 256, 210),
            (GgmlType::Q8K, 256, 292),
            (GgmlType::Iq4Nl, 32, 18),
            (GgmlType::Iq4Xs, 256, 136),
            (GgmlType::Tq1_0, 256, 54),
            (GgmlType::Tq2_0, 256, 66),
            (GgmlType::Mxfp4, 32, 17),
        ];
        for (ty, block, bytes) in expected {
            assert_eq!(ty.block_size(), block, "{ty} block size");
            assert_eq!(ty.type_size(), bytes, "{ty} type size");
        }
    }

    #[test]
    fn test_tensor_size_rounds_partial_blocks_up() {
        assert_eq!(GgmlType::Q4_0.tensor_size(32), 18);
        assert_eq!(GgmlType::Q4_0.tensor_size(33), 36);
        assert_eq!(GgmlType::Q4K.tensor_size(257), 288);
        assert_eq!(GgmlType::F32.tensor_size(7), 28);
        assert_eq!(GgmlType::Q8_0.tensor_size(0), 0);
    }

    #[test]
    fn test_tensor_size_checked_overflow() {
        assert_eq!(GgmlType::F64.tensor_size_checked(usize::MAX), None);
        assert_eq!(GgmlType::Q8K.tensor_size_checked(usize::MAX), None);
        assert_eq!(GgmlType::F32.tensor_size_checked(usize::MAX / 2 + 1), None);
        // Fewer bytes than elements: still representable.
        assert!(GgmlType::Q4_0.tensor_size_checked(usize::MAX).is_some());
        assert_eq!(GgmlType::I8.tensor_size_checked(usize::MAX), Some(usize::MAX));
    }

    #[test]
    fn test_element_count() {
        let info = TensorInfo::new("w", vec![4, 8, 2], GgmlType::F32, 0);
        assert_eq!(info.n_elements_checked(), Ok(64));
        assert_eq!(info.byte_size_checked(), Ok(256));

        let scalar = TensorInfo::new("s", vec![], GgmlType::F32, 0);
        assert_eq!(scalar.n_dimensions(), 0);
        assert_eq!(scalar.n_elements_checked(), Ok(1));
        assert_eq!(scalar.byte_size_checked(), Ok(4));

        let huge = TensorInfo::new("h", vec![u64::MAX, 2], GgmlType::F32, 0);
        assert_eq!(
            huge.n_elements_checked(),
            Err(TensorSizeError::ElementCountOverflow)
        );
    }

    #[test]
    fn test_metadata_float_equality_is_bitwise() {
        let nan = MetadataValue::Float32(f32::from_bits(0x7FC0_0001));
        assert_eq!(nan, nan.clone());
        assert_ne!(MetadataValue::Float64(0.0), MetadataValue::Float64(-0.0));
        assert_ne!(MetadataValue::Uint32(1), MetadataValue::Uint64(1));

        let mut set = HashSet::new();
        set.insert(nan.clone());
        assert!(set.contains(&nan));
    }

    #[test]
    fn test_metadata_accessors() {
        let array = MetadataValue::Array(
            MetadataValueType::String,
            vec![MetadataValue::String("a".into())],
        );
        assert_eq!(array.value_type(), MetadataValueType::Array);
        assert_eq!(array.array_element_type(), Some(MetadataValueType::String));
        assert_eq!(array.as_array().map(<[_]>::len), Some(1));
        assert_eq!(MetadataValue::Uint16(7).as_u64(), Some(7));
        assert_eq!(MetadataValue::Int8(-3).as_i64(), Some(-3));
        assert_eq!(MetadataValue::Int8(-3).as_u64(), None);
        assert_eq!(MetadataValue::Float32(0.5).as_f64(), Some(0.5));
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(MetadataValue::Uint32(32).to_string(), "32 (uint32)");
        assert_eq!(MetadataValue::String("llama".into()).to_string(), "\"llama\"");
        let array = MetadataValue::Array(
            MetadataValueType::Int32,
            vec![MetadataValue::Int32(1), MetadataValue::Int32(2)],
        );
        assert_eq!(array.to_string(), "[2 x int32]");
        assert_eq!(GgmlType::Q4K.to_string(), "Q4_K");
    }
}
