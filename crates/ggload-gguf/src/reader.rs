//! GGUF v3 container parser.
//!
//! The whole file must be resident in memory (a `Vec<u8>`, a memory map, ...).
//! Parsing reads the header, metadata and tensor descriptors and validates the
//! alignment padding that precedes the tensor data section. Tensor payloads
//! are never copied: [`GgufContent::tensor_data`] hands back a view into the
//! caller's buffer, and [`GgufContent::tensor_f32`] decodes on demand.
//!
//! # Example
//!
//! ```ignore
//! use ggload_gguf::GgufContent;
//!
//! let bytes = std::fs::read("model.gguf")?;
//! let content = GgufContent::parse(&bytes)?;
//!
//! if let Some(arch) = content.architecture() {
//!     println!("Architecture: {arch}");
//! }
//!
//! let weights = content.tensor_f32_by_name("blk.0.attn_q.weight", &bytes)?;
//! ```

use std::collections::HashMap;

use crate::config::ReaderConfig;
use crate::cursor::{ByteCursor, CursorError};
use crate::dequant::{self, DequantError};
use crate::types::keys;
use crate::{
    GgmlType, MetadataEntry, MetadataValue, MetadataValueType, TensorInfo, TensorSizeError,
    GGUF_DEFAULT_ALIGNMENT, GGUF_MAGIC, GGUF_MAX_TENSOR_NAME_BYTES, GGUF_VERSION,
};

/// Error type for GGUF reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GgufReadError {
    /// The input ended before a read could complete.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// Invalid GGUF magic number.
    #[error("Invalid GGUF magic: expected 0x47475546, got 0x{0:08X}")]
    InvalidMagic(u32),
    /// Unsupported GGUF version.
    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),
    /// Declared tensor count does not fit in memory indices.
    #[error("Invalid tensor count: {0}")]
    InvalidTensorCount(u64),
    /// Declared metadata count does not fit in memory indices.
    #[error("Invalid metadata count: {0}")]
    InvalidMetadataCount(u64),
    /// Declared array length does not fit in memory indices.
    #[error("Invalid array length: {0}")]
    InvalidArrayLength(u64),
    /// Declared string length does not fit in memory indices.
    #[error("Invalid string length: {0}")]
    InvalidStringCount(u64),
    /// Invalid UTF-8 in string.
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,
    /// Invalid metadata value type.
    #[error("Invalid metadata value type: {0}")]
    InvalidValueType(u32),
    /// Invalid tensor dtype.
    #[error("Invalid tensor type: {0}")]
    InvalidTensorType(u32),
    /// Tensor name longer than 64 bytes.
    #[error("Invalid tensor name (longer than 64 bytes): {0:?}")]
    InvalidTensorName(String),
    /// Dimension count does not fit in memory indices.
    #[error("Invalid tensor dimension count: {0}")]
    InvalidTensorDimensionCount(u32),
    /// `general.alignment` is zero or not a power of two.
    #[error("Invalid alignment: {0} is not a non-zero power of two")]
    InvalidAlignment(u32),
    /// Non-zero byte inside the padding before tensor data.
    #[error("Invalid alignment padding: byte 0x{byte:02X} at offset {offset}")]
    InvalidAlignmentPadding {
        /// Absolute file offset of the offending byte.
        offset: usize,
        /// The byte found there.
        byte: u8,
    },
    /// Two tensor descriptors share a name.
    #[error("Duplicate tensor name: {0:?}")]
    DuplicateTensorName(String),
    /// Metadata arrays nested deeper than the configured limit.
    #[error("Metadata arrays nested deeper than {max} levels")]
    ArrayNestingTooDeep {
        /// Configured maximum depth.
        max: usize,
    },
    /// The reader configuration is invalid.
    #[error("Invalid reader configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from slicing or decoding a tensor out of a parsed file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorDataError {
    /// No tensor descriptor at this index.
    #[error("Tensor index {index} out of range ({count} tensors)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of tensors in the file.
        count: usize,
    },
    /// The tensor's byte range lies outside the supplied buffer.
    #[error("Tensor {name:?} spans {size} bytes at offset {offset}, but the buffer holds {buffer_len} bytes")]
    OutOfBounds {
        /// Tensor name.
        name: String,
        /// Absolute start offset of the tensor data.
        offset: u64,
        /// Byte size of the tensor data.
        size: usize,
        /// Length of the buffer that was supplied.
        buffer_len: usize,
    },
    /// The tensor's size cannot be computed.
    #[error(transparent)]
    Size(#[from] TensorSizeError),
    /// The tensor's payload cannot be decoded.
    #[error(transparent)]
    Dequant(#[from] DequantError),
}

/// Fixed 24-byte file prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufHeader {
    /// Magic number (always [`GGUF_MAGIC`] once parsed).
    pub magic: u32,
    /// Format version (always [`GGUF_VERSION`] once parsed).
    pub version: u32,
    /// Number of tensor descriptors.
    pub tensor_count: u64,
    /// Number of metadata entries.
    pub metadata_count: u64,
}

impl GgufHeader {
    /// Size of the header on disk.
    pub const SIZE: usize = 24;

    /// Read and validate the header. Magic and version are checked before
    /// anything after them is consumed.
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self, GgufReadError> {
        let magic = cursor.read_u32_be()?;
        if magic != GGUF_MAGIC {
            return Err(GgufReadError::InvalidMagic(magic));
        }
        let version = cursor.read_u32()?;
        if version != GGUF_VERSION {
            return Err(GgufReadError::UnsupportedVersion(version));
        }
        let tensor_count = cursor.read_u64()?;
        let metadata_count = cursor.read_u64()?;
        Ok(Self {
            magic,
            version,
            tensor_count,
            metadata_count,
        })
    }
}

/// Parsed GGUF file: header, metadata and tensor descriptors.
///
/// Holds no reference to the source buffer; pass the same buffer back to the
/// tensor accessors.
#[derive(Debug, Clone)]
pub struct GgufContent {
    header: GgufHeader,
    metadata: Vec<MetadataEntry>,
    tensor_infos: Vec<TensorInfo>,
    tensor_name_to_index: HashMap<String, usize>,
    metadata_key_to_index: HashMap<String, usize>,
    tensor_data_offset: usize,
    alignment: usize,
}

impl GgufContent {
    /// Parse a complete GGUF file with the default [`ReaderConfig`].
    pub fn parse(data: &[u8]) -> Result<Self, GgufReadError> {
        Self::parse_with_config(data, &ReaderConfig::default())
    }

    /// Parse a complete GGUF file.
    pub fn parse_with_config(data: &[u8], config: &ReaderConfig) -> Result<Self, GgufReadError> {
        config
            .validate()
            .map_err(|e| GgufReadError::InvalidConfig(e.to_string()))?;

        let mut cursor = ByteCursor::new(data);
        let header = GgufHeader::read(&mut cursor)?;

        let metadata_count = usize::try_from(header.metadata_count)
            .map_err(|_| GgufReadError::InvalidMetadataCount(header.metadata_count))?;
        let mut metadata = Vec::with_capacity(metadata_count.min(cursor.remaining()));
        for _ in 0..metadata_count {
            metadata.push(read_metadata_entry(&mut cursor, config.max_array_depth)?);
        }

        let tensor_count = usize::try_from(header.tensor_count)
            .map_err(|_| GgufReadError::InvalidTensorCount(header.tensor_count))?;
        let mut tensor_infos = Vec::with_capacity(tensor_count.min(cursor.remaining()));
        for _ in 0..tensor_count {
            tensor_infos.push(read_tensor_info(&mut cursor)?);
        }

        // Last occurrence of a key wins.
        let metadata_key_to_index: HashMap<String, usize> = metadata
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.key.clone(), i))
            .collect();

        let alignment = match metadata_key_to_index
            .get(keys::GENERAL_ALIGNMENT)
            .map(|&i| &metadata[i].value)
        {
            Some(MetadataValue::Uint32(a)) => {
                if *a == 0 || !a.is_power_of_two() {
                    return Err(GgufReadError::InvalidAlignment(*a));
                }
                *a as usize
            }
            _ => GGUF_DEFAULT_ALIGNMENT as usize,
        };

        let position = cursor.position();
        if position % alignment != 0 {
            let padding = cursor.read_bytes(alignment - position % alignment)?;
            if let Some(i) = padding.iter().position(|&b| b != 0) {
                return Err(GgufReadError::InvalidAlignmentPadding {
                    offset: position + i,
                    byte: padding[i],
                });
            }
        }
        let tensor_data_offset = cursor.position();

        let mut tensor_name_to_index = HashMap::with_capacity(tensor_infos.len());
        for (i, info) in tensor_infos.iter().enumerate() {
            let previous = tensor_name_to_index.insert(info.name.clone(), i);
            if previous.is_some() && !config.allow_duplicate_tensor_names {
                return Err(GgufReadError::DuplicateTensorName(info.name.clone()));
            }
        }

        tracing::debug!(
            metadata = metadata.len(),
            tensors = tensor_infos.len(),
            alignment,
            tensor_data_offset,
            "Parsed GGUF container"
        );

        Ok(Self {
            header,
            metadata,
            tensor_infos,
            tensor_name_to_index,
            metadata_key_to_index,
            tensor_data_offset,
            alignment,
        })
    }

    /// The file header.
    pub fn header(&self) -> &GgufHeader {
        &self.header
    }

    /// Metadata entries in file order, duplicates included.
    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    /// Tensor descriptors in file order.
    pub fn tensor_infos(&self) -> &[TensorInfo] {
        &self.tensor_infos
    }

    /// Absolute file offset where tensor data begins.
    pub fn tensor_data_offset(&self) -> usize {
        self.tensor_data_offset
    }

    /// Alignment of the tensor data section.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Get a metadata value by key.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata_key_to_index
            .get(key)
            .map(|&i| &self.metadata[i].value)
    }

    /// Get the model architecture from metadata.
    pub fn architecture(&self) -> Option<&str> {
        self.metadata_value(keys::GENERAL_ARCHITECTURE)?.as_str()
    }

    /// Position of the named tensor in [`GgufContent::tensor_infos`].
    pub fn tensor_index(&self, name: &str) -> Option<usize> {
        self.tensor_name_to_index.get(name).copied()
    }

    /// Get tensor info by name.
    pub fn tensor_info(&self, name: &str) -> Option<&TensorInfo> {
        self.tensor_index(name).map(|i| &self.tensor_infos[i])
    }

    /// Get the total number of tensors.
    pub fn num_tensors(&self) -> usize {
        self.tensor_infos.len()
    }

    /// Raw bytes of a tensor, borrowed from `data`.
    ///
    /// `data` must be the buffer this container was parsed from.
    pub fn tensor_data<'a>(&self, index: usize, data: &'a [u8]) -> Result<&'a [u8], TensorDataError> {
        let info = self.info_at(index)?;
        let size = info.byte_size_checked()?;

        let start = (self.tensor_data_offset as u64).checked_add(info.offset);
        let range = start.and_then(|start| {
            let start = usize::try_from(start).ok()?;
            let end = start.checked_add(size)?;
            (end <= data.len()).then_some(start..end)
        });

        match range {
            Some(range) => Ok(&data[range]),
            None => Err(TensorDataError::OutOfBounds {
                name: info.name.clone(),
                offset: (self.tensor_data_offset as u64).saturating_add(info.offset),
                size,
                buffer_len: data.len(),
            }),
        }
    }

    /// Decode a tensor to `f32`.
    pub fn tensor_f32(&self, index: usize, data: &[u8]) -> Result<Vec<f32>, TensorDataError> {
        let raw = self.tensor_data(index, data)?;
        let info = &self.tensor_infos[index];
        let n_elements = info.n_elements_checked()?;
        tracing::trace!(tensor = %info.name, dtype = %info.dtype, n_elements, "Decoding tensor");
        Ok(dequant::dequantize(raw, info.dtype, n_elements)?)
    }

    /// [`GgufContent::tensor_data`] by name; `Ok(None)` if no such tensor.
    pub fn tensor_data_by_name<'a>(
        &self,
        name: &str,
        data: &'a [u8],
    ) -> Result<Option<&'a [u8]>, TensorDataError> {
        self.tensor_index(name)
            .map(|i| self.tensor_data(i, data))
            .transpose()
    }

    /// [`GgufContent::tensor_f32`] by name; `Ok(None)` if no such tensor.
    pub fn tensor_f32_by_name(
        &self,
        name: &str,
        data: &[u8],
    ) -> Result<Option<Vec<f32>>, TensorDataError> {
        self.tensor_index(name)
            .map(|i| self.tensor_f32(i, data))
            .transpose()
    }

    fn info_at(&self, index: usize) -> Result<&TensorInfo, TensorDataError> {
        self.tensor_infos
            .get(index)
            .ok_or(TensorDataError::IndexOutOfRange {
                index,
                count: self.tensor_infos.len(),
            })
    }
}

/// Read a GGUF string: u64 byte length, then strict UTF-8 with no terminator.
pub(crate) fn read_string(cursor: &mut ByteCursor<'_>) -> Result<String, GgufReadError> {
    let len64 = cursor.read_u64()?;
    let len = usize::try_from(len64).map_err(|_| GgufReadError::InvalidStringCount(len64))?;
    let bytes = cursor.read_bytes(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| GgufReadError::InvalidUtf8)
}

fn read_value_type(cursor: &mut ByteCursor<'_>) -> Result<MetadataValueType, GgufReadError> {
    let raw = cursor.read_u32()?;
    MetadataValueType::try_from(raw).map_err(GgufReadError::InvalidValueType)
}

fn read_metadata_entry(
    cursor: &mut ByteCursor<'_>,
    max_array_depth: usize,
) -> Result<MetadataEntry, GgufReadError> {
    let key = read_string(cursor)?;
    let value_type = read_value_type(cursor)?;
    let value = read_value(cursor, value_type, max_array_depth)?;
    Ok(MetadataEntry { key, value })
}

/// Read a non-array value.
fn read_scalar(
    cursor: &mut ByteCursor<'_>,
    value_type: MetadataValueType,
) -> Result<MetadataValue, GgufReadError> {
    let value = match value_type {
        MetadataValueType::Uint8 => MetadataValue::Uint8(cursor.read_u8()?),
        MetadataValueType::Int8 => MetadataValue::Int8(cursor.read_i8()?),
        MetadataValueType::Uint16 => MetadataValue::Uint16(cursor.read_u16()?),
        MetadataValueType::Int16 => MetadataValue::Int16(cursor.read_i16()?),
        MetadataValueType::Uint32 => MetadataValue::Uint32(cursor.read_u32()?),
        MetadataValueType::Int32 => MetadataValue::Int32(cursor.read_i32()?),
        MetadataValueType::Float32 => MetadataValue::Float32(cursor.read_f32()?),
        MetadataValueType::Bool => MetadataValue::Bool(cursor.read_u8()? != 0),
        MetadataValueType::String => MetadataValue::String(read_string(cursor)?),
        MetadataValueType::Uint64 => MetadataValue::Uint64(cursor.read_u64()?),
        MetadataValueType::Int64 => MetadataValue::Int64(cursor.read_i64()?),
        MetadataValueType::Float64 => MetadataValue::Float64(cursor.read_f64()?),
        // Arrays go through `read_value`.
        MetadataValueType::Array => {
            return Err(GgufReadError::InvalidValueType(MetadataValueType::Array as u32))
        }
    };
    Ok(value)
}

/// An array whose elements are still being read.
struct OpenArray {
    elem_type: MetadataValueType,
    remaining: usize,
    values: Vec<MetadataValue>,
}

impl OpenArray {
    fn read_header(cursor: &mut ByteCursor<'_>) -> Result<Self, GgufReadError> {
        let elem_type = read_value_type(cursor)?;
        let count64 = cursor.read_u64()?;
        let count =
            usize::try_from(count64).map_err(|_| GgufReadError::InvalidArrayLength(count64))?;
        Ok(Self {
            elem_type,
            remaining: count,
            // Every element occupies at least one byte.
            values: Vec::with_capacity(count.min(cursor.remaining())),
        })
    }

    fn into_value(self) -> MetadataValue {
        MetadataValue::Array(self.elem_type, self.values)
    }
}

/// Read a value of `value_type`. Nested arrays are tracked on a heap stack,
/// so input nesting never grows the call stack.
fn read_value(
    cursor: &mut ByteCursor<'_>,
    value_type: MetadataValueType,
    max_array_depth: usize,
) -> Result<MetadataValue, GgufReadError> {
    if value_type != MetadataValueType::Array {
        return read_scalar(cursor, value_type);
    }

    let mut parents: Vec<OpenArray> = Vec::new();
    let mut current = OpenArray::read_header(cursor)?;
    loop {
        if current.remaining == 0 {
            let value = current.into_value();
            match parents.pop() {
                Some(mut parent) => {
                    parent.values.push(value);
                    current = parent;
                }
                None => return Ok(value),
            }
            continue;
        }

        current.remaining -= 1;
        if current.elem_type == MetadataValueType::Array {
            // `current` sits at depth parents.len() + 1.
            if parents.len() + 1 >= max_array_depth {
                return Err(GgufReadError::ArrayNestingTooDeep {
                    max: max_array_depth,
                });
            }
            let child = OpenArray::read_header(cursor)?;
            parents.push(std::mem::replace(&mut current, child));
        } else {
            let value = read_scalar(cursor, current.elem_type)?;
            current.values.push(value);
        }
    }
}

fn read_tensor_info(cursor: &mut ByteCursor<'_>) -> Result<TensorInfo, GgufReadError> {
    let name = read_string(cursor)?;
    if name.len() > GGUF_MAX_TENSOR_NAME_BYTES {
        return Err(GgufReadError::InvalidTensorName(name));
    }

    let n_dims = cursor.read_u32()?;
    let n_dims_usize =
        usize::try_from(n_dims).map_err(|_| GgufReadError::InvalidTensorDimensionCount(n_dims))?;
    let mut dimensions = Vec::with_capacity(n_dims_usize.min(cursor.remaining() / 8));
    for _ in 0..n_dims_usize {
        dimensions.push(cursor.read_u64()?);
    }

    let dtype_raw = cursor.read_u32()?;
    let dtype = GgmlType::try_from(dtype_raw).map_err(GgufReadError::InvalidTensorType)?;
    let offset = cursor.read_u64()?;

    Ok(TensorInfo {
        name,
        dimensions,
        dtype,
        offset,
    })
}
