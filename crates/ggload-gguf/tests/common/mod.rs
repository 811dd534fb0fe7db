//! Byte-level builders for synthetic GGUF files.

#![allow(dead_code)]

use ggload_gguf::GgmlType;

/// Value type ids as written on disk.
pub mod tag {
    pub const UINT8: u32 = 0;
    pub const INT8: u32 = 1;
    pub const UINT16: u32 = 2;
    pub const INT16: u32 = 3;
    pub const UINT32: u32 = 4;
    pub const INT32: u32 = 5;
    pub const FLOAT32: u32 = 6;
    pub const BOOL: u32 = 7;
    pub const STRING: u32 = 8;
    pub const ARRAY: u32 = 9;
    pub const UINT64: u32 = 10;
    pub const INT64: u32 = 11;
    pub const FLOAT64: u32 = 12;
}

/// 24-byte GGUF v3 header.
pub fn header(tensor_count: u64, metadata_count: u64) -> Vec<u8> {
    let mut out = b"GGUF".to_vec();
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&tensor_count.to_le_bytes());
    out.extend_from_slice(&metadata_count.to_le_bytes());
    out
}

/// Length-prefixed string.
pub fn gguf_string(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u64).to_le_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

/// Metadata entry with an already-encoded value.
pub fn metadata_entry(key: &str, value_type: u32, value: &[u8]) -> Vec<u8> {
    let mut out = gguf_string(key);
    out.extend_from_slice(&value_type.to_le_bytes());
    out.extend_from_slice(value);
    out
}

/// Encoded array value: element type, count, then the encoded elements.
pub fn array_value(elem_type: u32, count: u64, elements: &[u8]) -> Vec<u8> {
    let mut out = elem_type.to_le_bytes().to_vec();
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(elements);
    out
}

/// Tensor descriptor.
pub fn tensor_descriptor(name: &str, dims: &[u64], dtype: u32, offset: u64) -> Vec<u8> {
    let mut out = gguf_string(name);
    out.extend_from_slice(&(dims.len() as u32).to_le_bytes());
    for dim in dims {
        out.extend_from_slice(&dim.to_le_bytes());
    }
    out.extend_from_slice(&dtype.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out
}

/// Assembles a well-formed file from metadata entries and tensors.
pub struct GgufBuilder {
    metadata: Vec<Vec<u8>>,
    descriptors: Vec<Vec<u8>>,
    data: Vec<u8>,
    alignment: usize,
}

impl Default for GgufBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GgufBuilder {
    pub fn new() -> Self {
        Self {
            metadata: Vec::new(),
            descriptors: Vec::new(),
            data: Vec::new(),
            alignment: 32,
        }
    }

    /// Write `general.alignment` and pad with it.
    pub fn alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment as usize;
        self.metadata_u32("general.alignment", alignment)
    }

    pub fn metadata(mut self, key: &str, value_type: u32, value: &[u8]) -> Self {
        self.metadata.push(metadata_entry(key, value_type, value));
        self
    }

    pub fn metadata_u32(self, key: &str, value: u32) -> Self {
        self.metadata(key, tag::UINT32, &value.to_le_bytes())
    }

    pub fn metadata_string(self, key: &str, value: &str) -> Self {
        self.metadata(key, tag::STRING, &gguf_string(value))
    }

    /// Add a tensor whose payload is placed at the next aligned data offset.
    pub fn tensor(mut self, name: &str, dims: &[u64], dtype: GgmlType, payload: &[u8]) -> Self {
        let offset = self.data.len().next_multiple_of(self.alignment);
        self.data.resize(offset, 0);
        self.data.extend_from_slice(payload);
        self.descriptors
            .push(tensor_descriptor(name, dims, dtype as u32, offset as u64));
        self
    }

    /// Add a descriptor without any payload.
    pub fn descriptor(mut self, name: &str, dims: &[u64], dtype: u32, offset: u64) -> Self {
        self.descriptors
            .push(tensor_descriptor(name, dims, dtype, offset));
        self
    }

    /// Absolute offset where tensor data will start.
    pub fn data_offset(&self) -> usize {
        self.prologue().len().next_multiple_of(self.alignment)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.prologue();
        let padded = out.len().next_multiple_of(self.alignment);
        out.resize(padded, 0);
        out.extend_from_slice(&self.data);
        out
    }

    fn prologue(&self) -> Vec<u8> {
        let mut out = header(self.descriptors.len() as u64, self.metadata.len() as u64);
        for entry in &self.metadata {
            out.extend_from_slice(entry);
        }
        for descriptor in &self.descriptors {
            out.extend_from_slice(descriptor);
        }
        out
    }
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
