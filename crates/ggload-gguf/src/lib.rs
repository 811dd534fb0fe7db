//! GGUF v3 reader and GGML dequantization.
//!
//! GGUF (GGML Universal Format) is a file format for storing models
//! for inference with GGML-based executors like llama.cpp and Ollama.
//!
//! This crate provides:
//! - Types representing the GGUF format
//! - A validating parser over an in-memory file image
//! - Zero-copy tensor slicing
//! - Dequantization of every GGML encoding with a defined float mapping
//!
//! # Example
//!
//! ```ignore
//! use ggload_gguf::{dequant, GgufContent};
//!
//! let bytes = std::fs::read("model.gguf")?;
//! let content = GgufContent::parse(&bytes)?;
//!
//! // Get architecture
//! if let Some(arch) = content.architecture() {
//!     println!("Model architecture: {}", arch);
//! }
//!
//! // Slice and dequantize a tensor
//! let index = content.tensor_index("token_embd.weight").unwrap();
//! let info = &content.tensor_infos()[index];
//! let raw = content.tensor_data(index, &bytes)?;
//! let floats = dequant::dequantize(raw, info.dtype, info.n_elements_checked()?)?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod cursor;
pub mod dequant;
pub mod iq_quants;
pub mod k_quants;
pub mod reader;
pub mod tq_quants;
mod types;

pub use config::{ConfigError, ReaderConfig, MAX_ARRAY_DEPTH_LIMIT};
pub use cursor::{ByteCursor, CursorError};
pub use dequant::DequantError;
pub use reader::{GgufContent, GgufHeader, GgufReadError, TensorDataError};
pub use types::*;
