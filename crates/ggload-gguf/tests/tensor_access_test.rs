mod common;

use common::{f32_bytes, GgufBuilder};
use ggload_gguf::{
    DequantError, GgmlType, GgufContent, TensorDataError, TensorSizeError,
};
use half::f16;

fn q4_0_block(d: f32, byte: u8) -> Vec<u8> {
    let mut block = f16::from_f32(d).to_le_bytes().to_vec();
    block.extend_from_slice(&[byte; 16]);
    block
}

#[test]
fn test_f32_tensor_extraction() {
    let builder = GgufBuilder::new()
        .alignment(32)
        .tensor("test_tensor", &[2, 3], GgmlType::F32, &f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let data = builder.build();
    // 24 + 33 + 51 = 108, padded to 128.
    assert_eq!(builder.data_offset(), 128);

    let content = GgufContent::parse(&data).unwrap();
    assert_eq!(content.tensor_data_offset(), 128);

    let raw = content.tensor_data(0, &data).unwrap();
    assert_eq!(raw.len(), 24);
    assert_eq!(raw.as_ptr(), data[128..].as_ptr());

    let floats = content.tensor_f32(0, &data).unwrap();
    assert_eq!(floats, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_name_lookup_matches_index() {
    let data = GgufBuilder::new()
        .tensor("a", &[4], GgmlType::F32, &f32_bytes(&[0.5; 4]))
        .tensor("b", &[32], GgmlType::Q4_0, &q4_0_block(2.0, 0xA9))
        .build();
    let content = GgufContent::parse(&data).unwrap();

    for (index, name) in ["a", "b"].into_iter().enumerate() {
        assert_eq!(
            content.tensor_data_by_name(name, &data).unwrap(),
            Some(content.tensor_data(index, &data).unwrap())
        );
        assert_eq!(
            content.tensor_f32_by_name(name, &data).unwrap(),
            Some(content.tensor_f32(index, &data).unwrap())
        );
    }

    let b = content.tensor_f32_by_name("b", &data).unwrap().unwrap();
    // low nibble 9 -> 1 * 2, high nibble 10 -> 2 * 2
    assert!(b[..16].iter().all(|&v| v == 2.0));
    assert!(b[16..].iter().all(|&v| v == 4.0));
}

#[test]
fn test_absent_name_is_none() {
    let data = GgufBuilder::new()
        .tensor("a", &[1], GgmlType::F32, &f32_bytes(&[1.0]))
        .build();
    let content = GgufContent::parse(&data).unwrap();

    assert_eq!(content.tensor_data_by_name("missing", &data), Ok(None));
    assert_eq!(content.tensor_f32_by_name("missing", &data), Ok(None));
}

#[test]
fn test_unsupported_conversion() {
    let payload = vec![0u8; GgmlType::Iq2Xxs.type_size()];
    let data = GgufBuilder::new()
        .tensor("iq", &[256], GgmlType::Iq2Xxs, &payload)
        .build();
    let content = GgufContent::parse(&data).unwrap();

    // Raw bytes are still available.
    assert_eq!(content.tensor_data(0, &data).unwrap().len(), 66);
    assert_eq!(
        content.tensor_f32(0, &data),
        Err(TensorDataError::Dequant(DequantError::UnsupportedConversion(
            GgmlType::Iq2Xxs
        )))
    );
}

#[test]
fn test_index_out_of_range() {
    let data = GgufBuilder::new().build();
    let content = GgufContent::parse(&data).unwrap();
    assert_eq!(
        content.tensor_data(0, &data),
        Err(TensorDataError::IndexOutOfRange { index: 0, count: 0 })
    );
    assert!(matches!(
        content.tensor_f32(3, &data),
        Err(TensorDataError::IndexOutOfRange { index: 3, .. })
    ));
}

#[test]
fn test_out_of_bounds() {
    let builder = GgufBuilder::new().descriptor("w", &[512, 256], GgmlType::F32 as u32, 0);
    let data = builder.build();
    let content = GgufContent::parse(&data).unwrap();

    assert_eq!(
        content.tensor_data(0, &data),
        Err(TensorDataError::OutOfBounds {
            name: "w".to_string(),
            offset: builder.data_offset() as u64,
            size: 524_288,
            buffer_len: data.len(),
        })
    );

    let data = GgufBuilder::new()
        .descriptor("far", &[1], GgmlType::F32 as u32, u64::MAX)
        .build();
    let content = GgufContent::parse(&data).unwrap();
    assert!(matches!(
        content.tensor_f32(0, &data),
        Err(TensorDataError::OutOfBounds { .. })
    ));
}

#[test]
fn test_size_overflow() {
    let data = GgufBuilder::new()
        .descriptor("huge", &[u64::MAX, 2], GgmlType::F32 as u32, 0)
        .build();
    let content = GgufContent::parse(&data).unwrap();
    assert_eq!(
        content.tensor_data(0, &data),
        Err(TensorDataError::Size(TensorSizeError::ElementCountOverflow))
    );
}

#[test]
fn test_scalar_tensor() {
    let data = GgufBuilder::new()
        .tensor("scalar", &[], GgmlType::F32, &f32_bytes(&[42.0]))
        .build();
    let content = GgufContent::parse(&data).unwrap();
    assert_eq!(content.tensor_f32(0, &data).unwrap(), vec![42.0]);
}

#[test]
fn test_partial_block_tensor() {
    let mut payload = q4_0_block(1.0, 0x99);
    payload.extend(q4_0_block(1.0, 0x99));
    let data = GgufBuilder::new()
        .tensor("odd", &[33], GgmlType::Q4_0, &payload)
        .build();
    let content = GgufContent::parse(&data).unwrap();

    assert_eq!(content.tensor_data(0, &data).unwrap().len(), 36);
    let floats = content.tensor_f32(0, &data).unwrap();
    assert_eq!(floats.len(), 33);
    assert!(floats.iter().all(|&v| v == 1.0));
}

#[test]
fn test_decoding_is_repeatable_across_threads() {
    let mut payload = Vec::new();
    for i in 0..8u8 {
        payload.extend(q4_0_block(0.25 * (i + 1) as f32, i.wrapping_mul(37)));
    }
    let data = GgufBuilder::new()
        .tensor("w", &[16, 16], GgmlType::Q4_0, &payload)
        .build();
    let content = GgufContent::parse(&data).unwrap();
    let expected = content.tensor_f32(0, &data).unwrap();
    assert_eq!(expected.len(), 256);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| content.tensor_f32(0, &data).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
