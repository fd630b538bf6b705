//! SafeTensors element decoding

use safetensors::tensor::TensorView;
use safetensors::Dtype;

/// Decode a tensor view to little-endian `f32` values
///
/// Half-precision checkpoints are widened. Returns `None` for non-float dtypes
/// (attention mask buffers in some exports are stored as `U8`/`BOOL`).
pub(crate) fn tensor_to_f32_vec(tensor: &TensorView<'_>) -> Option<Vec<f32>> {
    let data = tensor.data();

    match tensor.dtype() {
        Dtype::F32 => Some(
            data.chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ),
        Dtype::F16 => Some(decode_u16(data, |bits| half::f16::from_bits(bits).to_f32())),
        Dtype::BF16 => Some(decode_u16(data, |bits| half::bf16::from_bits(bits).to_f32())),
        other => {
            eprintln!("Warning: Unsupported tensor dtype {other:?}, skipping");
            None
        }
    }
}

fn decode_u16(data: &[u8], widen: impl Fn(u16) -> f32) -> Vec<f32> {
    data.chunks_exact(2)
        .map(|chunk| widen(u16::from_le_bytes([chunk[0], chunk[1]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_f16() {
        let raw: Vec<u8> = [1.5f32, -2.0]
            .iter()
            .flat_map(|v| half::f16::from_f32(*v).to_bits().to_le_bytes())
            .collect();
        let view = TensorView::new(Dtype::F16, vec![2], &raw).unwrap();
        assert_eq!(tensor_to_f32_vec(&view).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_decode_bf16() {
        let raw: Vec<u8> = [0.25f32, 8.0]
            .iter()
            .flat_map(|v| half::bf16::from_f32(*v).to_bits().to_le_bytes())
            .collect();
        let view = TensorView::new(Dtype::BF16, vec![2], &raw).unwrap();
        assert_eq!(tensor_to_f32_vec(&view).unwrap(), vec![0.25, 8.0]);
    }

    #[test]
    fn test_skip_integer_dtype() {
        let raw = [1u8, 0, 1, 1];
        let view = TensorView::new(Dtype::U8, vec![4], &raw).unwrap();
        assert!(tensor_to_f32_vec(&view).is_none());
    }
}
