use candle_core::{DType, Device, Tensor};
use pdfqa_embed::masked_mean_l2;

/// Attention mask shaped like `tokenize_on_device` output: `used` ones, then zeros for padding.
fn padded_mask(used: &[usize], max_len: usize, dev: &Device) -> Tensor {
    let mut flat = Vec::with_capacity(used.len() * max_len);
    for &n in used {
        flat.extend(std::iter::repeat(1u32).take(n));
        flat.extend(std::iter::repeat(0u32).take(max_len - n));
    }
    Tensor::from_vec(flat, (used.len(), max_len), dev).unwrap()
}

fn unit(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

#[test]
fn padding_never_leaks_into_the_pooled_vector() {
    let dev = Device::Cpu;
    // Row 0 uses 2 of 4 positions, row 1 uses 3; padded positions hold huge values.
    let hidden = Tensor::from_slice(
        &[
            1.0f32, 0.0, 2.0, //
            3.0, 4.0, 0.0, //
            1e6, 1e6, 1e6, //
            1e6, 1e6, 1e6, //
            0.0, 1.0, 0.0, //
            0.0, 2.0, 0.0, //
            0.0, 3.0, 3.0, //
            -1e6, -1e6, -1e6,
        ],
        (2, 4, 3),
        &dev,
    )
    .unwrap();
    let pooled: Vec<Vec<f32>> = masked_mean_l2(&hidden, &padded_mask(&[2, 3], 4, &dev)).unwrap().to_vec2().unwrap();

    let expected = [unit(&[2.0, 2.0, 1.0]), unit(&[0.0, 2.0, 1.0])];
    for (row, want) in pooled.iter().zip(expected.iter()) {
        for (a, b) in row.iter().zip(want) {
            assert!((a - b).abs() < 1e-5, "got {row:?}, want {want:?}");
        }
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn float_and_integer_masks_pool_alike() {
    let dev = Device::Cpu;
    let hidden = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
    let ints = padded_mask(&[1], 2, &dev);
    let floats = ints.to_dtype(DType::F32).unwrap();
    let a: Vec<Vec<f32>> = masked_mean_l2(&hidden, &ints).unwrap().to_vec2().unwrap();
    let b: Vec<Vec<f32>> = masked_mean_l2(&hidden, &floats).unwrap().to_vec2().unwrap();
    assert_eq!(a, b);
    let want = unit(&[1.0, 2.0, 3.0, 4.0]);
    for (x, y) in a[0].iter().zip(&want) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn rejects_unbatched_hidden_states() {
    let dev = Device::Cpu;
    let hidden = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = padded_mask(&[2], 2, &dev);
    assert!(masked_mean_l2(&hidden, &mask).is_err());
}
