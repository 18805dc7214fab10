//! Embedding blob encoding and vector helpers.
//!
//! Embeddings are stored as raw little-endian float32 bytes, four bytes per
//! component, so a row decodes back to exactly the vector that was inserted.

use ndarray::Array1;

/// Encode an embedding as little-endian float32 bytes.
pub fn encode_f32(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian float32 bytes. Returns `None` if the length is not a
/// multiple of four.
pub fn decode_f32(bytes: &[u8]) -> Option<Array1<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(Array1::from_iter(bytes.chunks_exact(4).map(|b| {
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    })))
}

/// Scale a vector to unit length. Returns `None` for (near-)zero vectors.
pub fn normalize(embedding: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = embedding.dot(embedding).sqrt();
    if norm < 1e-9 {
        None
    } else {
        Some(embedding / norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_decode_preserves_values() {
        let original = [0.1f32, -2.5, 3.75, 0.0];
        let decoded = decode_f32(&encode_f32(&original)).unwrap();
        assert_eq!(decoded.to_vec(), original.to_vec());
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert!(decode_f32(&[0u8, 1, 2]).is_none());
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&array![3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(normalize(&array![0.0, 0.0]).is_none());
    }
}
