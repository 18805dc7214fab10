//! Local ONNX embedding engine for bge-small-en-v1.5.
//!
//! Loads the exported model and its HuggingFace tokenizer from a directory and
//! produces CLS-pooled, L2-normalized float32 embeddings. Requires the `onnx`
//! feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::info;

    use crate::embedder::EmbedderBackend;
    use estthmar_core::{Error, Result};

    const MAX_SEQ_LEN: usize = 512;

    fn infer_err(what: &str, e: impl std::fmt::Display) -> Error {
        Error::Inference(format!("{}: {}", what, e))
    }

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        ///
        /// With the `load-dynamic` ort feature, `ORT_DYLIB_PATH` must point to
        /// `libonnxruntime`.
        pub fn load(model_dir: &Path, dimension: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for p in [&model_path, &tokenizer_path] {
                if !p.exists() {
                    return Err(Error::Config(format!("missing model file: {}", p.display())));
                }
            }

            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| infer_err("session builder", e))?
                .with_intra_threads(2)
                .map_err(|e| infer_err("thread config", e))?
                .commit_from_file(&model_path)
                .map_err(|e| infer_err("loading ONNX model", e))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| infer_err("loading tokenizer", e))?;

            info!(
                "ONNX embedder loaded: dim={}, model={}",
                dimension,
                model_path.display()
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                dimension,
            })
        }

        fn infer(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| infer_err("tokenization", e))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let ids: Vec<i64> = encoding.get_ids()[..seq_len]
                .iter()
                .map(|&id| id as i64)
                .collect();
            let mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
                .iter()
                .map(|&m| m as i64)
                .collect();
            let type_ids = vec![0i64; seq_len];

            let ids = Tensor::from_array(([1usize, seq_len], ids))
                .map_err(|e| infer_err("ids tensor", e))?;
            let mask = Tensor::from_array(([1usize, seq_len], mask))
                .map_err(|e| infer_err("mask tensor", e))?;
            let type_ids = Tensor::from_array(([1usize, seq_len], type_ids))
                .map_err(|e| infer_err("type_ids tensor", e))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids, mask, type_ids])
                .map_err(|e| infer_err("ONNX inference", e))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| infer_err("output tensor", e))?;

            // bge models use the [CLS] token: row 0 of [1, seq_len, dim],
            // or the whole row when the export already pooled to [1, dim].
            let dim = match shape.len() {
                3 => shape[2] as usize,
                2 => shape[1] as usize,
                _ => {
                    return Err(Error::Inference(format!(
                        "unexpected output shape: {:?}",
                        shape.iter().collect::<Vec<_>>()
                    )))
                }
            };
            if dim != self.dimension {
                return Err(Error::Inference(format!(
                    "model produced {} dims, configured for {}",
                    dim, self.dimension
                )));
            }

            let cls = Array1::from_vec(data[..dim].to_vec());
            let norm = cls.dot(&cls).sqrt();
            if norm < 1e-9 {
                return Err(Error::Inference("model produced a zero vector".into()));
            }
            Ok(cls / norm)
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Array1<f32>> {
            self.infer(text)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            "onnx:bge-small-en-v1.5"
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
