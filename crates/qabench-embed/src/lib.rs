pub mod hashing;
pub mod http;
pub mod pool;
pub mod tokenize;

use std::sync::Arc;

use qabench_core::config::{EncoderConfig, EncoderKind};
use qabench_core::error::Result;
use qabench_core::traits::Encoder;

pub use hashing::HashingEncoder;
pub use http::HttpEncoder;
pub use pool::l2_normalize;

pub fn get_default_encoder(config: &EncoderConfig) -> Result<Arc<dyn Encoder>> {
    match config.kind {
        EncoderKind::Hashing => {
            tracing::info!(dim = config.dim, "using hashing encoder");
            Ok(Arc::new(HashingEncoder::new(config.dim)?))
        }
        EncoderKind::Http => Ok(Arc::new(HttpEncoder::new(config)?)),
    }
}
