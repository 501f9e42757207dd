//! Validation helpers for tensors crossing the inference boundary

mod tensor;

pub use tensor::TensorValidator;
