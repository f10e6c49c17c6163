use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("resource buffer too small: need {required} bytes, got {provided}")]
    InsufficientBuffer { required: u64, provided: u64 },

    #[error("resource buffer base is not {0}-byte aligned")]
    UnalignedBuffer(usize),
}
