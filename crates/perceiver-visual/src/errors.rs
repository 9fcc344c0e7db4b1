//! Error types for image comparison
use std::fmt;

#[derive(Debug)]
pub enum VisualError {
    /// Input bytes or base64 payload were empty
    EmptyInput,

    /// Base64 payload could not be decoded
    InvalidEncoding(String),

    /// Image processing error
    ImageProcessing(String),

    /// Decoded image has no pixels
    ZeroSized { width: u32, height: u32 },
}

impl fmt::Display for VisualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Empty image input"),
            Self::InvalidEncoding(msg) => write!(f, "Invalid base64 image: {}", msg),
            Self::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            Self::ZeroSized { width, height } => {
                write!(f, "Zero-sized image: {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for VisualError {}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}

impl From<base64::DecodeError> for VisualError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InvalidEncoding(err.to_string())
    }
}
