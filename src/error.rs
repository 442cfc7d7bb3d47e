use std::fmt;
use std::path::{Path, PathBuf};

/// Why an image could not be turned into pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The file could not be opened, read, or recognised as an image.
    Unreadable,
    /// The format was recognised but the data is malformed.
    Corrupt,
    /// The format (or a feature of it) is not supported by the codec.
    Unsupported,
    /// Decoding succeeded but produced no pixels.
    Empty,
}

impl DecodeFailure {
    pub fn name(&self) -> &'static str {
        match self {
            DecodeFailure::Unreadable => "unreadable",
            DecodeFailure::Corrupt => "corrupt",
            DecodeFailure::Unsupported => "unsupported",
            DecodeFailure::Empty => "empty",
        }
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind} image {}: {detail}", path.display())]
pub struct DecodeError {
    pub kind: DecodeFailure,
    pub path: PathBuf,
    pub detail: String,
}

impl DecodeError {
    pub fn new(kind: DecodeFailure, path: &Path, detail: impl Into<String>) -> Self {
        DecodeError {
            kind,
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    /// Classify an `image` crate error.
    pub fn from_image(path: &Path, err: image::ImageError) -> Self {
        use image::ImageError;
        let kind = match &err {
            ImageError::IoError(_) => DecodeFailure::Unreadable,
            ImageError::Decoding(_) | ImageError::Parameter(_) => DecodeFailure::Corrupt,
            ImageError::Unsupported(_) | ImageError::Limits(_) => DecodeFailure::Unsupported,
            ImageError::Encoding(_) => DecodeFailure::Corrupt,
        };
        DecodeError::new(kind, path, err.to_string())
    }

    /// Classify a `jpeg-decoder` error.
    pub fn from_jpeg(path: &Path, err: jpeg_decoder::Error) -> Self {
        use jpeg_decoder::Error as JpegError;
        let kind = match &err {
            JpegError::Io(_) => DecodeFailure::Unreadable,
            JpegError::Format(_) | JpegError::Internal(_) => DecodeFailure::Corrupt,
            JpegError::Unsupported(_) => DecodeFailure::Unsupported,
        };
        DecodeError::new(kind, path, err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid target dimensions {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },

    #[error("selection index {index} out of range for {len} items")]
    SelectionIndexOutOfRange { index: usize, len: usize },

    #[error("decode pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
