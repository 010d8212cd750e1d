// API error type
// Client input errors map to 400, storage failures to 500

use hyper::StatusCode;
use thiserror::Error;

use crate::store::StoreError;
use crate::upload::UploadError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Judul, teknologi, dan tahun wajib.")]
    MissingFields,
    #[error("Tahun harus berupa angka.")]
    InvalidYear,
    #[error("Tahun di luar jangkauan.")]
    YearOutOfRange,
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
    #[error("Unexpected file field '{0}'")]
    UnexpectedFile(String),
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields
            | Self::InvalidYear
            | Self::YearOutOfRange
            | Self::MalformedBody(_)
            | Self::UnexpectedFile(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upload(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client; storage details stay in the log
    pub fn public_message(&self) -> String {
        match self {
            Self::Upload(_) => "Gagal menyimpan file.".to_string(),
            Self::Store(_) => "Gagal menyimpan tugas.".to_string(),
            Self::PayloadTooLarge(_) => "Ukuran data terlalu besar.".to_string(),
            other => other.to_string(),
        }
    }
}
