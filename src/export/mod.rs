pub mod gltf;
pub mod vmd;

use thiserror::Error;

/// 書き出し時のエラー。途中まで書いたデータは返さない。
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no skeleton is bound")]
    NoSkeleton,
    #[error("keyframe store is empty")]
    EmptyStore,
    #[error("name {0:?} cannot be encoded as Shift_JIS")]
    NameEncoding(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
