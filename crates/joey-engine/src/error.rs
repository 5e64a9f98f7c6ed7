use std::path::PathBuf;

use thiserror::Error;

pub type StudioResult<T> = Result<T, StudioError>;

/// Failures crossing the provider and controller boundary.
///
/// `Display` is the user-facing text; the controller shows it verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StudioError {
    #[error("请先上传 Joey 的原型图作为生成参考。")]
    MissingReferenceImage,

    #[error("{0}")]
    ProviderCallFailed(String),

    #[error("API 未返回图像数据")]
    NoImageReturned,

    #[error("无法读取参考图 {}: {message}", path.display())]
    DecodeFailure { path: PathBuf, message: String },

    #[error("已有生成任务正在进行中，请稍候。")]
    GenerationInProgress,

    #[error("无效的图像数据: {0}")]
    InvalidImageHandle(String),
}

impl StudioError {
    pub fn provider(err: &anyhow::Error) -> Self {
        StudioError::ProviderCallFailed(error_chain_text(err, 512))
    }
}

/// Flattens an error chain into `outer | caused by: inner`, dropping repeats.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(err.to_string().trim(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
