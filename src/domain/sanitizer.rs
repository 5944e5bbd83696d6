//! 文本脱敏
//!
//! 所有错误信息、展示路径在持久化、写日志或跨组件返回之前都必须经过这里，
//! 确保原始文件路径、URL、IP、凭据类 token 不会泄露。

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

/// URL 占位符
pub const URL_PLACEHOLDER: &str = "[URL]";
/// UUID 占位符
pub const UUID_PLACEHOLDER: &str = "[UUID]";
/// IPv4 占位符
pub const IP_PLACEHOLDER: &str = "[IP]";
/// 文件路径占位符
pub const PATH_PLACEHOLDER: &str = "[PATH]";
/// 长 token 占位符
pub const TOKEN_PLACEHOLDER: &str = "[TOKEN]";

/// 被视为不透明 token 的最小长度
pub const MIN_TOKEN_LEN: usize = 32;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?|wss?|ftp|file)://[^\s'"<>]*"#).expect("valid url regex")
});

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("valid uuid regex")
});

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}(?::\d+)?\b").expect("valid ipv4 regex")
});

static WINDOWS_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b[a-z]:[\\/][^\s'"<>|]*"#).expect("valid windows path regex")
});

// Rust regex 不支持 lookbehind，用捕获组保留路径前的分隔字符
static UNIX_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[\s'"(=:\[,])((?:~|\.{1,2})?/[^\s'"()<>\[\],:]+)"#)
        .expect("valid unix path regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b[A-Za-z0-9_\-]{{{},}}\b", MIN_TOKEN_LEN)).expect("valid token regex")
});

/// 脱敏任意文本
///
/// 替换顺序固定：URL → UUID → IPv4 → 路径 → 长 token。
/// URL 必须最先处理，否则其中的路径部分会被单独替换；
/// UUID 必须先于 token，否则会被识别为 token。
pub fn sanitize(text: &str) -> String {
    let out = URL_RE.replace_all(text, URL_PLACEHOLDER);
    let out = UUID_RE.replace_all(&out, UUID_PLACEHOLDER);
    let out = IPV4_RE.replace_all(&out, IP_PLACEHOLDER);
    let out = WINDOWS_PATH_RE.replace_all(&out, PATH_PLACEHOLDER);
    let out = UNIX_PATH_RE.replace_all(&out, format!("${{1}}{}", PATH_PLACEHOLDER).as_str());
    let out = TOKEN_RE.replace_all(&out, TOKEN_PLACEHOLDER);
    out.into_owned()
}

/// 脱敏可选文本
pub fn sanitize_opt(text: Option<&str>) -> Option<String> {
    text.map(sanitize)
}

/// 按字符截断（不会截断在 UTF-8 字符中间）
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 脱敏后截断
pub fn sanitize_truncated(text: &str, max_chars: usize) -> String {
    truncate_chars(&sanitize(text), max_chars)
}

/// 生成不可逆的路径展示串
///
/// 只保留路径的 SHA-256 摘要前 12 位，无法还原出真实存储位置。
pub fn abstract_path(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    format!("[BLOB:{}]", &hex[..12])
}
