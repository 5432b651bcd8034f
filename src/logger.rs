//! 日志初始化与脱敏
//!
//! 基于 tracing-subscriber 的进程级日志初始化，
//! 以及写日志前对凭证类字段的脱敏。

use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 过滤级别取 `RUST_LOG`，未设置时默认 info。
/// 重复调用安全，后续调用为空操作。
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer\s+[A-Za-z0-9._-]+", "Bearer ***"),
        (
            r#"api[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "api_key: ***",
        ),
        (r#"token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        (
            r#"secret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "secret: ***",
        ),
        (r#"password["']?\s*[:=]\s*["']?[^\s"',}]+"#, "password: ***"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志消息脱敏
///
/// 插件配置与上游错误可能携带凭证，写日志前统一抹掉。
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SANITIZE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::sanitize_log_message;

    #[test]
    fn bearer_token_is_masked() {
        let output = sanitize_log_message("Authorization: Bearer abcDEF123._-XYZ");
        assert!(!output.contains("abcDEF123"));
        assert!(output.contains("***"));
    }

    #[test]
    fn api_key_is_masked() {
        let output = sanitize_log_message(r#"request api_key="sk-test_123.456-ABC" end"#);
        assert!(output.contains("api_key: ***"));
        assert!(!output.contains("sk-test_123"));
    }

    #[test]
    fn password_is_masked() {
        let output = sanitize_log_message(r#"{"password":"p@ssW0rd!"}"#);
        assert!(output.contains("password: ***"));
        assert!(!output.contains("p@ssW0rd!"));
    }

    #[test]
    fn plain_text_unchanged() {
        let input = "这是一段普通日志，不包含任何敏感字段。";
        assert_eq!(sanitize_log_message(input), input);
    }
}
