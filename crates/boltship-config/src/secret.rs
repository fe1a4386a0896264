//! 秘匿値のラッパー
//!
//! トークンやパスワードをログやエラーメッセージに出さないために使います。

use std::fmt;

/// 名前付きの秘匿値
///
/// `Debug` / `Display` では値を伏せ字にします。実際の値は [`Secret::expose`]
/// でのみ取り出せます。
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    name: String,
    value: String,
}

impl Secret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// 空文字列なら None を返す
    pub fn non_empty(name: impl Into<String>, value: Option<String>) -> Option<Self> {
        value
            .filter(|v| !v.is_empty())
            .map(|v| Self::new(name, v))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({}: ***)", self.name)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("registry-password", "hunter2");

        assert_eq!(format!("{}", secret), "***");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(format!("{:?}", secret).contains("registry-password"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_non_empty_filters_blank_values() {
        assert!(Secret::non_empty("token", None).is_none());
        assert!(Secret::non_empty("token", Some(String::new())).is_none());
        assert!(Secret::non_empty("token", Some("xoxb".to_string())).is_some());
    }
}
