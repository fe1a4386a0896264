use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("必須の設定値がありません: {name}")]
    MissingValue { name: &'static str },

    #[error("設定値が不正です: {name}={value}\n  {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
