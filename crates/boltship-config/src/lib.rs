//! boltship の設定
//!
//! 環境変数や CLI 引数から読み取った値を、起動時に一度だけ明示的な
//! 設定構造体へ変換します。デフォルト値の適用はここで完結させ、
//! ビルド処理側では環境変数を直接参照しません。

pub mod error;
pub mod secret;

pub use error::*;
pub use secret::Secret;

use std::path::PathBuf;

/// イメージタグ未指定時のデフォルト
pub const DEFAULT_IMAGE_TAG: &str = "slack-bolt-coder:latest";

/// publish でタグ未指定時のデフォルト
pub const DEFAULT_PUBLISH_TAG: &str = "latest";

/// アプリケーションが待ち受けるポート
pub const SERVICE_PORT: u16 = 6000;

pub const ENV_IMAGE_TAG: &str = "IMAGE_TAG";
pub const ENV_REGISTRY: &str = "REGISTRY";
pub const ENV_PUSH_TO_REGISTRY: &str = "PUSH_TO_REGISTRY";
pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const ENV_SLACK_SIGNING_SECRET: &str = "SLACK_SIGNING_SECRET";
pub const ENV_PORT: &str = "PORT";

/// 空文字列を未指定として扱う（値はそのまま使う）
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// 空白のみの値も未指定として扱う
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `build` コマンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// ビルドコンテキストのルート
    pub source_dir: PathBuf,
    /// レジストリを含まないイメージ名:タグ
    pub image_tag: String,
    /// レジストリのプレフィックス（例: registry.example.com）
    pub registry: Option<String>,
    /// PUSH_TO_REGISTRY が "true" の場合のみ true
    pub push: bool,
}

impl BuildSettings {
    /// 生の値から設定を作成
    ///
    /// `push` は文字列 `"true"` と完全一致した場合のみ有効になります。
    pub fn new(image_tag: Option<&str>, registry: Option<&str>, push: Option<&str>) -> Self {
        let image_tag = non_empty(image_tag)
            .unwrap_or(DEFAULT_IMAGE_TAG)
            .to_string();
        let registry = non_empty(registry).map(str::to_string);
        let push = push == Some("true");

        Self {
            source_dir: PathBuf::from("."),
            image_tag,
            registry,
            push,
        }
    }

    /// 任意の参照関数から設定を読み取る
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let image_tag = lookup(ENV_IMAGE_TAG);
        let registry = lookup(ENV_REGISTRY);
        let push = lookup(ENV_PUSH_TO_REGISTRY);

        Self::new(image_tag.as_deref(), registry.as_deref(), push.as_deref())
    }

    /// プロセスの環境変数から設定を読み取る
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    /// エクスポートおよびプッシュに使う完全なイメージ参照
    pub fn image_reference(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.image_tag),
            None => self.image_tag.clone(),
        }
    }

    /// プッシュを実行するか
    ///
    /// フラグが立っていてもレジストリ未指定ならプッシュしません。
    pub fn should_publish(&self) -> bool {
        self.push && self.registry.is_some()
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// `run` コマンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub source_dir: PathBuf,
    pub slack_bot_token: Option<Secret>,
    pub slack_signing_secret: Option<Secret>,
    /// ローカル実行時のイメージ参照
    pub image_reference: String,
    /// 起動するコンテナ名
    pub container_name: String,
}

impl RunSettings {
    pub fn new(slack_bot_token: Option<String>, slack_signing_secret: Option<String>) -> Self {
        let image_reference = DEFAULT_IMAGE_TAG.to_string();
        let container_name = DEFAULT_IMAGE_TAG
            .split(':')
            .next()
            .unwrap_or(DEFAULT_IMAGE_TAG)
            .to_string();

        Self {
            source_dir: PathBuf::from("."),
            slack_bot_token: Secret::non_empty(ENV_SLACK_BOT_TOKEN, slack_bot_token),
            slack_signing_secret: Secret::non_empty(
                ENV_SLACK_SIGNING_SECRET,
                slack_signing_secret,
            ),
            image_reference,
            container_name,
        }
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    /// コンテナに注入する環境変数
    ///
    /// 空の認証情報は注入しません。PORT は常に設定します。
    pub fn container_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        for secret in [&self.slack_bot_token, &self.slack_signing_secret]
            .into_iter()
            .flatten()
        {
            env.push((secret.name().to_string(), secret.expose().to_string()));
        }
        env.push((ENV_PORT.to_string(), SERVICE_PORT.to_string()));
        env
    }
}

/// `publish` コマンドの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub source_dir: PathBuf,
    pub username: String,
    pub password: Secret,
    /// リポジトリ（例: acme/bot, ghcr.io/acme/bot）
    pub repository: String,
    pub tag: String,
}

impl PublishSettings {
    pub fn new(
        username: &str,
        password: &str,
        repository: &str,
        tag: Option<&str>,
    ) -> Result<Self> {
        let username = non_blank(Some(username)).ok_or(ConfigError::MissingValue {
            name: "username",
        })?;
        let repository = non_blank(Some(repository)).ok_or(ConfigError::MissingValue {
            name: "repository",
        })?;

        // タグ付きのリポジトリは --tag と二重指定になる
        let last_segment = repository.rsplit('/').next().unwrap_or(repository);
        if last_segment.contains(':') {
            return Err(ConfigError::InvalidValue {
                name: "repository",
                value: repository.to_string(),
                reason: "タグはリポジトリではなく tag で指定してください".to_string(),
            });
        }

        let tag = non_blank(tag).unwrap_or(DEFAULT_PUBLISH_TAG).to_string();

        Ok(Self {
            source_dir: PathBuf::from("."),
            username: username.to_string(),
            password: Secret::new("registry-password", password),
            repository: repository.to_string(),
            tag,
        })
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    /// プッシュ先のイメージ参照（repository:tag）
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}
