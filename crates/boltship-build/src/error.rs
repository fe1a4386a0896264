use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Source file not found in build context: {0}")]
    MissingSource(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid image recipe: {0}")]
    InvalidRecipe(String),

    #[error("Export failed for {reference}: {message}")]
    ExportFailed { reference: String, message: String },

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    /// publish 操作全体の失敗（原因をラップ）
    #[error("failed to publish image: {0}")]
    PublishFailed(#[source] Box<BuildError>),

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Failed to start service {name}: {message}")]
    RunFailed { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::MissingSource(path) => {
                format!(
                    "ビルドに必要なファイルが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. --source でアプリケーションのディレクトリを指定してください\n\
                     2. package.json / package-lock.json / app.js が揃っているか確認してください",
                    path.display()
                )
            }
            BuildError::ExportFailed { reference, message } => {
                format!(
                    "イメージのエクスポートに失敗しました: {}\n  {}\n\
                     \n\
                     ビルドログを確認してください。",
                    reference, message
                )
            }
            BuildError::PushFailed { message } => {
                format!(
                    "イメージのプッシュに失敗しました: {}\n\
                     \n\
                     docker login 済みか、レジストリ名が正しいか確認してください。",
                    message
                )
            }
            BuildError::PublishFailed(source) => {
                format!("failed to publish image:\n{}", source.user_message())
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     --source のパスを確認してください。",
                    path.display()
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
