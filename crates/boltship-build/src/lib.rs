//! boltship のイメージビルド機能
//!
//! Slack bot アプリケーションのビルドコンテキスト作成、イメージ構築手順、
//! ビルドバックエンド（Docker Engine）、レジストリへのプッシュ、
//! ローカルでのサービス起動を提供します。

pub mod auth;
pub mod backend;
pub mod builder;
pub mod context;
pub mod docker;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod pusher;
pub mod recipe;
pub mod runner;

pub use auth::{RegistryAuth, extract_registry};
pub use backend::{AssembledImage, ImageBackend, RegistryLogin, ServiceSpec, assemble};
pub use builder::ImageBuilder;
pub use context::{ContextBuilder, ContextFilter, DEFAULT_EXCLUDES};
pub use docker::DockerBackend;
pub use error::{BuildError, BuildResult};
pub use pipeline::BuildOutcome;
pub use progress::BuildProgress;
pub use pusher::{ImagePusher, pushed_address, split_image_tag, validate_tag};
pub use recipe::{ImageRecipe, Step};
pub use runner::ContainerRunner;
