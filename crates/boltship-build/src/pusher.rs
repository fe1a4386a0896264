//! イメージプッシュ処理
//!
//! エクスポート済みのイメージをコンテナレジストリにプッシュします。

use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;

pub struct ImagePusher {
    docker: Docker,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// イメージ参照（`registry/name:tag`）をプッシュ
    ///
    /// 成功時はプッシュ先のアドレスを返します（[`pushed_address`]）。
    pub async fn push(
        &self,
        reference: &str,
        credentials: Option<DockerCredentials>,
    ) -> BuildResult<String> {
        let (image, tag) = split_image_tag(reference);
        validate_tag(&tag)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> { tag: tag.clone() };

        println!("  → {}", reference.cyan());

        #[allow(deprecated)]
        let mut stream = self.docker.push_image(&image, Some(options), credentials);

        let mut last_status = String::new();
        let mut error_message: Option<String> = None;
        let mut digest: Option<String> = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(err) = info.error.clone() {
                        error_message = Some(err);
                    } else {
                        if let Some(found) = info.status.as_deref().and_then(parse_digest) {
                            digest = Some(found);
                        }
                        self.handle_progress(&info, &mut last_status);
                    }
                }
                Err(e) => {
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        println!();

        if let Some(err) = error_message {
            return Err(BuildError::PushFailed { message: err });
        }

        Ok(pushed_address(&image, &tag, digest.as_deref()))
    }

    /// プッシュ進捗を表示
    fn handle_progress(&self, info: &PushImageInfo, last_status: &mut String) {
        if let Some(status) = &info.status {
            let progress = info.progress.as_deref().unwrap_or("");

            match status.as_str() {
                "Pushing" => {
                    print!("\r  ↑ {} {}     ", status, progress);
                    std::io::stdout().flush().ok();
                }
                "Pushed" => {
                    println!("\r  {} Pushed                    ", "✓".green());
                }
                "Layer already exists" => {
                    println!("\r  {} Layer already exists      ", "✓".green());
                }
                "Preparing" | "Waiting" => {}
                _ => {
                    if status != last_status {
                        println!("\r  ℹ {}                    ", status);
                        *last_status = status.clone();
                    }
                }
            }
        }
    }
}

/// プッシュ先のアドレス
///
/// タグは常に残し、ダイジェストが得られた場合は `name:tag@sha256:...` 形式にします。
pub fn pushed_address(image: &str, tag: &str, digest: Option<&str>) -> String {
    match digest {
        Some(digest) => format!("{}:{}@{}", image, tag, digest),
        None => format!("{}:{}", image, tag),
    }
}

/// `"<tag>: digest: sha256:... size: N"` からダイジェストを取り出す
fn parse_digest(status: &str) -> Option<String> {
    let (_, rest) = status.split_once("digest: ")?;
    rest.split_whitespace().next().map(str::to_string)
}

/// Docker タグの制約を検証
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

/// イメージ名とタグを分離
///
/// - `registry.example.com/myapp:v2` -> `("registry.example.com/myapp", "v2")`
/// - `acme/bot` -> `("acme/bot", "latest")`
/// - `localhost:5000/app` -> `("localhost:5000/app", "latest")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // `/` を含む場合はレジストリのポート番号
        if !potential_tag.contains('/') {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}
