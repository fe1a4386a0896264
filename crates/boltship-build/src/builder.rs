use crate::error::{BuildError, BuildResult};
use crate::progress::BuildProgress;
use bollard::Docker;
use bollard::image::BuildImageOptions;
use colored::Colorize;
use futures_util::stream::StreamExt;

pub struct ImageBuilder {
    docker: Docker,
    verbose: bool,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            verbose: false,
        }
    }

    /// ビルドログをすべて表示する
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// イメージをビルド
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        dockerfile: &str,
        tag: &str,
        no_cache: bool,
    ) -> BuildResult<()> {
        tracing::info!("Building image: {}", tag);

        #[allow(deprecated)]
        let options = BuildImageOptions {
            dockerfile,
            t: tag,
            nocache: no_cache,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        let progress = (!self.verbose).then(|| BuildProgress::new(tag));

        while let Some(msg) = stream.next().await {
            let result = match msg {
                Ok(output) => self.handle_build_output(output, progress.as_ref()),
                Err(e) => Err(BuildError::DockerConnection(e)),
            };
            if let Err(e) = result {
                if let Some(progress) = &progress {
                    progress.finish_error(&e.to_string());
                }
                return Err(e);
            }
        }

        if let Some(progress) = &progress {
            progress.finish_success();
        }

        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }

    /// ビルド出力の処理
    fn handle_build_output(
        &self,
        output: bollard::models::BuildInfo,
        progress: Option<&BuildProgress>,
    ) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            // ビルドステップの出力
            match progress {
                Some(progress) => {
                    let line = stream.trim();
                    if !line.is_empty() {
                        progress.set_message(line);
                    }
                }
                None => print!("{}", stream),
            }
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(error_msg));
        }

        if let Some(status) = output.status {
            // ステータスメッセージ（pull等）
            match progress {
                Some(progress) => progress.set_message(&status),
                None => println!("{}", status.cyan()),
            }
        }

        Ok(())
    }

    /// イメージの存在確認
    pub async fn image_exists(&self, image_tag: &str) -> BuildResult<bool> {
        match self.docker.inspect_image(image_tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }
}
