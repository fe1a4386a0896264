//! レジストリ認証処理
//!
//! 明示的なユーザー名 / パスワード、または Docker config.json と
//! credential helper から Bollard の DockerCredentials を組み立てます。

use crate::backend::RegistryLogin;
use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Docker Hub の正規ホスト名
pub const DOCKER_HUB: &str = "docker.io";

/// config.json で Docker Hub に使われるキー
const DOCKER_HUB_ALIASES: [&str; 3] = [
    "docker.io",
    "index.docker.io",
    "https://index.docker.io/v1/",
];

/// Docker config.json の構造
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// 全レジストリ共通の credential helper
    #[serde(default)]
    creds_store: Option<String>,
    /// レジストリ別の credential helper
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// イメージ名からレジストリのホストを抽出
///
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `acme/bot` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':') || first == "localhost")
    {
        return first.to_string();
    }

    DOCKER_HUB.to_string()
}

/// 明示的なログイン情報を Bollard の認証情報に変換
pub fn login_credentials(login: &RegistryLogin) -> DockerCredentials {
    DockerCredentials {
        username: Some(login.username.clone()),
        password: Some(login.password.expose().to_string()),
        serveraddress: Some(login.registry.clone()),
        ..Default::default()
    }
}

/// Docker config.json ベースの認証情報マネージャー
#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json` を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージ参照に対応する認証情報を取得
    ///
    /// config.json が無い、またはエントリが無い場合は `Ok(None)`（匿名で続行）。
    pub fn get_credentials(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = extract_registry(image);

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        for key in Self::config_keys(&registry) {
            if let Some(auth_b64) = config.auths.get(key).and_then(|e| e.auth.as_deref())
                && let Some(creds) = self.decode_auth(auth_b64, &registry)?
            {
                tracing::debug!("Found credentials in auths for {}", registry);
                return Ok(Some(creds));
            }
        }

        let helper = Self::config_keys(&registry)
            .iter()
            .find_map(|key| config.cred_helpers.get(*key))
            .or(config.creds_store.as_ref());

        if let Some(helper) = helper {
            tracing::debug!("Trying credential helper: {}", helper);
            match self.get_from_helper(helper, &registry) {
                Ok(Some(creds)) => return Ok(Some(creds)),
                Ok(None) => {}
                Err(e) => tracing::debug!("Credential helper failed: {}", e),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn config_keys(registry: &str) -> Vec<&str> {
        if registry == DOCKER_HUB {
            DOCKER_HUB_ALIASES.to_vec()
        } else {
            vec![registry]
        }
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }

    fn decode_auth(
        &self,
        auth_b64: &str,
        registry: &str,
    ) -> BuildResult<Option<DockerCredentials>> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth_b64)
            .map_err(|e| BuildError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to decode auth: {}", e),
            })?;

        let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Invalid UTF-8 in auth: {}", e),
        })?;

        Ok(auth_str
            .split_once(':')
            .map(|(username, password)| DockerCredentials {
                username: Some(username.to_string()),
                password: Some(password.to_string()),
                serveraddress: Some(registry.to_string()),
                ..Default::default()
            }))
    }

    /// `docker-credential-<helper> get` を実行
    fn get_from_helper(
        &self,
        helper: &str,
        registry: &str,
    ) -> BuildResult<Option<DockerCredentials>> {
        let helper_cmd = format!("docker-credential-{}", helper);
        let auth_failed = |message: String| BuildError::AuthFailed {
            registry: registry.to_string(),
            message,
        };

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| auth_failed(format!("Failed to run {}: {}", helper_cmd, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes()).ok();
        }

        let output = child
            .wait_with_output()
            .map_err(|e| auth_failed(format!("Credential helper failed: {}", e)))?;

        if !output.status.success() {
            tracing::debug!(
                "Credential helper returned error for {}: {}",
                registry,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let response: CredentialResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            auth_failed(format!(
                "Failed to parse credential helper response: {}",
                e
            ))
        })?;

        Ok(Some(DockerCredentials {
            username: Some(response.username),
            password: Some(response.secret),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltship_config::Secret;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extract_registry() {
        assert_eq!(extract_registry("registry.example.com/myapp:v2"), "registry.example.com");
        assert_eq!(extract_registry("ghcr.io/acme/bot:latest"), "ghcr.io");
        assert_eq!(extract_registry("localhost:5000/bot"), "localhost:5000");
        assert_eq!(extract_registry("localhost/bot"), "localhost");
    }

    #[test]
    fn test_extract_registry_docker_hub() {
        assert_eq!(extract_registry("acme/bot"), "docker.io");
        assert_eq!(extract_registry("acme/bot:latest"), "docker.io");
        assert_eq!(extract_registry("slack-bolt-coder:latest"), "docker.io");
    }

    #[test]
    fn test_login_credentials() {
        let login = RegistryLogin {
            registry: "docker.io".to_string(),
            username: "acme".to_string(),
            password: Secret::new("registry-password", "s3cret"),
        };

        let creds = login_credentials(&login);
        assert_eq!(creds.username.as_deref(), Some("acme"));
        assert_eq!(creds.password.as_deref(), Some("s3cret"));
        assert_eq!(creds.serveraddress.as_deref(), Some("docker.io"));
    }

    #[test]
    fn test_credentials_missing_config() {
        let temp_dir = tempdir().unwrap();
        let auth = RegistryAuth::with_config_path(temp_dir.path().join("config.json"));

        assert!(auth.get_credentials("ghcr.io/acme/bot").unwrap().is_none());
    }

    #[test]
    fn test_credentials_from_auths() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let encoded = base64::engine::general_purpose::STANDARD.encode("acme:token123");
        fs::write(
            &config_path,
            format!(
                r#"{{"auths": {{"registry.example.com": {{"auth": "{}"}}, "https://index.docker.io/v1/": {{"auth": "{}"}}}}}}"#,
                encoded, encoded
            ),
        )
        .unwrap();

        let auth = RegistryAuth::with_config_path(config_path);

        let creds = auth
            .get_credentials("registry.example.com/myapp:v2")
            .unwrap()
            .unwrap();
        assert_eq!(creds.username.as_deref(), Some("acme"));
        assert_eq!(creds.password.as_deref(), Some("token123"));
        assert_eq!(creds.serveraddress.as_deref(), Some("registry.example.com"));

        // Docker Hub はレガシーなキーでも見つかる
        let creds = auth.get_credentials("acme/bot:latest").unwrap().unwrap();
        assert_eq!(creds.serveraddress.as_deref(), Some("docker.io"));

        assert!(auth.get_credentials("ghcr.io/acme/bot").unwrap().is_none());
    }

    #[test]
    fn test_credentials_invalid_json() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{not json").unwrap();

        let auth = RegistryAuth::with_config_path(config_path);
        assert!(matches!(
            auth.get_credentials("ghcr.io/acme/bot"),
            Err(BuildError::AuthFailed { .. })
        ));
    }
}
