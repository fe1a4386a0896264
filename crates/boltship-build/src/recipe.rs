//! イメージ構築手順
//!
//! ベースイメージから最終イメージまでの手順を順序付きで保持し、
//! Docker バックエンド向けに Dockerfile へ変換します。

use crate::error::{BuildError, BuildResult};
use boltship_config::SERVICE_PORT;

/// ベースイメージ
pub const BASE_IMAGE: &str = "node:20-alpine";
/// コンテナ内の作業ディレクトリ
pub const WORKDIR: &str = "/app";
/// 実行ユーザー / グループ
pub const APP_USER: &str = "nodejs";
pub const APP_UID: u32 = 1001;
/// エントリーポイントのスクリプト
pub const ENTRY_SCRIPT: &str = "app.js";

/// 依存関係のインストールとみなすパッケージマネージャー
const PACKAGE_MANAGERS: [&str; 3] = ["npm", "yarn", "pnpm"];

/// 構築手順の1ステップ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    From(String),
    Workdir(String),
    /// コンテキスト内のファイルをコンテナへコピー
    CopyFile { source: String, dest: String },
    Exec(Vec<String>),
    User(String),
    Expose(u16),
    Entrypoint(Vec<String>),
}

/// 順序付きの構築手順
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecipe {
    steps: Vec<Step>,
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl ImageRecipe {
    pub fn from_image(base_image: &str) -> Self {
        Self {
            steps: vec![Step::From(base_image.to_string())],
        }
    }

    pub fn with_workdir(mut self, path: &str) -> Self {
        self.steps.push(Step::Workdir(path.to_string()));
        self
    }

    pub fn with_file(mut self, dest: &str, source: &str) -> Self {
        self.steps.push(Step::CopyFile {
            source: source.to_string(),
            dest: dest.to_string(),
        });
        self
    }

    pub fn with_exec(mut self, args: &[&str]) -> Self {
        self.steps.push(Step::Exec(argv(args)));
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.steps.push(Step::User(user.to_string()));
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.steps.push(Step::Expose(port));
        self
    }

    pub fn with_entrypoint(mut self, args: &[&str]) -> Self {
        self.steps.push(Step::Entrypoint(argv(args)));
        self
    }

    /// Slack bot アプリケーションのイメージ
    ///
    /// 依存関係のインストールをアプリケーションのコピーより先に行い、
    /// 最終的な実行ユーザーは UID 1001 の非 root ユーザーにします。
    pub fn node_app() -> Self {
        let uid = APP_UID.to_string();
        let workdir_file = |name: &str| format!("{}/{}", WORKDIR, name);

        Self::from_image(BASE_IMAGE)
            .with_workdir(WORKDIR)
            .with_file(&workdir_file("package.json"), "package.json")
            .with_file(&workdir_file("package-lock.json"), "package-lock.json")
            .with_exec(&["npm", "ci", "--only=production"])
            .with_file(&workdir_file(ENTRY_SCRIPT), ENTRY_SCRIPT)
            .with_exec(&["addgroup", "-g", &uid, "-S", APP_USER])
            .with_exec(&["adduser", "-S", APP_USER, "-u", &uid])
            .with_user(APP_USER)
            .with_exposed_port(SERVICE_PORT)
            .with_entrypoint(&["node", ENTRY_SCRIPT])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// コンテキストに存在しなければならないファイル
    pub fn source_files(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::CopyFile { source, .. } => Some(source.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn exposed_ports(&self) -> Vec<u16> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Expose(port) => Some(*port),
                _ => None,
            })
            .collect()
    }

    /// 最後に設定された実行ユーザー
    pub fn final_user(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|step| match step {
            Step::User(user) => Some(user.as_str()),
            _ => None,
        })
    }

    /// 手順の不変条件を検証
    ///
    /// - 先頭はベースイメージ指定
    /// - 最終ユーザーは root 以外
    /// - エントリーポイントのスクリプトは依存関係インストール後にコピー
    pub fn validate(&self) -> BuildResult<()> {
        if !matches!(self.steps.first(), Some(Step::From(_))) {
            return Err(BuildError::InvalidRecipe(
                "recipe must start with a base image".to_string(),
            ));
        }

        match self.final_user() {
            None => {
                return Err(BuildError::InvalidRecipe(
                    "no non-root user is set".to_string(),
                ));
            }
            Some(user) if user == "root" || user == "0" || user.starts_with("0:") => {
                return Err(BuildError::InvalidRecipe(format!(
                    "final user must not be root: {}",
                    user
                )));
            }
            Some(_) => {}
        }

        let last_install = self.steps.iter().rposition(|step| match step {
            Step::Exec(args) => {
                args.len() >= 2
                    && PACKAGE_MANAGERS.contains(&args[0].as_str())
                    && (args[1] == "ci" || args[1] == "install")
            }
            _ => false,
        });

        if let (Some(install_idx), Some(script)) = (last_install, self.entry_script()) {
            let copy_idx = self.steps.iter().position(
                |step| matches!(step, Step::CopyFile { source, .. } if source == script),
            );
            if let Some(copy_idx) = copy_idx
                && copy_idx < install_idx
            {
                return Err(BuildError::InvalidRecipe(format!(
                    "{} is copied before dependencies are installed",
                    script
                )));
            }
        }

        Ok(())
    }

    /// エントリーポイントが起動するスクリプト（最後の引数）
    fn entry_script(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|step| match step {
            Step::Entrypoint(args) if args.len() > 1 => args.last().map(String::as_str),
            _ => None,
        })
    }

    /// Dockerfile としてレンダリング
    pub fn to_dockerfile(&self) -> String {
        let mut lines = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let line = match step {
                Step::From(image) => format!("FROM {}", image),
                Step::Workdir(path) => format!("WORKDIR {}", path),
                Step::CopyFile { source, dest } => {
                    format!("COPY {}", json_array(&[source.clone(), dest.clone()]))
                }
                Step::Exec(args) => format!("RUN {}", json_array(args)),
                Step::User(user) => format!("USER {}", user),
                Step::Expose(port) => format!("EXPOSE {}", port),
                Step::Entrypoint(args) => format!("ENTRYPOINT {}", json_array(args)),
            };
            lines.push(line);
        }

        let mut dockerfile = lines.join("\n");
        dockerfile.push('\n');
        dockerfile
    }
}

impl Default for ImageRecipe {
    fn default() -> Self {
        Self::node_app()
    }
}

fn json_array(args: &[String]) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_app_is_valid() {
        let recipe = ImageRecipe::node_app();
        assert!(recipe.validate().is_ok());
        assert_eq!(recipe.final_user(), Some("nodejs"));
        assert_eq!(recipe.exposed_ports(), vec![6000]);
    }

    #[test]
    fn test_node_app_source_files() {
        let recipe = ImageRecipe::node_app();
        assert_eq!(
            recipe.source_files(),
            vec!["package.json", "package-lock.json", "app.js"]
        );
    }

    #[test]
    fn test_node_app_order() {
        let steps = ImageRecipe::node_app().steps().to_vec();

        let install = steps
            .iter()
            .position(|s| matches!(s, Step::Exec(a) if a[0] == "npm"))
            .unwrap();
        let copy_app = steps
            .iter()
            .position(|s| matches!(s, Step::CopyFile { source, .. } if source == "app.js"))
            .unwrap();
        let user = steps
            .iter()
            .position(|s| matches!(s, Step::User(_)))
            .unwrap();

        assert!(install < copy_app);
        assert!(copy_app < user);
        assert_eq!(steps[0], Step::From("node:20-alpine".to_string()));
        assert_eq!(steps[1], Step::Workdir("/app".to_string()));
    }

    #[test]
    fn test_to_dockerfile() {
        let dockerfile = ImageRecipe::node_app().to_dockerfile();
        let expected = "\
FROM node:20-alpine
WORKDIR /app
COPY [\"package.json\",\"/app/package.json\"]
COPY [\"package-lock.json\",\"/app/package-lock.json\"]
RUN [\"npm\",\"ci\",\"--only=production\"]
COPY [\"app.js\",\"/app/app.js\"]
RUN [\"addgroup\",\"-g\",\"1001\",\"-S\",\"nodejs\"]
RUN [\"adduser\",\"-S\",\"nodejs\",\"-u\",\"1001\"]
USER nodejs
EXPOSE 6000
ENTRYPOINT [\"node\",\"app.js\"]
";
        assert_eq!(dockerfile, expected);
    }

    #[test]
    fn test_root_user_is_rejected() {
        let recipe = ImageRecipe::node_app().with_user("root");
        assert!(matches!(
            recipe.validate(),
            Err(BuildError::InvalidRecipe(_))
        ));

        let recipe = ImageRecipe::from_image("alpine").with_entrypoint(&["sh"]);
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_copy_before_install_is_rejected() {
        let recipe = ImageRecipe::from_image(BASE_IMAGE)
            .with_workdir(WORKDIR)
            .with_file("/app/package.json", "package.json")
            .with_file("/app/app.js", "app.js")
            .with_exec(&["npm", "ci", "--only=production"])
            .with_user(APP_USER)
            .with_entrypoint(&["node", "app.js"]);

        let err = recipe.validate().unwrap_err();
        assert!(err.to_string().contains("app.js"));
    }
}
