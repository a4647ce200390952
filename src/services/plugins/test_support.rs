//! Shell-script plugin fixtures for unit tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::services::plugins::remote::{RegistryClient, RegistryListing};
use crate::utils::error::{AppError, AppResult};

pub const PING_ACTIONS: &str = r#"[{"id":"ping","title":"Ping","description":"Reply with pong"}]"#;
pub const PONG_ACTIONS: &str = r#"[{"id":"pong","title":"Pong"}]"#;

const SCRIPT: &str = r#"while IFS= read -r line; do
  case "$line" in
    *'"method":"actions"'*)
      printf '%s\n' '{"result":__ACTIONS__}'
      ;;
    *'"method":"run"'*)
      action=$(printf '%s' "$line" | sed -n 's/.*"action":"\([^"]*\)".*/\1/p')
      keyword=$(printf '%s' "$line" | sed -n 's/.*"keyword":"\([^"]*\)".*/\1/p')
      if [ "$action" = "fail" ]; then
        printf '%s\n' '{"error":"boom"}'
      else
        printf '{"result":{"plugin":"%s","action":"%s","keyword":"%s"}}\n' "$BEACON_PLUGIN_ID" "$action" "$keyword"
      fi
      ;;
    *)
      printf '%s\n' '{"error":"unknown method"}'
      ;;
  esac
done
"#;

/// Write `<root>/<name>` as a plugin answering `actions` with `actions`.
pub fn write_sh_plugin(root: &Path, name: &str, actions: &str) -> PathBuf {
    write_raw_plugin(root, name, &SCRIPT.replace("__ACTIONS__", actions))
}

/// Write `<root>/<name>` with an arbitrary `main.sh` body.
pub fn write_raw_plugin(root: &Path, name: &str, script: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("package.json"),
        format!(
            r#"{{"name":"{}","version":"1.0.0","description":"{} plugin","main":"main.sh","keywords":["beacon-plugin"]}}"#,
            name, name
        ),
    )
    .unwrap();
    std::fs::write(dir.join("main.sh"), script).unwrap();
    dir
}

/// Write a directory whose manifest is not valid JSON.
pub fn write_broken_plugin(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), "{ not json").unwrap();
    dir
}

/// Registry that lists nothing.
pub struct EmptyRegistry;

#[async_trait]
impl RegistryClient for EmptyRegistry {
    fn registry_url(&self) -> &str {
        "https://registry.test"
    }

    async fn search(&self, _keyword: &str) -> AppResult<Vec<RegistryListing>> {
        Ok(vec![])
    }

    async fn fetch_artifact(&self, _listing: &RegistryListing) -> AppResult<Vec<u8>> {
        Err(AppError::registry("no artifacts"))
    }
}
