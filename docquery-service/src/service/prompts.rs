//! Prompt documents, versioned prompt files and ingestion logs.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::DocQueryService;
use crate::db::Collection;
use crate::error::{ServiceError, ServiceResult};
use crate::search::is_safe_segment;

const PROMPT_FILE_PREFIX: &str = "system_prompt_ver_";
const PROMPT_FILE_SUFFIX: &str = ".txt";

impl DocQueryService {
    pub fn list_prompts(&self) -> ServiceResult<Vec<Value>> {
        self.db.list_documents(Collection::Prompts)
    }

    /// Store a new prompt document. Its `id` must not be taken.
    pub fn create_prompt(&self, prompt: Value) -> ServiceResult<Value> {
        let id = prompt_id(&prompt)?;
        if !self.db.create_document(Collection::Prompts, &id, &prompt)? {
            return Err(ServiceError::PromptAlreadyExists { prompt_id: id });
        }
        info!(prompt_id = %id, "Created prompt");
        Ok(prompt)
    }

    pub fn upsert_prompt(&self, prompt: Value) -> ServiceResult<Value> {
        let id = prompt_id(&prompt)?;
        self.db.upsert_document(Collection::Prompts, &id, &prompt)?;
        info!(prompt_id = %id, "Upserted prompt");
        Ok(prompt)
    }

    pub fn delete_prompt(&self, id: &str) -> ServiceResult<()> {
        if !self.db.delete_document(Collection::Prompts, id)? {
            return Err(ServiceError::PromptNotFound {
                prompt_id: id.to_string(),
            });
        }
        info!(prompt_id = %id, "Deleted prompt");
        Ok(())
    }

    /// Text of the highest `system_prompt_ver_N.txt` under `<prompts_dir>/<id>`
    pub fn latest_prompt_text(&self, id: &str) -> ServiceResult<String> {
        let not_found = || ServiceError::PromptNotFound {
            prompt_id: id.to_string(),
        };
        if !is_safe_segment(id) {
            return Err(not_found());
        }

        let dir = self.config.storage.prompts_dir.join(id);
        let path = latest_prompt_file(&dir)?.ok_or_else(not_found)?;
        debug!(prompt_id = %id, path = %path.display(), "Reading prompt file");

        std::fs::read_to_string(&path).map_err(|source| ServiceError::Storage { path, source })
    }

    /// Ingestion log document for an index
    pub fn index_log(&self, index_name: &str) -> ServiceResult<Value> {
        self.db
            .get_document(Collection::Logs, index_name)?
            .ok_or_else(|| ServiceError::LogNotFound {
                index_name: index_name.to_string(),
            })
    }
}

fn prompt_id(prompt: &Value) -> ServiceResult<String> {
    match prompt.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(ServiceError::Validation {
            message: "prompt id must be a non-empty string".to_string(),
            details: Some(serde_json::json!([{ "loc": ["body", "id"], "msg": "field required" }])),
        }),
    }
}

fn prompt_version(file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(PROMPT_FILE_PREFIX)?
        .strip_suffix(PROMPT_FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn latest_prompt_file(dir: &Path) -> ServiceResult<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ServiceError::Storage {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let latest = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let version = prompt_version(entry.file_name().to_str()?)?;
            Some((version, entry.path()))
        })
        .max_by_key(|(version, _)| *version)
        .map(|(_, path)| path);

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::EchoEngine;
    use crate::service::test_support::service_with_engine;
    use serde_json::json;
    use std::sync::Arc;

    fn service(dir: &Path) -> DocQueryService {
        service_with_engine(dir, Arc::new(EchoEngine { steps: 0 }))
    }

    #[test]
    fn test_prompt_version() {
        assert_eq!(prompt_version("system_prompt_ver_3.txt"), Some(3));
        assert_eq!(prompt_version("system_prompt_ver_12.txt"), Some(12));
        assert_eq!(prompt_version("system_prompt_ver_.txt"), None);
        assert_eq!(prompt_version("system_prompt_ver_-1.txt"), None);
        assert_eq!(prompt_version("system_prompt_ver_2.md"), None);
        assert_eq!(prompt_version("notes.txt"), None);
    }

    #[test]
    fn test_latest_prompt_uses_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let prompt_dir = dir.path().join("prompts/analyst");
        std::fs::create_dir_all(&prompt_dir).unwrap();
        std::fs::write(prompt_dir.join("system_prompt_ver_2.txt"), "two").unwrap();
        std::fs::write(prompt_dir.join("system_prompt_ver_10.txt"), "ten").unwrap();
        std::fs::write(prompt_dir.join("system_prompt_ver_9.txt"), "nine").unwrap();

        assert_eq!(service.latest_prompt_text("analyst").unwrap(), "ten");
    }

    #[test]
    fn test_latest_prompt_missing() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(
            service.latest_prompt_text("nobody"),
            Err(ServiceError::PromptNotFound { .. })
        ));
        assert!(matches!(
            service.latest_prompt_text(".."),
            Err(ServiceError::PromptNotFound { .. })
        ));
    }

    #[test]
    fn test_prompt_crud() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let prompt = json!({"id": "p1", "text": "Be brief"});

        service.create_prompt(prompt.clone()).unwrap();
        assert!(matches!(
            service.create_prompt(prompt.clone()),
            Err(ServiceError::PromptAlreadyExists { .. })
        ));

        service
            .upsert_prompt(json!({"id": "p1", "text": "Be thorough"}))
            .unwrap();
        assert_eq!(
            service.list_prompts().unwrap(),
            vec![json!({"id": "p1", "text": "Be thorough"})]
        );

        service.delete_prompt("p1").unwrap();
        assert!(matches!(
            service.delete_prompt("p1"),
            Err(ServiceError::PromptNotFound { .. })
        ));
    }

    #[test]
    fn test_prompt_requires_string_id() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        for body in [json!({"text": "x"}), json!({"id": 7}), json!({"id": ""})] {
            assert!(matches!(
                service.create_prompt(body),
                Err(ServiceError::Validation { .. })
            ));
        }
    }

    #[test]
    fn test_index_log() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(
            service.index_log("reports"),
            Err(ServiceError::LogNotFound { .. })
        ));

        let log = json!({"id": "reports", "entries": ["started"]});
        service
            .db
            .upsert_document(Collection::Logs, "reports", &log)
            .unwrap();
        assert_eq!(service.index_log("reports").unwrap(), log);
    }
}
