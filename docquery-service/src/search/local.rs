//! Keyword search over the files of a local ingestion directory.

use std::path::{Path, PathBuf};

use bm25::{Document, Language, SearchEngineBuilder};
use serde_json::{Value, json};
use tracing::debug;

use super::{SearchContext, SearchEngine, SearchError, SearchOutput, SearchParams};
use crate::progress::report_progress;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "csv", "html", "htm", "py"];
const OUTPUT_DIR: &str = "outputs";
const SNIPPET_CHARS: usize = 300;
// Rough characters-per-token used to honor `token_limit`
const CHARS_PER_TOKEN: usize = 4;

/// BM25 ranking over text files below the index directory.
pub struct LocalSearchEngine {
    max_file_bytes: u64,
}

impl LocalSearchEngine {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

struct LoadedFile {
    id: String,
    path: PathBuf,
    text: String,
}

impl SearchEngine for LocalSearchEngine {
    fn search(
        &self,
        params: &SearchParams,
        ctx: &SearchContext,
    ) -> Result<SearchOutput, SearchError> {
        let root = &ctx.vector_directory;
        if !root.is_dir() {
            return Err(SearchError::IndexNotFound {
                index_name: params.index_name.clone(),
            });
        }
        debug!(
            index = %params.index_name,
            approach = %params.computation_approach,
            decision = %params.computation_decision,
            "Starting local search"
        );

        report_progress("Loading documents", Some(&params.index_name));
        let mut files = Vec::new();
        self.collect_files(root, root, params.include_master_py, &mut files)?;
        report_progress("Loaded documents", Some(&format!("{} files", files.len())));
        ctx.check_cancelled()?;

        let query = build_query(params);
        report_progress("Ranking documents", Some(&query));
        let documents: Vec<Document<String>> = files
            .iter()
            .map(|file| Document {
                id: file.id.clone(),
                contents: file.text.clone(),
            })
            .collect();
        let engine = SearchEngineBuilder::<String>::with_documents(Language::English, documents)
            .build();
        let ranked = engine.search(&query, params.top);
        report_progress(
            "Ranked documents",
            Some(&format!("{} candidates", ranked.len())),
        );
        if params.verbose {
            for hit in &ranked {
                report_progress(
                    "Candidate",
                    Some(&format!("{} (score {:.3})", hit.document.id, hit.score)),
                );
            }
        }
        ctx.check_cancelled()?;

        report_progress("Composing answer", None);
        let terms = query_terms(&query);
        let mut hits = Vec::with_capacity(ranked.len());
        for hit in &ranked {
            let Some(file) = files.iter().find(|f| f.id == hit.document.id) else {
                continue;
            };
            hits.push((file, hit.score, snippet(&file.text, &terms)));
        }

        let mut answer = String::new();
        if params.count {
            answer.push_str(&format!("{} matching documents.\n", hits.len()));
        }
        if hits.is_empty() {
            answer.push_str(&format!("No matching documents found for \"{}\".", params.query));
        } else {
            let lines: Vec<String> = hits
                .iter()
                .map(|(file, _, snippet)| format!("- {}: {}", file.id, snippet))
                .collect();
            answer.push_str(&lines.join("\n"));
        }
        let answer = truncate_chars(&answer, params.token_limit.saturating_mul(CHARS_PER_TOKEN));

        let search_results: Vec<Value> = hits
            .iter()
            .map(|(file, score, snippet)| json!({"file": file.id, "score": score, "snippet": snippet}))
            .collect();
        let references: Vec<Value> = hits.iter().map(|(file, _, _)| json!(file.id)).collect();
        let paths: Vec<Value> = hits
            .iter()
            .map(|(file, _, _)| json!(file.path.display().to_string()))
            .collect();

        let artifact = if params.full_search_output {
            let path = write_artifact(root, &search_results)?;
            report_progress("Saved search output", Some(&path.display().to_string()));
            json!(path.display().to_string())
        } else {
            Value::Null
        };

        Ok(SearchOutput {
            answer,
            references: Value::Array(references),
            artifact,
            search_results: Value::Array(search_results),
            files: Value::Array(paths),
        })
    }
}

impl LocalSearchEngine {
    fn collect_files(
        &self,
        root: &Path,
        dir: &Path,
        include_master: bool,
        out: &mut Vec<LoadedFile>,
    ) -> Result<(), SearchError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SearchError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| SearchError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if path.is_dir() {
                if dir == root && entry.file_name() == OUTPUT_DIR {
                    continue;
                }
                self.collect_files(root, &path, include_master, out)?;
                continue;
            }

            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if !is_text {
                continue;
            }
            let is_master = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("master"));
            if is_master && !include_master {
                continue;
            }
            if entry.metadata().map(|m| m.len()).unwrap_or(0) > self.max_file_bytes {
                debug!(path = %path.display(), "Skipping oversized file");
                continue;
            }

            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => continue,
                Err(source) => return Err(SearchError::Read { path, source }),
            };
            let id = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(LoadedFile { id, path, text });
        }
        Ok(())
    }
}

/// The query plus earlier user turns, capped at `approx_tag_limit` terms
fn build_query(params: &SearchParams) -> String {
    let mut text = params.query.clone();
    for turn in params.conversation_history.iter().filter(|m| m.role == "user") {
        text.push(' ');
        text.push_str(&turn.content);
    }
    if params.approx_tag_limit == 0 {
        return text;
    }
    text.split_whitespace()
        .take(params.approx_tag_limit)
        .collect::<Vec<_>>()
        .join(" ")
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Line mentioning the most distinct query terms (earliest on ties), or the
/// start of the file
fn snippet(text: &str, terms: &[String]) -> String {
    let mut best: Option<(&str, usize)> = None;
    for line in text.lines() {
        let lower = line.to_lowercase();
        let matched = terms
            .iter()
            .enumerate()
            .filter(|&(i, t)| !terms[..i].contains(t) && lower.contains(t.as_str()))
            .count();
        if matched > 0 && best.is_none_or(|(_, most)| matched > most) {
            best = Some((line, matched));
        }
    }
    let line = best
        .map(|(line, _)| line)
        .or_else(|| text.lines().find(|l| !l.trim().is_empty()))
        .unwrap_or("");
    truncate_chars(line.trim(), SNIPPET_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn write_artifact(root: &Path, results: &[Value]) -> Result<PathBuf, SearchError> {
    let dir = root.join(OUTPUT_DIR);
    std::fs::create_dir_all(&dir).map_err(|source| SearchError::WriteArtifact {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(format!("search_{}.json", uuid::Uuid::new_v4()));
    let body = serde_json::to_vec_pretty(results).map_err(|e| SearchError::Failed {
        message: e.to_string(),
    })?;
    std::fs::write(&path, body).map_err(|source| SearchError::WriteArtifact {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressHook, install_hook};
    use crate::search::test_support::params;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    fn index_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        std::fs::write(
            downloads.join("revenue.txt"),
            "Quarterly report\nRevenue grew 12 percent in the third quarter.\n",
        )
        .unwrap();
        std::fs::write(
            downloads.join("hiring.md"),
            "# Hiring\nWe hired forty engineers this year.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("master.py"), "revenue = load()\n").unwrap();
        std::fs::write(downloads.join("logo.png"), [0u8, 159, 146, 150]).unwrap();
        dir
    }

    fn ctx(dir: &Path) -> SearchContext {
        SearchContext::new(dir.to_path_buf(), CancellationToken::new())
    }

    #[test]
    fn test_ranks_matching_file_first() {
        let dir = index_dir();
        let engine = LocalSearchEngine::new(1024 * 1024);
        let mut params = params("revenue quarter");
        params.include_master_py = false;

        let output = engine.search(&params, &ctx(dir.path())).unwrap();

        assert_eq!(output.references[0], json!("downloads/revenue.txt"));
        assert!(output.answer.contains("Revenue grew 12 percent"));
        assert_eq!(output.artifact, Value::Null);
        let refs = output.references.as_array().unwrap();
        assert!(!refs.contains(&json!("master.py")));
    }

    #[test]
    fn test_master_document_included_on_request() {
        let dir = index_dir();
        let engine = LocalSearchEngine::new(1024 * 1024);
        let output = engine.search(&params("revenue"), &ctx(dir.path())).unwrap();
        let refs = output.references.as_array().unwrap();
        assert!(refs.contains(&json!("master.py")));
    }

    #[test]
    fn test_full_output_writes_artifact() {
        let dir = index_dir();
        let engine = LocalSearchEngine::new(1024 * 1024);
        let mut params = params("hired engineers");
        params.full_search_output = true;

        let output = engine.search(&params, &ctx(dir.path())).unwrap();

        let path = PathBuf::from(output.artifact.as_str().unwrap());
        assert!(path.starts_with(dir.path().join("outputs")));
        let saved: Vec<Value> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved[0]["file"], json!("downloads/hiring.md"));
    }

    #[test]
    fn test_reports_progress_through_hook() {
        let dir = index_dir();
        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = steps.clone();
        let hook: ProgressHook = Arc::new(move |message, _| {
            sink.lock().unwrap().push(message.to_string());
        });
        let _guard = install_hook(hook);

        LocalSearchEngine::new(1024 * 1024)
            .search(&params("revenue"), &ctx(dir.path()))
            .unwrap();

        let steps = steps.lock().unwrap();
        assert_eq!(steps.first().map(String::as_str), Some("Loading documents"));
        assert_eq!(steps.last().map(String::as_str), Some("Composing answer"));
    }

    #[test]
    fn test_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalSearchEngine::new(1024)
            .search(&params("x"), &ctx(&dir.path().join("absent")))
            .unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound { .. }));
    }

    #[test]
    fn test_cancelled_search_stops() {
        let dir = index_dir();
        let token = CancellationToken::new();
        token.cancel();
        let err = LocalSearchEngine::new(1024 * 1024)
            .search(
                &params("revenue"),
                &SearchContext::new(dir.path().to_path_buf(), token),
            )
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
    }

    #[test]
    fn test_token_limit_truncates_answer() {
        let dir = index_dir();
        let mut params = params("revenue quarter");
        params.token_limit = 2;
        let output = LocalSearchEngine::new(1024 * 1024)
            .search(&params, &ctx(dir.path()))
            .unwrap();
        assert!(output.answer.chars().count() <= 8);
    }

    #[test]
    fn test_snippet_prefers_line_with_most_terms() {
        let text = "Quarterly report\nRevenue grew 12 percent in the third quarter.\n";
        let terms = query_terms("revenue quarter");
        assert_eq!(
            snippet(text, &terms),
            "Revenue grew 12 percent in the third quarter."
        );

        // Repeated terms count once; ties go to the earliest line
        let terms = query_terms("quarter quarter revenue");
        assert_eq!(
            snippet("quarter one\nquarter two\nrevenue quarter\n", &terms),
            "revenue quarter"
        );
        assert_eq!(snippet("a quarter\nthe revenue\n", &terms), "a quarter");

        assert_eq!(snippet("\n  intro line\nmore\n", &terms), "intro line");
    }

    #[test]
    fn test_build_query_caps_terms() {
        let mut params = params("one two three");
        params.conversation_history = vec![crate::search::HistoryMessage {
            role: "user".to_string(),
            content: "four five".to_string(),
        }];
        params.approx_tag_limit = 4;
        assert_eq!(build_query(&params), "one two three four");
    }
}
