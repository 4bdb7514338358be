use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;

#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes through a sibling temp file so readers never see a partial record.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, data).await?;
        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key);
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Keys of every `.json` file directly under `dir`; empty when `dir` does not exist.
    pub async fn list_json(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve_path(dir);
        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                keys.push(format!("{}/{name}", dir.trim_end_matches('/')));
            }
        }
        Ok(keys)
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        let normalized = key.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        assert_eq!(storage.get("history/a.json").await.unwrap(), None);
        storage.put("history/a.json", b"{}").await.unwrap();
        assert_eq!(storage.get("history/a.json").await.unwrap(), Some(b"{}".to_vec()));
        assert!(!storage.resolve_path("history/a.json.tmp").exists());

        assert!(storage.delete("history/a.json").await.unwrap());
        assert!(!storage.delete("history/a.json").await.unwrap());
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());
        std::fs::create_dir_all(dir.path().join("history/a.json/occupied")).unwrap();

        assert!(storage.put("history/a.json", b"{}").await.is_err());
        assert!(!storage.resolve_path("history/a.json.tmp").exists());
    }

    #[tokio::test]
    async fn list_json_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        assert!(storage.list_json("history").await.unwrap().is_empty());
        storage.put("history/a.json", b"{}").await.unwrap();
        storage.put("history/notes.txt", b"x").await.unwrap();

        let keys = storage.list_json("history").await.unwrap();
        assert_eq!(keys, vec!["history/a.json".to_string()]);
    }
}
