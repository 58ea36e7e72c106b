//! 로컬 파일 시스템 스토리지 — 실행 간 결과 보존
//!
//! 키(출처의 표준 문자열 또는 패키지 식별자)의 SHA-256 다이제스트를
//! 디렉토리 이름으로 사용해 키별 JSON 문서 하나를 보관합니다:
//!
//! ```text
//! <root>/<sha256(key)>/scan-results.json
//! ```
//!
//! 키를 다이제스트로 변환하므로 URL의 특수 문자가 경로에 섞이지
//! 않습니다. 쓰기는 읽기-수정-쓰기로 동일 스캐너 식별 정보의 기존
//! 항목을 대체합니다.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use provost_core::criteria::ScannerCriteria;
use provost_core::error::StorageError;
use provost_core::package::Package;
use provost_core::provenance::KnownProvenance;
use provost_core::scan::{NestedProvenanceScanResult, ScanResult};
use provost_core::storage::{
    PackageScanReader, PackageScanWriter, ProvenanceScanReader, ProvenanceScanWriter,
};

/// 키별 결과 문서 파일명
const RESULTS_FILE: &str = "scan-results.json";

/// 출처 키 파일 시스템 스토리지
#[derive(Debug, Clone)]
pub struct FileProvenanceScanStorage {
    root: PathBuf,
}

impl FileProvenanceScanStorage {
    /// 주어진 루트 디렉토리를 사용하는 스토리지를 생성합니다.
    ///
    /// 디렉토리는 첫 쓰기 시점에 생성됩니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(key_digest(key)).join(RESULTS_FILE)
    }
}

impl ProvenanceScanReader for FileProvenanceScanStorage {
    fn name(&self) -> &str {
        "fs-provenance"
    }

    async fn read(
        &self,
        provenance: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<ScanResult>, StorageError> {
        let key = provenance.storage_key();
        let stored: Vec<ScanResult> = read_document(&self.document_path(&key), &key).await?;
        Ok(stored
            .into_iter()
            .filter(|result| criteria.matches(&result.scanner))
            .collect())
    }
}

impl ProvenanceScanWriter for FileProvenanceScanStorage {
    fn name(&self) -> &str {
        "fs-provenance"
    }

    async fn write(
        &self,
        provenance: &KnownProvenance,
        result: &ScanResult,
    ) -> Result<(), StorageError> {
        let key = provenance.storage_key();
        let path = self.document_path(&key);

        let mut stored: Vec<ScanResult> = read_document(&path, &key).await?;
        // 동일 스캐너 식별 정보의 기존 결과를 대체한다 (멱등성)
        stored.retain(|existing| existing.scanner != result.scanner);
        stored.push(result.clone());

        write_document(&path, &key, &stored).await?;
        debug!(key = %key, results = stored.len(), "persisted provenance scan results");
        Ok(())
    }
}

/// 패키지 키 파일 시스템 스토리지
#[derive(Debug, Clone)]
pub struct FilePackageScanStorage {
    root: PathBuf,
}

impl FilePackageScanStorage {
    /// 주어진 루트 디렉토리를 사용하는 스토리지를 생성합니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(key_digest(key)).join(RESULTS_FILE)
    }
}

impl PackageScanReader for FilePackageScanStorage {
    fn name(&self) -> &str {
        "fs-package"
    }

    async fn read(
        &self,
        package: &Package,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<NestedProvenanceScanResult>, StorageError> {
        let stored: Vec<NestedProvenanceScanResult> =
            read_document(&self.document_path(&package.id), &package.id).await?;
        Ok(stored
            .into_iter()
            .filter_map(|tree| filter_tree(tree, criteria))
            .collect())
    }
}

impl PackageScanWriter for FilePackageScanStorage {
    fn name(&self) -> &str {
        "fs-package"
    }

    async fn write(
        &self,
        package: &Package,
        result: &NestedProvenanceScanResult,
    ) -> Result<(), StorageError> {
        let path = self.document_path(&package.id);

        let mut stored: Vec<NestedProvenanceScanResult> =
            read_document(&path, &package.id).await?;
        // 동일 루트 출처의 기존 트리를 대체한다 (멱등성)
        stored.retain(|existing| {
            existing.nested_provenance.root() != result.nested_provenance.root()
        });
        stored.push(result.clone());

        write_document(&path, &package.id, &stored).await?;
        debug!(package = %package.id, trees = stored.len(), "persisted package scan results");
        Ok(())
    }
}

/// 키의 SHA-256 다이제스트를 소문자 16진수로 반환합니다.
fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// JSON 문서를 읽습니다. 파일이 없으면 기본값을 반환합니다.
async fn read_document<T>(path: &Path, key: &str) -> Result<T, StorageError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(StorageError::Read {
                key: key.to_owned(),
                reason: e.to_string(),
            });
        }
    };
    serde_json::from_str(&content).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// JSON 문서를 기록합니다. 부모 디렉토리를 필요 시 생성합니다.
async fn write_document<T>(path: &Path, key: &str, value: &T) -> Result<(), StorageError>
where
    T: serde::Serialize,
{
    let to_write_error = |reason: String| StorageError::Write {
        key: key.to_owned(),
        reason,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| to_write_error(e.to_string()))?;
    }
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| to_write_error(e.to_string()))
}

/// 트리의 결과를 기준으로 필터링합니다. 전부 걸러지면 `None`.
fn filter_tree(
    tree: NestedProvenanceScanResult,
    criteria: &ScannerCriteria,
) -> Option<NestedProvenanceScanResult> {
    let filtered: std::collections::BTreeMap<KnownProvenance, Vec<ScanResult>> = tree
        .scan_results
        .into_iter()
        .map(|(provenance, results)| {
            let matching: Vec<ScanResult> = results
                .into_iter()
                .filter(|result| criteria.matches(&result.scanner))
                .collect();
            (provenance, matching)
        })
        .collect();

    if filtered.values().all(Vec::is_empty) {
        return None;
    }
    Some(NestedProvenanceScanResult::new(
        tree.nested_provenance,
        filtered,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use provost_core::provenance::ArtifactProvenance;
    use provost_core::scan::{ScanSummary, ScannerDetails};
    use std::time::SystemTime;

    fn provenance() -> KnownProvenance {
        KnownProvenance::Artifact(ArtifactProvenance::new(
            "https://example.org/archive.tar.gz",
            Some("deadbeef".to_owned()),
        ))
    }

    fn result(version: &str) -> ScanResult {
        let now = SystemTime::now();
        ScanResult::new(
            provenance().into(),
            ScannerDetails::new("scancode", version, ""),
            ScanSummary::empty(now, now),
        )
    }

    #[test]
    fn key_digest_is_stable_hex() {
        let digest = key_digest("artifact:https://example.org/a.zip|");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, key_digest("artifact:https://example.org/a.zip|"));
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileProvenanceScanStorage::new(dir.path());
        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        assert!(storage
            .read(&provenance(), &criteria)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileProvenanceScanStorage::new(dir.path());
        let stored = result("32.1.0");
        storage.write(&provenance(), &stored).await.unwrap();

        let criteria = ScannerCriteria::for_details(&stored.scanner).unwrap();
        let read_back = storage.read(&provenance(), &criteria).await.unwrap();
        assert_eq!(read_back, vec![stored]);
    }

    #[tokio::test]
    async fn results_survive_reopening_storage() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileProvenanceScanStorage::new(dir.path());
            storage.write(&provenance(), &result("32.1.0")).await.unwrap();
        }

        let reopened = FileProvenanceScanStorage::new(dir.path());
        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        assert_eq!(reopened.read(&provenance(), &criteria).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_is_idempotent_per_scanner_details() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileProvenanceScanStorage::new(dir.path());
        storage.write(&provenance(), &result("32.1.0")).await.unwrap();
        storage.write(&provenance(), &result("32.1.0")).await.unwrap();

        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        assert_eq!(storage.read(&provenance(), &criteria).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileProvenanceScanStorage::new(dir.path());
        let path = storage.document_path(&provenance().storage_key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        let err = storage.read(&provenance(), &criteria).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
