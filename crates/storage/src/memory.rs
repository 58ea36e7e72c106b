//! 인메모리 스토리지 — 테스트와 단일 실행용
//!
//! 내구성이 없는 스토리지 백엔드입니다. 단위 테스트, 소규모 시나리오,
//! 캐시 없이 한 번만 실행하는 경우에 적합합니다. 동일 인스턴스가
//! 리더와 라이터를 겸하도록 `Arc`로 공유해 사용합니다.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use provost_core::criteria::ScannerCriteria;
use provost_core::error::StorageError;
use provost_core::package::Package;
use provost_core::provenance::KnownProvenance;
use provost_core::scan::{NestedProvenanceScanResult, ScanResult};
use provost_core::storage::{
    PackageScanReader, PackageScanWriter, ProvenanceScanReader, ProvenanceScanWriter,
};

/// 출처 키 인메모리 스토리지
///
/// 출처의 표준 키 문자열로 결과 목록을 보관합니다. 쓰기는
/// (출처, 스캐너 식별 정보)별로 멱등합니다.
#[derive(Debug, Default)]
pub struct MemoryProvenanceScanStorage {
    results: RwLock<BTreeMap<String, Vec<ScanResult>>>,
}

impl MemoryProvenanceScanStorage {
    /// 빈 스토리지를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 결과 수를 반환합니다 (테스트용).
    pub async fn len(&self) -> usize {
        self.results.read().await.values().map(Vec::len).sum()
    }

    /// 스토리지가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl ProvenanceScanReader for MemoryProvenanceScanStorage {
    fn name(&self) -> &str {
        "memory-provenance"
    }

    async fn read(
        &self,
        provenance: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<ScanResult>, StorageError> {
        let results = self.results.read().await;
        Ok(results
            .get(&provenance.storage_key())
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|result| criteria.matches(&result.scanner))
            .cloned()
            .collect())
    }
}

impl ProvenanceScanWriter for MemoryProvenanceScanStorage {
    fn name(&self) -> &str {
        "memory-provenance"
    }

    async fn write(
        &self,
        provenance: &KnownProvenance,
        result: &ScanResult,
    ) -> Result<(), StorageError> {
        let mut results = self.results.write().await;
        let entry = results.entry(provenance.storage_key()).or_default();
        // 동일 스캐너 식별 정보의 기존 결과를 대체한다 (멱등성)
        entry.retain(|stored| stored.scanner != result.scanner);
        entry.push(result.clone());
        Ok(())
    }
}

/// 패키지 키 인메모리 스토리지
///
/// 패키지 식별자로 중첩 결과 트리 목록을 보관합니다.
#[derive(Debug, Default)]
pub struct MemoryPackageScanStorage {
    results: RwLock<BTreeMap<String, Vec<NestedProvenanceScanResult>>>,
}

impl MemoryPackageScanStorage {
    /// 빈 스토리지를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 트리 수를 반환합니다 (테스트용).
    pub async fn len(&self) -> usize {
        self.results.read().await.values().map(Vec::len).sum()
    }

    /// 스토리지가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl PackageScanReader for MemoryPackageScanStorage {
    fn name(&self) -> &str {
        "memory-package"
    }

    async fn read(
        &self,
        package: &Package,
        criteria: &ScannerCriteria,
    ) -> Result<Vec<NestedProvenanceScanResult>, StorageError> {
        let results = self.results.read().await;
        Ok(results
            .get(&package.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|tree| filter_tree(tree, criteria))
            .collect())
    }
}

impl PackageScanWriter for MemoryPackageScanStorage {
    fn name(&self) -> &str {
        "memory-package"
    }

    async fn write(
        &self,
        package: &Package,
        result: &NestedProvenanceScanResult,
    ) -> Result<(), StorageError> {
        let mut results = self.results.write().await;
        let entry = results.entry(package.id.clone()).or_default();
        // 동일 루트 출처의 기존 트리를 대체한다 (멱등성)
        entry.retain(|stored| {
            stored.nested_provenance.root() != result.nested_provenance.root()
        });
        entry.push(result.clone());
        Ok(())
    }
}

/// 트리의 결과를 기준으로 필터링합니다. 전부 걸러지면 `None`.
fn filter_tree(
    tree: &NestedProvenanceScanResult,
    criteria: &ScannerCriteria,
) -> Option<NestedProvenanceScanResult> {
    let filtered: BTreeMap<KnownProvenance, Vec<ScanResult>> = tree
        .scan_results
        .iter()
        .map(|(provenance, results)| {
            let matching: Vec<ScanResult> = results
                .iter()
                .filter(|result| criteria.matches(&result.scanner))
                .cloned()
                .collect();
            (provenance.clone(), matching)
        })
        .collect();

    if filtered.values().all(Vec::is_empty) {
        return None;
    }
    Some(NestedProvenanceScanResult::new(
        tree.nested_provenance.clone(),
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
        KnownProvenance::Artifact(ArtifactProvenance::new("https://example.org/a.zip", None))
    }

    fn result(scanner: &str, version: &str) -> ScanResult {
        let now = SystemTime::now();
        ScanResult::new(
            provenance().into(),
            ScannerDetails::new(scanner, version, ""),
            ScanSummary::empty(now, now),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let storage = MemoryProvenanceScanStorage::new();
        let stored = result("scancode", "32.1.0");
        storage.write(&provenance(), &stored).await.unwrap();

        let criteria = ScannerCriteria::for_details(&stored.scanner).unwrap();
        let read_back = storage.read(&provenance(), &criteria).await.unwrap();
        assert_eq!(read_back, vec![stored]);
    }

    #[tokio::test]
    async fn read_filters_by_criteria() {
        let storage = MemoryProvenanceScanStorage::new();
        storage
            .write(&provenance(), &result("scancode", "32.1.0"))
            .await
            .unwrap();
        storage
            .write(&provenance(), &result("scancode", "31.0.0"))
            .await
            .unwrap();

        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        let read_back = storage.read(&provenance(), &criteria).await.unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].scanner.version, "32.1.0");
    }

    #[tokio::test]
    async fn write_is_idempotent_per_scanner_details() {
        let storage = MemoryProvenanceScanStorage::new();
        storage
            .write(&provenance(), &result("scancode", "32.1.0"))
            .await
            .unwrap();
        storage
            .write(&provenance(), &result("scancode", "32.1.0"))
            .await
            .unwrap();

        assert_eq!(storage.len().await, 1);

        // 다른 버전은 별도 항목
        storage
            .write(&provenance(), &result("scancode", "32.2.0"))
            .await
            .unwrap();
        assert_eq!(storage.len().await, 2);
    }

    #[tokio::test]
    async fn package_storage_filters_empty_trees() {
        use provost_core::provenance::NestedProvenance;

        let storage = MemoryPackageScanStorage::new();
        let package = Package::new("pkg:x");
        let nested = NestedProvenance::root_only(provenance());

        let mut scan_results = BTreeMap::new();
        scan_results.insert(provenance(), vec![result("scancode", "32.1.0")]);
        let tree = NestedProvenanceScanResult::new(nested, scan_results);
        storage.write(&package, &tree).await.unwrap();

        // 일치하는 기준 → 트리 반환
        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        let trees = storage.read(&package, &criteria).await.unwrap();
        assert_eq!(trees.len(), 1);

        // 일치하지 않는 기준 → 빈 결과
        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("licensee", "9.15.0", ""))
                .unwrap();
        let trees = storage.read(&package, &criteria).await.unwrap();
        assert!(trees.is_empty());
    }

    #[tokio::test]
    async fn package_write_replaces_same_root() {
        use provost_core::provenance::NestedProvenance;

        let storage = MemoryPackageScanStorage::new();
        let package = Package::new("pkg:x");
        let nested = NestedProvenance::root_only(provenance());

        let mut scan_results = BTreeMap::new();
        scan_results.insert(provenance(), vec![result("scancode", "32.1.0")]);
        let tree = NestedProvenanceScanResult::new(nested, scan_results);

        storage.write(&package, &tree).await.unwrap();
        storage.write(&package, &tree).await.unwrap();
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_keys_read_as_empty() {
        let storage = MemoryProvenanceScanStorage::new();
        let criteria =
            ScannerCriteria::for_details(&ScannerDetails::new("scancode", "32.1.0", ""))
                .unwrap();
        assert!(storage
            .read(&provenance(), &criteria)
            .await
            .unwrap()
            .is_empty());

        let packages = MemoryPackageScanStorage::new();
        assert!(packages
            .read(&Package::new("pkg:missing"), &criteria)
            .await
            .unwrap()
            .is_empty());
    }
}
