//! Integration tests for the storage backends.
//!
//! Exercises the full round-trip contract: a nested scan result written
//! through the writer traits must read back as an equivalent object when
//! the criteria match the stored scanner details.

use std::collections::BTreeMap;
use std::time::SystemTime;

use provost_core::criteria::ScannerCriteria;
use provost_core::package::Package;
use provost_core::provenance::{
    ArtifactProvenance, KnownProvenance, NestedProvenance, RepositoryProvenance, VcsType,
};
use provost_core::scan::{
    LicenseFinding, NestedProvenanceScanResult, ScanResult, ScanSummary, ScannerDetails,
    TextLocation,
};
use provost_core::storage::{
    PackageScanReader, PackageScanWriter, ProvenanceScanReader, ProvenanceScanWriter,
};
use provost_storage::{
    FilePackageScanStorage, FileProvenanceScanStorage, MemoryPackageScanStorage,
    MemoryProvenanceScanStorage,
};

fn repository() -> KnownProvenance {
    KnownProvenance::Repository(RepositoryProvenance {
        vcs_type: VcsType::Git,
        url: "https://example.org/repo.git".to_owned(),
        revision: "v2.4.0".to_owned(),
        path: String::new(),
        resolved_revision: "4f5a6b7c".to_owned(),
    })
}

fn sub_artifact() -> KnownProvenance {
    KnownProvenance::Artifact(ArtifactProvenance::new(
        "https://example.org/vendored.tar.gz",
        Some("cafebabe".to_owned()),
    ))
}

fn details() -> ScannerDetails {
    ScannerDetails::new("scancode", "32.1.0", "--license --copyright")
}

fn scan_result(provenance: &KnownProvenance) -> ScanResult {
    let now = SystemTime::now();
    let mut summary = ScanSummary::empty(now, now);
    summary.licenses.insert(LicenseFinding::new(
        "Apache-2.0",
        TextLocation::new("LICENSE", 1, 201),
    ));
    summary.licenses.insert(LicenseFinding::new(
        "MIT",
        TextLocation::new("vendor/MIT.txt", 1, 21),
    ));
    ScanResult::new(provenance.clone().into(), details(), summary)
}

fn nested_result() -> NestedProvenanceScanResult {
    let mut subs = BTreeMap::new();
    subs.insert("vendor/lib".to_owned(), sub_artifact());
    let nested = NestedProvenance::new(repository(), subs).unwrap();

    let mut scan_results = BTreeMap::new();
    scan_results.insert(repository(), vec![scan_result(&repository())]);
    scan_results.insert(sub_artifact(), vec![scan_result(&sub_artifact())]);
    NestedProvenanceScanResult::new(nested, scan_results)
}

#[tokio::test]
async fn memory_nested_result_round_trip() {
    let storage = MemoryPackageScanStorage::new();
    let package = Package::new("pkg:round-trip");
    let written = nested_result();

    storage.write(&package, &written).await.unwrap();

    let criteria = ScannerCriteria::for_details(&details()).unwrap();
    let read_back = storage.read(&package, &criteria).await.unwrap();
    assert_eq!(read_back, vec![written]);
}

#[tokio::test]
async fn fs_nested_result_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FilePackageScanStorage::new(dir.path());
    let package = Package::new("pkg:round-trip");
    let written = nested_result();

    storage.write(&package, &written).await.unwrap();

    let criteria = ScannerCriteria::for_details(&details()).unwrap();
    let read_back = storage.read(&package, &criteria).await.unwrap();
    assert_eq!(read_back, vec![written]);
}

#[tokio::test]
async fn fs_provenance_round_trip_preserves_findings_order() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileProvenanceScanStorage::new(dir.path());
    let written = scan_result(&repository());

    storage.write(&repository(), &written).await.unwrap();

    let criteria = ScannerCriteria::for_details(&details()).unwrap();
    let read_back = storage.read(&repository(), &criteria).await.unwrap();
    assert_eq!(read_back, vec![written.clone()]);

    // Findings sets stay sorted by (path, start line, end line, value).
    let paths: Vec<&str> = read_back[0]
        .summary
        .licenses
        .iter()
        .map(|f| f.location.path.as_str())
        .collect();
    assert_eq!(paths, vec!["LICENSE", "vendor/MIT.txt"]);
}

#[tokio::test]
async fn mismatching_criteria_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileProvenanceScanStorage::new(dir.path());
    storage
        .write(&repository(), &scan_result(&repository()))
        .await
        .unwrap();

    // Version outside the accepted range.
    let newer = ScannerDetails::new("scancode", "33.0.0", "--license --copyright");
    let criteria = ScannerCriteria::for_details(&newer).unwrap();
    assert!(storage
        .read(&repository(), &criteria)
        .await
        .unwrap()
        .is_empty());

    // Different configuration fingerprint.
    let other_config = ScannerDetails::new("scancode", "32.1.0", "--license");
    let criteria = ScannerCriteria::for_details(&other_config).unwrap();
    assert!(storage
        .read(&repository(), &criteria)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn provenance_key_distinguishes_resolved_revisions() {
    let storage = MemoryProvenanceScanStorage::new();
    storage
        .write(&repository(), &scan_result(&repository()))
        .await
        .unwrap();

    // Same URL, different resolved revision: must not share cache entries.
    let other = KnownProvenance::Repository(RepositoryProvenance {
        vcs_type: VcsType::Git,
        url: "https://example.org/repo.git".to_owned(),
        revision: "v2.4.0".to_owned(),
        path: String::new(),
        resolved_revision: "00000000".to_owned(),
    });

    let criteria = ScannerCriteria::for_details(&details()).unwrap();
    assert!(storage.read(&other, &criteria).await.unwrap().is_empty());
    assert_eq!(storage.read(&repository(), &criteria).await.unwrap().len(), 1);
}

#[tokio::test]
async fn provenance_key_ignores_requested_revision() {
    let storage = MemoryProvenanceScanStorage::new();
    storage
        .write(&repository(), &scan_result(&repository()))
        .await
        .unwrap();

    // A branch request resolving to the same revision hits the same entry.
    let via_branch = KnownProvenance::Repository(RepositoryProvenance {
        vcs_type: VcsType::Git,
        url: "https://example.org/repo.git".to_owned(),
        revision: "release-branch".to_owned(),
        path: String::new(),
        resolved_revision: "4f5a6b7c".to_owned(),
    });

    let criteria = ScannerCriteria::for_details(&details()).unwrap();
    assert_eq!(storage.read(&via_branch, &criteria).await.unwrap().len(), 1);
}

#[tokio::test]
async fn multiple_scanners_accumulate_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileProvenanceScanStorage::new(dir.path());

    storage
        .write(&repository(), &scan_result(&repository()))
        .await
        .unwrap();

    let now = SystemTime::now();
    let licensee = ScanResult::new(
        repository().into(),
        ScannerDetails::new("licensee", "9.15.0", ""),
        ScanSummary::empty(now, now),
    );
    storage.write(&repository(), &licensee).await.unwrap();

    let scancode_criteria = ScannerCriteria::for_details(&details()).unwrap();
    assert_eq!(
        storage
            .read(&repository(), &scancode_criteria)
            .await
            .unwrap()
            .len(),
        1
    );

    let licensee_criteria = ScannerCriteria::for_details(&licensee.scanner).unwrap();
    assert_eq!(
        storage
            .read(&repository(), &licensee_criteria)
            .await
            .unwrap()
            .len(),
        1
    );
}
