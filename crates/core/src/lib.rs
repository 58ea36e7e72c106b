#![doc = include_str!("../README.md")]

pub mod backend;
pub mod config;
pub mod criteria;
pub mod download;
pub mod error;
pub mod package;
pub mod provenance;
pub mod scan;
pub mod storage;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, DownloadError, ProvostError, ResolutionError, ScannerError, StorageError,
};

// 설정
pub use config::{ScanConfig, ScanConfigBuilder, StorageConfig};

// 출처 모델
pub use provenance::{
    ArtifactProvenance, KnownProvenance, NestedProvenance, Provenance, RepositoryProvenance,
    VcsType,
};

// 패키지 모델
pub use package::{Package, SourceArtifact, SourceCodeOrigin, VcsInfo};

// 스캔 결과
pub use scan::{
    CopyrightFinding, Issue, LicenseFinding, NestedProvenanceScanResult, PackageScanResult,
    ScanResult, ScanRun, ScanSummary, ScannerDetails, Severity, TextLocation,
};

// 캐시 조회 기준
pub use criteria::{ConfigurationMatch, ScannerCriteria};

// 백엔드 trait
pub use backend::{
    BoxFuture, DynPackageScanBackend, DynPathScanBackend, DynProvenanceScanBackend,
    PackageScanBackend, PathScanBackend, ProvenanceScanBackend, ScannerBackend,
};

// 스토리지 trait
pub use storage::{
    DynPackageScanReader, DynPackageScanWriter, DynProvenanceScanReader, DynProvenanceScanWriter,
    PackageScanReader, PackageScanWriter, ProvenanceScanReader, ProvenanceScanWriter,
    ScanStorageReader, ScanStorageWriter,
};

// 다운로더 trait
pub use download::{DynProvenanceDownloader, ProvenanceDownloader};
