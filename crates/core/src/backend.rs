//! 스캐너 백엔드 trait — 세 가지 호출 형태에 대한 단일 계약
//!
//! 스캐너 백엔드는 정확히 하나의 호출 형태를 가집니다:
//!
//! 1. **패키지 단위 원격** ([`PackageScanBackend`]) — 백엔드가 직접
//!    소스를 해석하고, 출처가 채워진 결과를 반환합니다.
//! 2. **출처 단위 원격** ([`ProvenanceScanBackend`]) — 백엔드가 주어진
//!    출처에서 소스를 가져와 스캔합니다.
//! 3. **로컬** ([`PathScanBackend`]) — 이미 내려받은 디렉토리를
//!    스캔합니다. 다운로드와 출처 기입은 호출자 책임입니다.
//!
//! 세 형태는 [`ScannerBackend`]로 합쳐지며 오케스트레이터의 디스패치는
//! 완전 매칭(exhaustive match)입니다.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::criteria::ScannerCriteria;
use crate::error::{ConfigError, ScannerError};
use crate::package::Package;
use crate::provenance::KnownProvenance;
use crate::scan::{ScanResult, ScannerDetails};

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 패키지 단위 원격 스캐너 백엔드
///
/// 자체 소스 확보 파이프라인을 가진 백엔드에 사용됩니다.
/// 반환되는 결과의 `provenance` 필드는 백엔드가 직접 채웁니다.
pub trait PackageScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    ///
    /// 기본 구현은 식별 정보에서 유도합니다 (정확한 버전·설정 일치).
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        ScannerCriteria::for_details(self.details())
    }

    /// 패키지를 스캔합니다.
    fn scan_package(
        &self,
        package: &Package,
    ) -> impl Future<Output = Result<ScanResult, ScannerError>> + Send;
}

/// 출처 단위 원격 스캐너 백엔드
pub trait ProvenanceScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        ScannerCriteria::for_details(self.details())
    }

    /// 주어진 출처의 소스를 스캔합니다.
    fn scan_provenance(
        &self,
        provenance: &KnownProvenance,
    ) -> impl Future<Output = Result<ScanResult, ScannerError>> + Send;
}

/// 로컬 스캐너 백엔드
///
/// 백엔드는 출처를 알지 못하므로 결과의 `provenance` 필드는
/// 오케스트레이터가 덮어씁니다.
pub trait PathScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        ScannerCriteria::for_details(self.details())
    }

    /// 내려받은 디렉토리를 스캔합니다.
    fn scan_path(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<ScanResult, ScannerError>> + Send;
}

/// dyn-compatible 패키지 단위 백엔드 trait
///
/// RPITIT trait은 `dyn`이 불가하므로, `BoxFuture`를 반환하는 이
/// trait을 통해 `Box<dyn DynPackageScanBackend>`로 동적 관리합니다.
pub trait DynPackageScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError>;

    /// 패키지를 스캔합니다.
    fn scan_package<'a>(
        &'a self,
        package: &'a Package,
    ) -> BoxFuture<'a, Result<ScanResult, ScannerError>>;
}

impl<T: PackageScanBackend> DynPackageScanBackend for T {
    fn details(&self) -> &ScannerDetails {
        PackageScanBackend::details(self)
    }

    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        PackageScanBackend::criteria(self)
    }

    fn scan_package<'a>(
        &'a self,
        package: &'a Package,
    ) -> BoxFuture<'a, Result<ScanResult, ScannerError>> {
        Box::pin(PackageScanBackend::scan_package(self, package))
    }
}

/// dyn-compatible 출처 단위 백엔드 trait
pub trait DynProvenanceScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError>;

    /// 주어진 출처의 소스를 스캔합니다.
    fn scan_provenance<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
    ) -> BoxFuture<'a, Result<ScanResult, ScannerError>>;
}

impl<T: ProvenanceScanBackend> DynProvenanceScanBackend for T {
    fn details(&self) -> &ScannerDetails {
        ProvenanceScanBackend::details(self)
    }

    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        ProvenanceScanBackend::criteria(self)
    }

    fn scan_provenance<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
    ) -> BoxFuture<'a, Result<ScanResult, ScannerError>> {
        Box::pin(ProvenanceScanBackend::scan_provenance(self, provenance))
    }
}

/// dyn-compatible 로컬 백엔드 trait
pub trait DynPathScanBackend: Send + Sync {
    /// 스캐너 식별 정보를 반환합니다.
    fn details(&self) -> &ScannerDetails;

    /// 캐시 조회 기준을 반환합니다.
    fn criteria(&self) -> Result<ScannerCriteria, ConfigError>;

    /// 내려받은 디렉토리를 스캔합니다.
    fn scan_path<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ScanResult, ScannerError>>;
}

impl<T: PathScanBackend> DynPathScanBackend for T {
    fn details(&self) -> &ScannerDetails {
        PathScanBackend::details(self)
    }

    fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        PathScanBackend::criteria(self)
    }

    fn scan_path<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ScanResult, ScannerError>> {
        Box::pin(PathScanBackend::scan_path(self, path))
    }
}

/// 호출 형태가 태그된 스캐너 백엔드
///
/// 오케스트레이터는 이 enum에 대해 완전 매칭으로 디스패치합니다.
pub enum ScannerBackend {
    /// 패키지 단위 원격 백엔드
    Package(Box<dyn DynPackageScanBackend>),
    /// 출처 단위 원격 백엔드
    Provenance(Box<dyn DynProvenanceScanBackend>),
    /// 로컬 백엔드
    Local(Box<dyn DynPathScanBackend>),
}

impl ScannerBackend {
    /// 패키지 단위 백엔드를 감쌉니다.
    pub fn package<B: PackageScanBackend + 'static>(backend: B) -> Self {
        Self::Package(Box::new(backend))
    }

    /// 출처 단위 백엔드를 감쌉니다.
    pub fn provenance<B: ProvenanceScanBackend + 'static>(backend: B) -> Self {
        Self::Provenance(Box::new(backend))
    }

    /// 로컬 백엔드를 감쌉니다.
    pub fn local<B: PathScanBackend + 'static>(backend: B) -> Self {
        Self::Local(Box::new(backend))
    }

    /// 스캐너 식별 정보를 반환합니다.
    pub fn details(&self) -> &ScannerDetails {
        match self {
            Self::Package(backend) => backend.details(),
            Self::Provenance(backend) => backend.details(),
            Self::Local(backend) => backend.details(),
        }
    }

    /// 스캐너 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.details().name
    }

    /// 캐시 조회 기준을 반환합니다.
    pub fn criteria(&self) -> Result<ScannerCriteria, ConfigError> {
        match self {
            Self::Package(backend) => backend.criteria(),
            Self::Provenance(backend) => backend.criteria(),
            Self::Local(backend) => backend.criteria(),
        }
    }

    /// 로컬 백엔드인지 여부 (다운로드 필요)
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// 호출 형태 이름 (로그용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Provenance(_) => "provenance",
            Self::Local(_) => "local",
        }
    }
}

impl std::fmt::Debug for ScannerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerBackend")
            .field("kind", &self.kind())
            .field("details", self.details())
            .finish()
    }
}
