//! 스토리지 trait — 스캔 결과의 조회와 보존
//!
//! 캐시 단위에 따라 두 종류의 리더/라이터가 있습니다:
//!
//! - **출처 키** ([`ProvenanceScanReader`]/[`ProvenanceScanWriter`]) —
//!   개별 출처에 대한 결과 목록을 다룹니다.
//! - **패키지 키** ([`PackageScanReader`]/[`PackageScanWriter`]) —
//!   패키지 단위 스캔이 생산한 중첩 결과 트리를 다룹니다.
//!
//! 리더는 등록 순서대로 조회되며, 비어 있지 않은 결과가 처음 나온
//! 시점에 조회가 멈춥니다. 라이터는 새로 생산된 모든 결과를 받으며
//! (키, 스캐너 식별 정보)별로 멱등해야 합니다.
//!
//! 동일 인스턴스가 리더와 라이터를 겸하는 경우가 흔하므로
//! ([`ScanStorageReader`]/[`ScanStorageWriter`]) enum은 `Arc`를 담습니다.

use std::sync::Arc;

use crate::backend::BoxFuture;
use crate::criteria::ScannerCriteria;
use crate::error::StorageError;
use crate::package::Package;
use crate::provenance::KnownProvenance;
use crate::scan::{NestedProvenanceScanResult, ScanResult};

/// 출처 키 스토리지 리더
pub trait ProvenanceScanReader: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 주어진 출처에 대해 기준을 만족하는 저장된 결과를 반환합니다.
    fn read(
        &self,
        provenance: &KnownProvenance,
        criteria: &ScannerCriteria,
    ) -> impl std::future::Future<Output = Result<Vec<ScanResult>, StorageError>> + Send;
}

/// 출처 키 스토리지 라이터
///
/// 쓰기는 (출처, 스캐너 식별 정보)별로 멱등해야 합니다.
pub trait ProvenanceScanWriter: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 결과를 저장합니다.
    fn write(
        &self,
        provenance: &KnownProvenance,
        result: &ScanResult,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// 패키지 키 스토리지 리더
pub trait PackageScanReader: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 주어진 패키지에 대해 기준을 만족하는 중첩 결과 트리를 반환합니다.
    ///
    /// 반환된 트리의 출처 라벨이 병합의 기준이 됩니다.
    fn read(
        &self,
        package: &Package,
        criteria: &ScannerCriteria,
    ) -> impl std::future::Future<Output = Result<Vec<NestedProvenanceScanResult>, StorageError>> + Send;
}

/// 패키지 키 스토리지 라이터
pub trait PackageScanWriter: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 중첩 결과 트리를 저장합니다.
    fn write(
        &self,
        package: &Package,
        result: &NestedProvenanceScanResult,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// dyn-compatible 출처 키 리더
pub trait DynProvenanceScanReader: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 주어진 출처에 대해 기준을 만족하는 저장된 결과를 반환합니다.
    fn read<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        criteria: &'a ScannerCriteria,
    ) -> BoxFuture<'a, Result<Vec<ScanResult>, StorageError>>;
}

impl<T: ProvenanceScanReader> DynProvenanceScanReader for T {
    fn name(&self) -> &str {
        ProvenanceScanReader::name(self)
    }

    fn read<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        criteria: &'a ScannerCriteria,
    ) -> BoxFuture<'a, Result<Vec<ScanResult>, StorageError>> {
        Box::pin(ProvenanceScanReader::read(self, provenance, criteria))
    }
}

/// dyn-compatible 출처 키 라이터
pub trait DynProvenanceScanWriter: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 결과를 저장합니다.
    fn write<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        result: &'a ScanResult,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}

impl<T: ProvenanceScanWriter> DynProvenanceScanWriter for T {
    fn name(&self) -> &str {
        ProvenanceScanWriter::name(self)
    }

    fn write<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        result: &'a ScanResult,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(ProvenanceScanWriter::write(self, provenance, result))
    }
}

/// dyn-compatible 패키지 키 리더
pub trait DynPackageScanReader: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 주어진 패키지에 대해 기준을 만족하는 중첩 결과 트리를 반환합니다.
    fn read<'a>(
        &'a self,
        package: &'a Package,
        criteria: &'a ScannerCriteria,
    ) -> BoxFuture<'a, Result<Vec<NestedProvenanceScanResult>, StorageError>>;
}

impl<T: PackageScanReader> DynPackageScanReader for T {
    fn name(&self) -> &str {
        PackageScanReader::name(self)
    }

    fn read<'a>(
        &'a self,
        package: &'a Package,
        criteria: &'a ScannerCriteria,
    ) -> BoxFuture<'a, Result<Vec<NestedProvenanceScanResult>, StorageError>> {
        Box::pin(PackageScanReader::read(self, package, criteria))
    }
}

/// dyn-compatible 패키지 키 라이터
pub trait DynPackageScanWriter: Send + Sync {
    /// 스토리지 이름 (로그용)
    fn name(&self) -> &str;

    /// 중첩 결과 트리를 저장합니다.
    fn write<'a>(
        &'a self,
        package: &'a Package,
        result: &'a NestedProvenanceScanResult,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}

impl<T: PackageScanWriter> DynPackageScanWriter for T {
    fn name(&self) -> &str {
        PackageScanWriter::name(self)
    }

    fn write<'a>(
        &'a self,
        package: &'a Package,
        result: &'a NestedProvenanceScanResult,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(PackageScanWriter::write(self, package, result))
    }
}

/// 캐시 단위가 태그된 스토리지 리더
///
/// 혼합 리더 목록에서 등록 순서를 보존하기 위한 래퍼입니다.
pub enum ScanStorageReader {
    /// 출처 키 리더
    Provenance(Arc<dyn DynProvenanceScanReader>),
    /// 패키지 키 리더
    Package(Arc<dyn DynPackageScanReader>),
}

impl ScanStorageReader {
    /// 출처 키 리더를 감쌉니다.
    pub fn provenance<R: ProvenanceScanReader + 'static>(reader: Arc<R>) -> Self {
        Self::Provenance(reader)
    }

    /// 패키지 키 리더를 감쌉니다.
    pub fn package<R: PackageScanReader + 'static>(reader: Arc<R>) -> Self {
        Self::Package(reader)
    }

    /// 스토리지 이름 (로그용)
    pub fn name(&self) -> &str {
        match self {
            Self::Provenance(reader) => reader.name(),
            Self::Package(reader) => reader.name(),
        }
    }
}

/// 캐시 단위가 태그된 스토리지 라이터
pub enum ScanStorageWriter {
    /// 출처 키 라이터
    Provenance(Arc<dyn DynProvenanceScanWriter>),
    /// 패키지 키 라이터
    Package(Arc<dyn DynPackageScanWriter>),
}

impl ScanStorageWriter {
    /// 출처 키 라이터를 감쌉니다.
    pub fn provenance<W: ProvenanceScanWriter + 'static>(writer: Arc<W>) -> Self {
        Self::Provenance(writer)
    }

    /// 패키지 키 라이터를 감쌉니다.
    pub fn package<W: PackageScanWriter + 'static>(writer: Arc<W>) -> Self {
        Self::Package(writer)
    }

    /// 스토리지 이름 (로그용)
    pub fn name(&self) -> &str {
        match self {
            Self::Provenance(writer) => writer.name(),
            Self::Package(writer) => writer.name(),
        }
    }
}
