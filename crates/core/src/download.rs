//! 다운로더 trait — 출처를 로컬 디렉토리로 구체화
//!
//! 로컬 스캐너 백엔드는 파일 시스템의 소스 트리를 요구합니다.
//! [`ProvenanceDownloader`]는 확인된 출처가 가리키는 소스 트리를
//! 주어진 디렉토리에 정확히 구체화합니다. 다운로드 실패는 실행을
//! 중단하지 않고 에러 스캔 결과로 변환됩니다.

use std::path::Path;

use crate::backend::BoxFuture;
use crate::error::DownloadError;
use crate::provenance::KnownProvenance;

/// 출처 다운로더
///
/// - 아티팩트: 아카이브를 받아 `dir`에 추출합니다.
/// - 저장소: 클론 후 확정 리비전을 체크아웃하고, 저장소 내 경로가
///   지정된 경우 해당 서브 트리를 `dir`에 배치합니다.
pub trait ProvenanceDownloader: Send + Sync {
    /// 출처가 가리키는 소스 트리를 `dir`에 구체화합니다.
    fn download(
        &self,
        provenance: &KnownProvenance,
        dir: &Path,
    ) -> impl std::future::Future<Output = Result<(), DownloadError>> + Send;
}

/// dyn-compatible 다운로더 trait
pub trait DynProvenanceDownloader: Send + Sync {
    /// 출처가 가리키는 소스 트리를 `dir`에 구체화합니다.
    fn download<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), DownloadError>>;
}

impl<T: ProvenanceDownloader> DynProvenanceDownloader for T {
    fn download<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), DownloadError>> {
        Box::pin(ProvenanceDownloader::download(self, provenance, dir))
    }
}
