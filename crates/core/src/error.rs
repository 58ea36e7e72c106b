//! 에러 타입 — 스캔 파이프라인의 실패 축별 정의
//!
//! 스캔 파이프라인의 실패 축별로 에러를 분리합니다. 오케스트레이터는
//! 항목 단위 실패([`DownloadError`], [`ScannerError`], 읽기/쓰기
//! [`StorageError`])를 실행 중단 없이 결과에 첨부된 이슈로 변환하고,
//! [`ConfigError`]만 실행 시작 전에 동기적으로 반환합니다.

/// provost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ProvostError {
    /// 패키지 출처 해석 에러
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// 소스 다운로드 에러
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// 스캐너 백엔드 에러
    #[error("scanner error: {0}")]
    Scanner(#[from] ScannerError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 패키지 출처 해석 에러
///
/// 검증이 활성화된 해석기에서만 발생합니다. 해석 실패 시 패키지는
/// `Unknown` 출처로 유지되며 실행은 계속됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// 아티팩트 URL 검증 실패
    #[error("artifact probe failed for '{url}': {reason}")]
    ArtifactProbe {
        /// 아티팩트 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// VCS 리비전을 불변 리비전으로 확정할 수 없음
    #[error("cannot resolve revision '{revision}' of '{url}': {reason}")]
    VcsRevision {
        /// 저장소 URL
        url: String,
        /// 요청 리비전
        revision: String,
        /// 실패 사유
        reason: String,
    },

    /// 중첩 출처 트리의 서브 저장소 경로가 정규형이 아님
    #[error("invalid sub-repository path '{path}': {reason}")]
    InvalidSubRepositoryPath {
        /// 문제의 경로
        path: String,
        /// 거부 사유
        reason: String,
    },

    /// 서브 저장소 열거 실패
    #[error("cannot enumerate sub-repositories of '{provenance}': {reason}")]
    SubRepositories {
        /// 대상 출처의 표준 문자열
        provenance: String,
        /// 실패 사유
        reason: String,
    },
}

/// 소스 다운로드 에러
///
/// 오케스트레이터는 이 에러를 실행 중단이 아닌 에러 스캔 결과로
/// 변환합니다.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// 아티팩트 다운로드/추출 실패
    #[error("failed to download artifact '{url}': {reason}")]
    Artifact {
        /// 아티팩트 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 클론/체크아웃 실패
    #[error("failed to check out revision '{revision}' of '{url}': {reason}")]
    Repository {
        /// 저장소 URL
        url: String,
        /// 확정 리비전
        revision: String,
        /// 실패 사유
        reason: String,
    },

    /// 다운로드 제한 시간 초과
    #[error("download of '{provenance}' timed out after {secs}s")]
    Timeout {
        /// 대상 출처의 표준 문자열
        provenance: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 작업 디렉토리 준비 실패
    #[error("cannot prepare scratch directory: {0}")]
    ScratchDir(String),
}

/// 스캐너 백엔드 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 백엔드 호출 실패
    #[error("scanner '{scanner}' failed: {reason}")]
    Invocation {
        /// 스캐너 이름
        scanner: String,
        /// 실패 사유
        reason: String,
    },

    /// 백엔드 호출 제한 시간 초과
    #[error("scanner '{scanner}' timed out after {secs}s")]
    Timeout {
        /// 스캐너 이름
        scanner: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 실행 취소됨
    #[error("scan run was cancelled")]
    Cancelled,
}

/// 스토리지 에러
///
/// 읽기 실패는 "결과 없음"으로, 쓰기 실패는 경고 로그로 강등되며
/// 실행은 계속됩니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 결과 조회 실패
    #[error("failed to read scan results for '{key}': {reason}")]
    Read {
        /// 스토리지 키
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// 결과 저장 실패
    #[error("failed to write scan result for '{key}': {reason}")]
    Write {
        /// 스토리지 키
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// 직렬화/역직렬화 실패
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// 설정 관련 에러
///
/// 오케스트레이터 구성 시점에 동기적으로 반환됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound {
        /// 설정 파일 경로
        path: String,
    },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed {
        /// 파싱 실패 사유
        reason: String,
    },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// 설정 필드명
        field: String,
        /// 거부 사유
        reason: String,
    },

    /// 스캐너 백엔드가 하나도 구성되지 않음
    #[error("no scanner backends configured")]
    NoScanners,

    /// 로컬 스캐너가 있으나 다운로더가 구성되지 않음
    #[error("local scanner '{scanner}' configured without a provenance downloader")]
    MissingDownloader {
        /// 로컬 스캐너 이름
        scanner: String,
    },

    /// 캐시 조회 기준이 모순됨
    #[error("contradictory scanner criteria for '{scanner}': {reason}")]
    CriteriaConflict {
        /// 스캐너 이름
        scanner: String,
        /// 모순 내용
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_display() {
        let err = ResolutionError::VcsRevision {
            url: "https://example.org/repo.git".to_owned(),
            revision: "main".to_owned(),
            reason: "remote unreachable".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("main"));
        assert!(msg.contains("remote unreachable"));
    }

    #[test]
    fn download_error_display() {
        let err = DownloadError::Artifact {
            url: "https://example.org/pkg.tar.gz".to_owned(),
            reason: "404".to_owned(),
        };
        assert!(err.to_string().contains("pkg.tar.gz"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn scanner_timeout_display() {
        let err = ScannerError::Timeout {
            scanner: "scancode".to_owned(),
            secs: 300,
        };
        assert!(err.to_string().contains("scancode"));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Read {
            key: "artifact:https://example.org/a.zip|".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn config_error_no_scanners_display() {
        assert_eq!(
            ConfigError::NoScanners.to_string(),
            "no scanner backends configured"
        );
    }

    #[test]
    fn errors_convert_to_provost_error() {
        let err: ProvostError = ScannerError::Cancelled.into();
        assert!(matches!(err, ProvostError::Scanner(_)));

        let err: ProvostError = ConfigError::NoScanners.into();
        assert!(matches!(err, ProvostError::Config(_)));

        let err: ProvostError = StorageError::Serialization("bad json".to_owned()).into();
        assert!(err.to_string().contains("bad json"));
    }
}
