//! 설정 — provost.toml 로드, 환경 변수 재정의, 검증
//!
//! [`ScanConfig`]는 오케스트레이터의 동작 축(출처 우선순위, 제한 시간,
//! 작업 디렉토리, 스캐너별 옵션)을 담습니다. TOML 파일에서 로드하고
//! 환경 변수(`PROVOST_*`)로 재정의할 수 있습니다.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::package::SourceCodeOrigin;

/// 제한 시간 상한 (초)
const MAX_TIMEOUT_SECS: u64 = 86_400; // 24 hours

/// 스캔 오케스트레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 출처 해석 우선순위
    #[serde(default = "SourceCodeOrigin::default_priority")]
    pub source_code_origins: Vec<SourceCodeOrigin>,
    /// 스캐너 호출 제한 시간 (초, 0이면 무제한)
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    /// 다운로드 제한 시간 (초, 0이면 무제한)
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// 다운로드 작업 디렉토리의 부모 (미지정 시 시스템 임시 디렉토리)
    #[serde(default)]
    pub download_dir: Option<String>,
    /// 스캐너 이름 → 자유 형식 옵션 매핑
    ///
    /// `criteria.*` 키는 캐시 조회 기준 재정의로 해석됩니다.
    #[serde(default)]
    pub scanner_options: BTreeMap<String, BTreeMap<String, String>>,
    /// 스토리지 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

/// 스토리지 설정
///
/// 로컬 파일 시스템 스토리지 백엔드의 권고 기본값입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 결과 저장 루트 디렉토리
    pub root_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "/var/lib/provost/scan-results".to_owned(),
        }
    }
}

fn default_scan_timeout_secs() -> u64 {
    3600 // 1 hour
}

fn default_download_timeout_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source_code_origins: SourceCodeOrigin::default_priority(),
            scan_timeout_secs: default_scan_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            download_dir: None,
            scanner_options: BTreeMap::new(),
            storage: StorageConfig::default(),
        }
    }
}

impl ScanConfig {
    /// TOML 파일에서 설정을 로드하고 환경 변수 재정의를 적용합니다.
    ///
    /// # Errors
    ///
    /// 파일이 없으면 `ConfigError::FileNotFound`, 파싱 실패 시
    /// `ConfigError::ParseFailed`, 재정의 값이 유효하지 않으면
    /// `ConfigError::InvalidValue`를 반환합니다.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|_| ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `PROVOST_*` 환경 변수 재정의를 적용합니다.
    ///
    /// 인식되는 변수: `PROVOST_SOURCE_CODE_ORIGINS` (쉼표 구분),
    /// `PROVOST_SCAN_TIMEOUT_SECS`, `PROVOST_DOWNLOAD_TIMEOUT_SECS`,
    /// `PROVOST_DOWNLOAD_DIR`, `PROVOST_STORAGE_ROOT_DIR`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(origins) = std::env::var("PROVOST_SOURCE_CODE_ORIGINS") {
            self.source_code_origins = origins
                .split(',')
                .map(str::trim)
                .map(|s| {
                    SourceCodeOrigin::from_str_loose(s).ok_or_else(|| ConfigError::InvalidValue {
                        field: "source_code_origins".to_owned(),
                        reason: format!("unknown origin '{s}'"),
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Ok(secs) = std::env::var("PROVOST_SCAN_TIMEOUT_SECS") {
            self.scan_timeout_secs = parse_secs("scan_timeout_secs", &secs)?;
        }
        if let Ok(secs) = std::env::var("PROVOST_DOWNLOAD_TIMEOUT_SECS") {
            self.download_timeout_secs = parse_secs("download_timeout_secs", &secs)?;
        }
        if let Ok(dir) = std::env::var("PROVOST_DOWNLOAD_DIR") {
            self.download_dir = Some(dir);
        }
        if let Ok(dir) = std::env::var("PROVOST_STORAGE_ROOT_DIR") {
            self.storage.root_dir = dir;
        }
        Ok(())
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `source_code_origins`: 비어 있지 않고 중복이 없어야 함
    /// - 제한 시간: 0 (무제한) 또는 1-86400
    /// - `download_dir`: `..` 세그먼트 금지
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_code_origins.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source_code_origins".to_owned(),
                reason: "at least one source code origin required".to_owned(),
            });
        }
        let mut seen = Vec::new();
        for origin in &self.source_code_origins {
            if seen.contains(origin) {
                return Err(ConfigError::InvalidValue {
                    field: "source_code_origins".to_owned(),
                    reason: format!("duplicate origin '{origin}'"),
                });
            }
            seen.push(*origin);
        }

        if self.scan_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "scan_timeout_secs".to_owned(),
                reason: format!("must be 0 (unlimited) or 1-{MAX_TIMEOUT_SECS}"),
            });
        }
        if self.download_timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "download_timeout_secs".to_owned(),
                reason: format!("must be 0 (unlimited) or 1-{MAX_TIMEOUT_SECS}"),
            });
        }

        if let Some(dir) = &self.download_dir {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "download_dir".to_owned(),
                    reason: "must not be empty when set".to_owned(),
                });
            }
            if Path::new(dir)
                .components()
                .any(|c| c == std::path::Component::ParentDir)
            {
                return Err(ConfigError::InvalidValue {
                    field: "download_dir".to_owned(),
                    reason: format!("'{dir}' contains path traversal pattern '..'"),
                });
            }
        }

        Ok(())
    }

    /// 주어진 스캐너의 옵션 매핑을 반환합니다.
    pub fn options_for(&self, scanner: &str) -> Option<&BTreeMap<String, String>> {
        self.scanner_options.get(scanner)
    }

    /// 스캐너 호출 제한 시간을 반환합니다 (0이면 `None`).
    pub fn scan_timeout(&self) -> Option<std::time::Duration> {
        (self.scan_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.scan_timeout_secs))
    }

    /// 다운로드 제한 시간을 반환합니다 (0이면 `None`).
    pub fn download_timeout(&self) -> Option<std::time::Duration> {
        (self.download_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(self.download_timeout_secs))
    }
}

fn parse_secs(field: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: format!("'{value}' is not a valid number of seconds"),
    })
}

/// [`ScanConfig`] 빌더
///
/// 유연한 설정 구성 및 빌드 시 유효성 검증을 제공합니다.
#[derive(Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 출처 해석 우선순위를 설정합니다.
    pub fn source_code_origins(mut self, origins: Vec<SourceCodeOrigin>) -> Self {
        self.config.source_code_origins = origins;
        self
    }

    /// 스캐너 호출 제한 시간(초)을 설정합니다. 0이면 무제한입니다.
    pub fn scan_timeout_secs(mut self, secs: u64) -> Self {
        self.config.scan_timeout_secs = secs;
        self
    }

    /// 다운로드 제한 시간(초)을 설정합니다. 0이면 무제한입니다.
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// 다운로드 작업 디렉토리의 부모를 설정합니다.
    pub fn download_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.download_dir = Some(dir.into());
        self
    }

    /// 스캐너 옵션 하나를 설정합니다.
    pub fn scanner_option(
        mut self,
        scanner: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.config
            .scanner_options
            .entry(scanner.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// 스토리지 루트 디렉토리를 설정합니다.
    pub fn storage_root_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.storage.root_dir = dir.into();
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ConfigError::InvalidValue` 반환
    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScanConfig::default();
        config.validate().unwrap();
        assert_eq!(
            config.source_code_origins,
            vec![SourceCodeOrigin::Vcs, SourceCodeOrigin::Artifact]
        );
    }

    #[test]
    fn validate_rejects_empty_origins() {
        let config = ScanConfig {
            source_code_origins: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_origins() {
        let config = ScanConfig {
            source_code_origins: vec![SourceCodeOrigin::Vcs, SourceCodeOrigin::Vcs],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_timeout() {
        let config = ScanConfig {
            scan_timeout_secs: MAX_TIMEOUT_SECS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_zero_timeout() {
        let config = ScanConfig {
            scan_timeout_secs: 0,
            download_timeout_secs: 0,
            ..Default::default()
        };
        config.validate().unwrap();
        assert!(config.scan_timeout().is_none());
        assert!(config.download_timeout().is_none());
    }

    #[test]
    fn validate_rejects_traversal_download_dir() {
        let config = ScanConfig {
            download_dir: Some("scratch/../../etc".to_owned()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_collects_scanner_options() {
        let config = ScanConfigBuilder::new()
            .scanner_option("scancode", "criteria.minScannerVersion", "30.0.0")
            .scanner_option("scancode", "criteria.maxScannerVersion", "33.0.0")
            .scanner_option("licensee", "criteria.configuration", "")
            .build()
            .unwrap();

        let options = config.options_for("scancode").unwrap();
        assert_eq!(options.get("criteria.minScannerVersion").unwrap(), "30.0.0");
        assert_eq!(options.get("criteria.maxScannerVersion").unwrap(), "33.0.0");
        assert!(config.options_for("licensee").is_some());
        assert!(config.options_for("unknown").is_none());
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ScanConfigBuilder::new().source_code_origins(vec![]).build();
        assert!(result.is_err());
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let config = ScanConfigBuilder::new()
            .scan_timeout_secs(120)
            .download_timeout_secs(60)
            .build()
            .unwrap();
        assert_eq!(
            config.scan_timeout(),
            Some(std::time::Duration::from_secs(120))
        );
        assert_eq!(
            config.download_timeout(),
            Some(std::time::Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn load_parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provost.toml");
        std::fs::write(
            &path,
            r#"
source_code_origins = ["Artifact", "Vcs"]
scan_timeout_secs = 600

[scanner_options.scancode]
"criteria.minScannerVersion" = "30.0.0"

[storage]
root_dir = "/tmp/provost-results"
"#,
        )
        .unwrap();

        let config = ScanConfig::load(&path).await.unwrap();
        assert_eq!(
            config.source_code_origins,
            vec![SourceCodeOrigin::Artifact, SourceCodeOrigin::Vcs]
        );
        assert_eq!(config.scan_timeout_secs, 600);
        assert_eq!(config.storage.root_dir, "/tmp/provost-results");
        assert!(config.options_for("scancode").is_some());
    }

    #[tokio::test]
    async fn load_missing_file_fails() {
        let err = ScanConfig::load(Path::new("/nonexistent/provost.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn load_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provost.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        let err = ScanConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }
}
