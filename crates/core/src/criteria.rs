//! 캐시 조회 기준 — 저장된 결과의 적합성 판정
//!
//! [`ScannerCriteria`]는 스캐너 식별 정보에 대한 술어입니다. 저장된
//! 결과의 [`ScannerDetails`]가 (이름 패턴, 버전 범위, 설정 호환성)을
//! 모두 만족할 때만 캐시 적중으로 인정됩니다.
//!
//! SemVer가 아닌 버전 문자열은 보수적으로 매칭하지 않습니다
//! (잘못된 캐시 재사용 방지).

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use semver::Version;

use crate::error::ConfigError;
use crate::scan::ScannerDetails;

/// 설정 옵션 키: 최소 허용 버전 재정의
pub const OPTION_MIN_VERSION: &str = "criteria.minScannerVersion";
/// 설정 옵션 키: 최대 허용 버전 재정의
pub const OPTION_MAX_VERSION: &str = "criteria.maxScannerVersion";
/// 설정 옵션 키: 이름 패턴 재정의
pub const OPTION_NAME_PATTERN: &str = "criteria.regScannerName";
/// 설정 옵션 키: 설정 호환성을 주어진 값과의 정확 일치로 완화
pub const OPTION_CONFIGURATION: &str = "criteria.configuration";

/// 설정 지문 호환성 술어
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationMatch {
    /// 모든 설정 지문 허용
    Any,
    /// 주어진 문자열과 정확히 일치해야 함
    Exact(String),
}

impl ConfigurationMatch {
    /// 주어진 설정 지문이 허용되는지 확인합니다.
    pub fn matches(&self, configuration: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == configuration,
        }
    }
}

/// 캐시 조회 기준
///
/// 기본 기준은 실행 중인 스캐너의 정확한 (이름, 버전, 설정)만
/// 허용합니다. 설정 옵션으로 각 축을 재정의할 수 있습니다.
#[derive(Debug, Clone)]
pub struct ScannerCriteria {
    /// 스캐너 이름 패턴 (전체 일치)
    pub name_pattern: Regex,
    /// 최소 허용 버전 (포함)
    pub min_version: Version,
    /// 최대 허용 버전 (포함)
    pub max_version: Version,
    /// 설정 호환성 술어
    pub configuration: ConfigurationMatch,
}

impl ScannerCriteria {
    /// 스캐너 식별 정보에서 기본 기준을 유도합니다.
    ///
    /// # Errors
    ///
    /// 스캐너 버전이 SemVer가 아니면 `ConfigError::CriteriaConflict`를
    /// 반환합니다.
    pub fn for_details(details: &ScannerDetails) -> Result<Self, ConfigError> {
        let version = parse_version(&details.version).map_err(|reason| {
            ConfigError::CriteriaConflict {
                scanner: details.name.clone(),
                reason,
            }
        })?;
        let name_pattern = anchored_pattern(&regex::escape(&details.name), &details.name)?;

        Ok(Self {
            name_pattern,
            min_version: version.clone(),
            max_version: version,
            configuration: ConfigurationMatch::Exact(details.configuration.clone()),
        })
    }

    /// 스캐너 옵션 매핑의 `criteria.*` 키를 적용합니다.
    ///
    /// 인식되는 키: `criteria.minScannerVersion`,
    /// `criteria.maxScannerVersion`, `criteria.regScannerName`,
    /// `criteria.configuration`. 그 외 키는 무시합니다.
    pub fn with_overrides(
        mut self,
        scanner: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        if let Some(min) = options.get(OPTION_MIN_VERSION) {
            self.min_version = parse_version(min).map_err(|reason| {
                ConfigError::CriteriaConflict {
                    scanner: scanner.to_owned(),
                    reason,
                }
            })?;
        }
        if let Some(max) = options.get(OPTION_MAX_VERSION) {
            self.max_version = parse_version(max).map_err(|reason| {
                ConfigError::CriteriaConflict {
                    scanner: scanner.to_owned(),
                    reason,
                }
            })?;
        }
        if let Some(pattern) = options.get(OPTION_NAME_PATTERN) {
            self.name_pattern = anchored_pattern(pattern, scanner)?;
        }
        if let Some(configuration) = options.get(OPTION_CONFIGURATION) {
            self.configuration = ConfigurationMatch::Exact(configuration.clone());
        }

        self.validate(scanner)?;
        Ok(self)
    }

    /// 기준이 자기모순이 아닌지 검증합니다.
    pub fn validate(&self, scanner: &str) -> Result<(), ConfigError> {
        if self.min_version > self.max_version {
            return Err(ConfigError::CriteriaConflict {
                scanner: scanner.to_owned(),
                reason: format!(
                    "min version {} is greater than max version {}",
                    self.min_version, self.max_version,
                ),
            });
        }
        Ok(())
    }

    /// 저장된 결과의 식별 정보가 기준을 만족하는지 판정합니다.
    pub fn matches(&self, details: &ScannerDetails) -> bool {
        if !self.name_pattern.is_match(&details.name) {
            return false;
        }

        let version = match parse_version(&details.version) {
            Ok(version) => version,
            Err(_) => {
                tracing::warn!(
                    scanner = %details.name,
                    version = %details.version,
                    "non-SemVer scanner version in stored result, conservatively not matching"
                );
                return false;
            }
        };
        if version < self.min_version || version > self.max_version {
            return false;
        }

        self.configuration.matches(&details.configuration)
    }
}

impl fmt::Display for ScannerCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}]",
            self.name_pattern.as_str(),
            self.min_version,
            self.max_version,
        )
    }
}

/// 버전 문자열을 파싱합니다. 흔한 `v` 접두사를 허용합니다.
fn parse_version(s: &str) -> Result<Version, String> {
    let normalized = s.strip_prefix(['v', 'V']).unwrap_or(s);
    Version::parse(normalized).map_err(|e| format!("'{s}' is not a valid SemVer version: {e}"))
}

/// 패턴을 전체 일치 정규식으로 컴파일합니다.
fn anchored_pattern(pattern: &str, scanner: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConfigError::CriteriaConflict {
        scanner: scanner.to_owned(),
        reason: format!("invalid scanner name pattern '{pattern}': {e}"),
    })
}
