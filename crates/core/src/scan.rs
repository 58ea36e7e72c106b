//! 스캔 결과 타입 — 발견 항목, 요약, 결과 트리
//!
//! 스캐너 백엔드가 생산하고 스토리지가 보존하는 데이터 구조를
//! 정의합니다. 발견 항목 집합은 `BTreeSet`으로 (경로, 시작 줄,
//! 끝 줄, 값) 순서가 보장됩니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::provenance::{KnownProvenance, NestedProvenance, Provenance};

/// 이슈 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Hint < Warning < Error`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 참고용 정보
    #[default]
    Hint,
    /// 경고 — 결과는 유효하나 주의 필요
    Warning,
    /// 에러 — 결과 일부가 생산되지 못함
    Error,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hint" => Some(Self::Hint),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hint => write!(f, "Hint"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// 스캔 중 발생한 이슈
///
/// 항목 단위 실패(다운로드 실패, 백엔드 실패 등)는 실행을 중단하는
/// 대신 이슈로 결과에 첨부됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// 발생 시각
    pub timestamp: SystemTime,
    /// 이슈를 생산한 컴포넌트 (스캐너 이름, "Downloader" 등)
    pub source: String,
    /// 메시지
    pub message: String,
    /// 심각도
    pub severity: Severity,
}

impl Issue {
    /// 현재 시각으로 이슈를 생성합니다.
    pub fn new(source: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source: source.into(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source, self.message)
    }
}

/// 텍스트 위치
///
/// 경로는 해당 출처의 루트 기준 상대 경로입니다. `Ord`는
/// (경로, 시작 줄, 끝 줄) 순입니다.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TextLocation {
    /// 출처 루트 기준 상대 경로
    pub path: String,
    /// 시작 줄 (1부터)
    pub start_line: u32,
    /// 끝 줄 (포함)
    pub end_line: u32,
}

impl TextLocation {
    /// 새 위치를 생성합니다.
    pub fn new(path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
        }
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.path, self.start_line, self.end_line)
    }
}

/// 라이선스 발견 항목
///
/// `Ord`는 (위치, 라이선스 표현식) 순이므로 집합 순회가
/// (경로, 시작 줄, 끝 줄, 값) 정렬을 따릅니다.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LicenseFinding {
    /// 발견 위치
    pub location: TextLocation,
    /// SPDX 라이선스 표현식
    pub license: String,
}

impl LicenseFinding {
    /// 새 발견 항목을 생성합니다.
    pub fn new(license: impl Into<String>, location: TextLocation) -> Self {
        Self {
            location,
            license: license.into(),
        }
    }
}

/// 저작권 발견 항목
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CopyrightFinding {
    /// 발견 위치
    pub location: TextLocation,
    /// 저작권 문구
    pub statement: String,
}

impl CopyrightFinding {
    /// 새 발견 항목을 생성합니다.
    pub fn new(statement: impl Into<String>, location: TextLocation) -> Self {
        Self {
            location,
            statement: statement.into(),
        }
    }
}

/// 스캐너 식별 정보
///
/// 캐시 적합성 판정([`ScannerCriteria`](crate::criteria::ScannerCriteria))의
/// 대상입니다.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ScannerDetails {
    /// 스캐너 이름
    pub name: String,
    /// 스캐너 버전 (semver)
    pub version: String,
    /// 설정 지문 (커맨드라인 옵션 등)
    pub configuration: String,
}

impl ScannerDetails {
    /// 새 식별 정보를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        configuration: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            configuration: configuration.into(),
        }
    }
}

impl fmt::Display for ScannerDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// 단일 스캔의 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// 스캔 시작 시각
    pub start_time: SystemTime,
    /// 스캔 종료 시각
    pub end_time: SystemTime,
    /// 스캔 대상 파일 집합의 검증 코드 (분할 결과에서는 근사값)
    pub verification_code: String,
    /// 라이선스 발견 항목
    pub licenses: BTreeSet<LicenseFinding>,
    /// 저작권 발견 항목
    pub copyrights: BTreeSet<CopyrightFinding>,
    /// 스캔 중 발생한 이슈
    pub issues: Vec<Issue>,
}

impl ScanSummary {
    /// 발견 항목 없는 빈 요약을 생성합니다.
    pub fn empty(start_time: SystemTime, end_time: SystemTime) -> Self {
        Self {
            start_time,
            end_time,
            verification_code: String::new(),
            licenses: BTreeSet::new(),
            copyrights: BTreeSet::new(),
            issues: Vec::new(),
        }
    }

    /// 이슈만 담은 빈 요약을 생성합니다.
    ///
    /// 다운로드 실패나 백엔드 실패를 나타내는 합성 결과에 사용됩니다.
    pub fn with_issue(start_time: SystemTime, end_time: SystemTime, issue: Issue) -> Self {
        let mut summary = Self::empty(start_time, end_time);
        summary.issues.push(issue);
        summary
    }

    /// ERROR 심각도 이슈가 있는지 확인합니다.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// 단일 (출처 × 스캐너) 스캔의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// 스캔된 소스의 출처
    pub provenance: Provenance,
    /// 결과를 생산한 스캐너
    pub scanner: ScannerDetails,
    /// 스캔 요약
    pub summary: ScanSummary,
}

impl ScanResult {
    /// 새 결과를 생성합니다.
    pub fn new(provenance: Provenance, scanner: ScannerDetails, summary: ScanSummary) -> Self {
        Self {
            provenance,
            scanner,
            summary,
        }
    }
}

/// 중첩 출처 트리 전체에 대한 스캔 결과
///
/// 트리의 각 출처를 (여러 스캐너가 생산했을 수 있는) 결과 목록에
/// 매핑합니다. JSON 객체 키는 문자열이어야 하므로 출처 키 매핑은
/// 항목 리스트로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedProvenanceScanResult {
    /// 결과가 속한 중첩 출처 트리
    pub nested_provenance: NestedProvenance,
    /// 트리의 각 출처에 대한 결과 목록
    #[serde(with = "provenance_keyed")]
    pub scan_results: BTreeMap<KnownProvenance, Vec<ScanResult>>,
}

impl NestedProvenanceScanResult {
    /// 새 결과 트리를 생성합니다.
    pub fn new(
        nested_provenance: NestedProvenance,
        scan_results: BTreeMap<KnownProvenance, Vec<ScanResult>>,
    ) -> Self {
        Self {
            nested_provenance,
            scan_results,
        }
    }

    /// 트리의 모든 출처가 비어 있지 않은 결과 목록을 갖는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.nested_provenance
            .all_provenances()
            .iter()
            .all(|p| self.scan_results.get(p).is_some_and(|r| !r.is_empty()))
    }

    /// 주어진 출처의 결과 목록을 반환합니다.
    pub fn results_for(&self, provenance: &KnownProvenance) -> &[ScanResult] {
        self.scan_results
            .get(provenance)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// 출처 키 매핑의 직렬화 어댑터
///
/// `BTreeMap<KnownProvenance, Vec<ScanResult>>`를
/// `[{ provenance, results }]` 항목 리스트로 변환합니다.
mod provenance_keyed {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{BTreeMap, KnownProvenance, ScanResult};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        provenance: KnownProvenance,
        results: Vec<ScanResult>,
    }

    pub fn serialize<S>(
        map: &BTreeMap<KnownProvenance, Vec<ScanResult>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for (provenance, results) in map {
            seq.serialize_element(&Entry {
                provenance: provenance.clone(),
                results: results.clone(),
            })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<KnownProvenance, Vec<ScanResult>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| (e.provenance, e.results))
            .collect())
    }
}

/// 단일 패키지에 대한 실행 결과
///
/// 출처가 확인되지 않은 패키지는 `nested`가 `None`이며 해석 이슈만
/// 담습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageScanResult {
    /// 해석된 출처
    pub provenance: Provenance,
    /// 중첩 결과 트리 (출처가 확인된 경우)
    pub nested: Option<NestedProvenanceScanResult>,
    /// 패키지 수준 이슈 (해석 실패 등)
    pub issues: Vec<Issue>,
}

/// 스캔 실행 전체의 결과
///
/// 입력 패키지 식별자를 각 패키지의 결과에 매핑합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRun {
    /// 실행 식별자
    pub id: String,
    /// 실행 시작 시각
    pub start_time: SystemTime,
    /// 실행 종료 시각
    pub end_time: SystemTime,
    /// 패키지 식별자 → 패키지 결과
    pub results: BTreeMap<String, PackageScanResult>,
}
