//! 결과 분할기 — 패키지 전체 결과를 출처별로 분배
//!
//! 패키지 단위 스캔의 발견 항목은 패키지 소스 트리 전체에 걸쳐
//! 있습니다. 분할기는 각 발견 항목을 경로 접두사 기준으로 중첩 출처
//! 트리의 정확히 한 노드에 배정합니다. 긴 접두사가 우선하므로 서브
//! 저장소 내부의 발견 항목이 루트로 새지 않습니다.
//!
//! 분할된 결과의 검증 코드는 재계산하지 않으며 비워 둡니다 (근사값).

use std::collections::BTreeMap;

use provost_core::provenance::{KnownProvenance, NestedProvenance};
use provost_core::scan::{ScanResult, ScanSummary};

/// 스캔 결과를 중첩 출처 트리의 노드별 결과로 분할합니다.
///
/// 발견 항목은 경로 경계 접두사가 일치하는 가장 긴 접두사의 출처에
/// 배정됩니다. 이슈는 모든 조각에 복제되고, 시작/종료 시각과 스캐너
/// 식별 정보는 그대로 유지됩니다.
pub fn split_nested_result(
    result: &ScanResult,
    nested: &NestedProvenance,
) -> BTreeMap<KnownProvenance, ScanResult> {
    // (접두사, 출처) 쌍을 접두사 길이 내림차순으로 정렬한다.
    // 루트("")는 항상 마지막 폴백이 된다.
    let mut prefixes: Vec<(&str, &KnownProvenance)> = nested
        .sub_repositories()
        .iter()
        .map(|(path, provenance)| (path.as_str(), provenance))
        .collect();
    prefixes.push(("", nested.root()));
    prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut slices: BTreeMap<KnownProvenance, ScanSummary> = prefixes
        .iter()
        .map(|(_, provenance)| {
            let mut summary =
                ScanSummary::empty(result.summary.start_time, result.summary.end_time);
            summary.issues = result.summary.issues.clone();
            ((*provenance).clone(), summary)
        })
        .collect();

    for finding in &result.summary.licenses {
        let provenance = assign(&prefixes, &finding.location.path);
        if let Some(summary) = slices.get_mut(provenance) {
            summary.licenses.insert(finding.clone());
        }
    }
    for finding in &result.summary.copyrights {
        let provenance = assign(&prefixes, &finding.location.path);
        if let Some(summary) = slices.get_mut(provenance) {
            summary.copyrights.insert(finding.clone());
        }
    }

    slices
        .into_iter()
        .map(|(provenance, summary)| {
            let scan_result = ScanResult::new(
                provenance.clone().into(),
                result.scanner.clone(),
                summary,
            );
            (provenance, scan_result)
        })
        .collect()
}

/// 경로가 배정될 출처를 찾습니다 (첫 번째 일치, 접두사 길이 내림차순).
fn assign<'a>(
    prefixes: &'a [(&str, &KnownProvenance)],
    path: &str,
) -> &'a KnownProvenance {
    prefixes
        .iter()
        .find(|(prefix, _)| is_path_prefix(prefix, path))
        .map(|(_, provenance)| *provenance)
        .expect("the empty root prefix matches every path")
}

/// `prefix`가 `path`의 경로 경계 접두사인지 확인합니다.
///
/// 일치 규칙: `prefix == ""` 이거나 `path == prefix` 이거나
/// `path`가 `prefix + "/"`로 시작.
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
