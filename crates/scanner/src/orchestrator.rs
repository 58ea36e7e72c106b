//! 스캔 오케스트레이터 — 파이프라인 구동, 중복 제거, 결과 조립
//!
//! [`ScanOrchestrator`]는 스캔 파이프라인의 중심 조정자입니다.
//! 패키지 × 출처 × 스캐너 × 스토리지 네 축을 다음 단계로 조정합니다:
//!
//! 1. 패키지 출처 해석 → 2. 중첩 출처 전개 → 3. 캐시 조회 →
//! 4. 미완 패키지 식별 → 5. 패키지 단위 스캔 디스패치 →
//! 6. 미완 출처 식별 → 7. 출처 단위/로컬 스캔 디스패치 →
//! 8. 중첩 결과 조립 → 9. 패키지 키 결과 기록 → 10. 반환
//!
//! # 불변식
//!
//! - 동일 (스캐너, 출처) 쌍의 백엔드 호출은 실행당 최대 한 번입니다.
//! - 결과 맵의 변경은 집계 루프에서만 일어납니다. 스캔 태스크는
//!   병렬로 실행되지만 완료는 스폰 순서대로 환원되어 결과가
//!   결정적입니다.
//! - 항목 단위 실패(다운로드, 백엔드, 스토리지)는 실행을 중단하지
//!   않고 이슈가 첨부된 합성 결과로 변환됩니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use provost_core::backend::ScannerBackend;
use provost_core::config::ScanConfig;
use provost_core::criteria::ScannerCriteria;
use provost_core::download::DynProvenanceDownloader;
use provost_core::error::{ConfigError, DownloadError, ProvostError, ScannerError};
use provost_core::package::Package;
use provost_core::provenance::{KnownProvenance, NestedProvenance, Provenance};
use provost_core::scan::{
    Issue, NestedProvenanceScanResult, PackageScanResult, ScanResult, ScanRun, ScanSummary,
    ScannerDetails, Severity,
};
use provost_core::storage::{ScanStorageReader, ScanStorageWriter};

use crate::nested::{DefaultNestedProvenanceResolver, DynNestedProvenanceResolver};
use crate::resolver::{DefaultPackageProvenanceResolver, DynPackageProvenanceResolver};
use crate::splitter::split_nested_result;

/// 스캐너 한 개의 출처별 결과 맵
type ProvenanceResults = BTreeMap<KnownProvenance, Vec<ScanResult>>;

/// 해석이 끝난 패키지의 실행 중 상태
struct ResolvedPackage<'a> {
    package: &'a Package,
    provenance: Provenance,
    nested: Option<NestedProvenance>,
    issues: Vec<Issue>,
}

/// 스캔 오케스트레이터
///
/// [`ScanOrchestratorBuilder`]로 구성합니다. 구성 시점에 스캐너 부재,
/// 다운로더 누락, 모순된 캐시 기준을 동기적으로 거부합니다.
pub struct ScanOrchestrator {
    config: ScanConfig,
    scanners: Vec<Arc<ScannerBackend>>,
    criteria: Vec<ScannerCriteria>,
    readers: Vec<ScanStorageReader>,
    writers: Vec<ScanStorageWriter>,
    package_resolver: Arc<dyn DynPackageProvenanceResolver>,
    nested_resolver: Arc<dyn DynNestedProvenanceResolver>,
    downloader: Option<Arc<dyn DynProvenanceDownloader>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator").finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    /// 새 빌더를 반환합니다.
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new()
    }

    /// 구성에 사용된 설정을 반환합니다.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 실행 취소 토큰을 반환합니다.
    ///
    /// 취소 시 미결 백엔드 호출은 중단 신호를 받고, 취소 이후의 결과는
    /// 스토리지에 기록되지 않습니다.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 주어진 패키지 집합에 대해 스캔 실행을 수행합니다.
    ///
    /// 반환 맵은 동일 입력에 대해 안정적입니다. 출처가 확인되지 않은
    /// 패키지도 맵에 남지만 중첩 결과는 비어 있습니다.
    ///
    /// # Errors
    ///
    /// 실행이 취소되면 `ScannerError::Cancelled`를 반환합니다. 항목
    /// 단위 실패는 에러가 아니라 결과에 첨부된 이슈로 나타납니다.
    pub async fn run(&self, packages: &[Package]) -> Result<ScanRun, ProvostError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let run_start = SystemTime::now();
        info!(
            run_id = %run_id,
            packages = packages.len(),
            scanners = self.scanners.len(),
            readers = self.readers.len(),
            writers = self.writers.len(),
            "starting scan run"
        );

        // 1. 패키지 출처 해석
        let mut resolved = self.resolve_packages(packages).await;

        // 2. 중첩 출처 전개
        self.resolve_nested_provenances(&mut resolved).await;
        let all_provenances: BTreeSet<KnownProvenance> = resolved
            .iter()
            .filter_map(|rp| rp.nested.as_ref())
            .flat_map(|n| n.all_provenances())
            .collect();
        info!(provenances = all_provenances.len(), "resolved nested provenances");

        // 3. 캐시 조회
        let mut results: Vec<ProvenanceResults> =
            (0..self.scanners.len()).map(|_| BTreeMap::new()).collect();
        self.read_cached_results(&resolved, &all_provenances, &mut results)
            .await;

        // 4. 미완 패키지 식별
        let incomplete_packages = self.incomplete_packages(&resolved, &results);
        let incomplete_indices: BTreeSet<usize> =
            incomplete_packages.iter().map(|(idx, _)| *idx).collect();
        info!(
            incomplete_packages = incomplete_packages.len(),
            "identified packages with missing scan results"
        );

        // 5. 패키지 단위 스캔 디스패치
        self.dispatch_package_scans(&resolved, &incomplete_packages, &mut results)
            .await?;

        // 6. 미완 출처 식별
        let incomplete_provenances = self.incomplete_provenances(&all_provenances, &results);
        info!(
            incomplete_provenances = incomplete_provenances.len(),
            "identified provenances with missing scan results"
        );

        // 7. 출처 단위/로컬 스캔 디스패치
        self.dispatch_provenance_scans(&incomplete_provenances, &mut results)
            .await?;

        // 8. 중첩 결과 조립
        let run_results = assemble_results(&resolved, &results);

        // 9. 패키지 키 결과 기록
        if self.cancel.is_cancelled() {
            return Err(ScannerError::Cancelled.into());
        }
        self.write_package_results(&resolved, &incomplete_indices, &run_results)
            .await;

        // 10. 반환
        let run = ScanRun {
            id: run_id,
            start_time: run_start,
            end_time: SystemTime::now(),
            results: run_results,
        };
        info!(run_id = %run.id, packages = run.results.len(), "scan run finished");
        Ok(run)
    }

    /// 1단계: 각 패키지의 출처를 해석합니다.
    async fn resolve_packages<'a>(&self, packages: &'a [Package]) -> Vec<ResolvedPackage<'a>> {
        let mut resolved = Vec::with_capacity(packages.len());
        for package in packages {
            let (provenance, issues) = match self
                .package_resolver
                .resolve(package, &self.config.source_code_origins)
                .await
            {
                Ok(provenance) => {
                    debug!(package = %package.id, provenance = %provenance, "resolved package provenance");
                    (provenance, Vec::new())
                }
                Err(e) => {
                    warn!(package = %package.id, error = %e, "package provenance resolution failed");
                    (
                        Provenance::Unknown,
                        vec![Issue::new("Resolver", e.to_string(), Severity::Error)],
                    )
                }
            };
            resolved.push(ResolvedPackage {
                package,
                provenance,
                nested: None,
                issues,
            });
        }
        resolved
    }

    /// 2단계: 확인된 출처를 중첩 출처 트리로 전개합니다.
    async fn resolve_nested_provenances(&self, resolved: &mut [ResolvedPackage<'_>]) {
        for rp in resolved {
            let Some(known) = rp.provenance.to_known() else {
                continue;
            };
            match self.nested_resolver.resolve(&known).await {
                Ok(nested) => rp.nested = Some(nested),
                Err(e) => {
                    warn!(package = %rp.package.id, error = %e, "nested provenance resolution failed");
                    rp.issues
                        .push(Issue::new("Resolver", e.to_string(), Severity::Error));
                }
            }
        }
    }

    /// 3단계: 등록 순서대로 리더를 조회해 결과 맵을 채웁니다.
    ///
    /// 비어 있지 않은 첫 결과가 승리하며, 이후 리더의 동일 (스캐너,
    /// 출처) 결과는 버려집니다. 읽기 실패는 "결과 없음"으로
    /// 강등됩니다.
    async fn read_cached_results(
        &self,
        resolved: &[ResolvedPackage<'_>],
        all_provenances: &BTreeSet<KnownProvenance>,
        results: &mut [ProvenanceResults],
    ) {
        for s_idx in 0..self.scanners.len() {
            let criteria = &self.criteria[s_idx];
            for provenance in all_provenances {
                for reader in &self.readers {
                    if covered(&results[s_idx], provenance) {
                        break;
                    }
                    match reader {
                        ScanStorageReader::Provenance(r) => {
                            match r.read(provenance, criteria).await {
                                Ok(stored) => {
                                    let matching: Vec<ScanResult> = stored
                                        .into_iter()
                                        .filter(|result| criteria.matches(&result.scanner))
                                        .collect();
                                    merge_if_absent(&mut results[s_idx], provenance, matching);
                                }
                                Err(e) => {
                                    warn!(
                                        storage = reader.name(),
                                        provenance = %provenance,
                                        error = %e,
                                        "storage read failed, treating as no result"
                                    );
                                }
                            }
                        }
                        ScanStorageReader::Package(r) => {
                            // 이 출처를 트리에 담고 있는 첫 패키지로 조회한다
                            let Some(rp) = resolved.iter().find(|rp| {
                                rp.nested.as_ref().is_some_and(|n| n.contains(provenance))
                            }) else {
                                continue;
                            };
                            match r.read(rp.package, criteria).await {
                                Ok(stored_trees) => {
                                    for tree in stored_trees {
                                        for (prov, stored) in &tree.scan_results {
                                            let matching: Vec<ScanResult> = stored
                                                .iter()
                                                .filter(|result| criteria.matches(&result.scanner))
                                                .cloned()
                                                .collect();
                                            merge_if_absent(&mut results[s_idx], prov, matching);
                                        }
                                    }
                                }
                                Err(e) => {
                                    warn!(
                                        storage = reader.name(),
                                        package = %rp.package.id,
                                        error = %e,
                                        "storage read failed, treating as no result"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// 4단계: 스캐너별 결과가 모자란 패키지를 식별합니다.
    fn incomplete_packages(
        &self,
        resolved: &[ResolvedPackage<'_>],
        results: &[ProvenanceResults],
    ) -> Vec<(usize, Vec<usize>)> {
        resolved
            .iter()
            .enumerate()
            .filter_map(|(idx, rp)| {
                let nested = rp.nested.as_ref()?;
                let provenances = nested.all_provenances();
                let missing: Vec<usize> = (0..self.scanners.len())
                    .filter(|&s_idx| {
                        !provenances.iter().all(|q| covered(&results[s_idx], q))
                    })
                    .collect();
                (!missing.is_empty()).then_some((idx, missing))
            })
            .collect()
    }

    /// 5단계: 패키지 단위 백엔드에 스캔을 디스패치합니다.
    ///
    /// 동일 루트 출처로 해석된 패키지는 스캐너당 한 번만 디스패치되며
    /// 결과는 경로 접두사로 분할되어 출처별로 병합됩니다.
    async fn dispatch_package_scans(
        &self,
        resolved: &[ResolvedPackage<'_>],
        incomplete: &[(usize, Vec<usize>)],
        results: &mut [ProvenanceResults],
    ) -> Result<(), ProvostError> {
        let mut dispatched: Vec<BTreeSet<KnownProvenance>> =
            vec![BTreeSet::new(); self.scanners.len()];
        let mut handles: Vec<(usize, usize, JoinHandle<Result<ScanResult, ScannerError>>)> =
            Vec::new();

        for (rp_idx, missing) in incomplete {
            let Some(nested) = resolved[*rp_idx].nested.as_ref() else {
                continue;
            };
            for &s_idx in missing {
                if !matches!(self.scanners[s_idx].as_ref(), ScannerBackend::Package(_)) {
                    continue;
                }
                if !dispatched[s_idx].insert(nested.root().clone()) {
                    debug!(
                        scanner = self.scanners[s_idx].name(),
                        package = %resolved[*rp_idx].package.id,
                        "root provenance already dispatched, reusing in-flight package scan"
                    );
                    continue;
                }

                let backend = Arc::clone(&self.scanners[s_idx]);
                let scanner_name = backend.name().to_owned();
                let package = resolved[*rp_idx].package.clone();
                let timeout = self.config.scan_timeout();
                let cancel = self.cancel.clone();
                debug!(scanner = %scanner_name, package = %package.id, "dispatching package scan");
                let handle = tokio::spawn(async move {
                    let fut = async {
                        match backend.as_ref() {
                            ScannerBackend::Package(b) => b.scan_package(&package).await,
                            _ => Err(ScannerError::Invocation {
                                scanner: String::new(),
                                reason: "backend shape mismatch".to_owned(),
                            }),
                        }
                    };
                    bounded_scan(scanner_name, timeout, cancel, fut).await
                });
                handles.push((s_idx, *rp_idx, handle));
            }
        }

        if !handles.is_empty() {
            info!(scans = handles.len(), "dispatched package-granular scans");
        }

        // 스폰 순서대로 환원하여 결과를 결정적으로 병합한다
        for (s_idx, rp_idx, handle) in handles {
            let joined = handle.await;
            if self.cancel.is_cancelled() {
                return Err(ScannerError::Cancelled.into());
            }
            let Some(nested) = resolved[rp_idx].nested.as_ref() else {
                continue;
            };
            let details = self.scanners[s_idx].details().clone();
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(
                        scanner = %details.name,
                        package = %resolved[rp_idx].package.id,
                        error = %e,
                        "package scan failed"
                    );
                    error_result(nested.root(), &details, &details.name, e.to_string())
                }
                Err(e) => {
                    warn!(scanner = %details.name, error = %e, "package scan task panicked");
                    error_result(
                        nested.root(),
                        &details,
                        &details.name,
                        format!("scan task panicked: {e}"),
                    )
                }
            };

            for (provenance, slice) in split_nested_result(&result, nested) {
                results[s_idx].entry(provenance).or_default().push(slice);
            }
        }

        Ok(())
    }

    /// 6단계: 스캐너별 결과가 모자란 출처를 식별합니다.
    fn incomplete_provenances(
        &self,
        all_provenances: &BTreeSet<KnownProvenance>,
        results: &[ProvenanceResults],
    ) -> Vec<(KnownProvenance, Vec<usize>)> {
        all_provenances
            .iter()
            .filter_map(|provenance| {
                let missing: Vec<usize> = (0..self.scanners.len())
                    .filter(|&s_idx| !covered(&results[s_idx], provenance))
                    .collect();
                (!missing.is_empty()).then(|| (provenance.clone(), missing))
            })
            .collect()
    }

    /// 7단계: 출처 단위 원격/로컬 백엔드에 스캔을 디스패치합니다.
    ///
    /// 로컬 스캐너가 필요한 출처는 실행당 한 번 내려받아 모든 로컬
    /// 스캐너가 공유합니다. 다운로드 실패는 로컬 스캐너당 하나의
    /// Downloader 이슈가 첨부된 합성 결과가 됩니다.
    async fn dispatch_provenance_scans(
        &self,
        incomplete: &[(KnownProvenance, Vec<usize>)],
        results: &mut [ProvenanceResults],
    ) -> Result<(), ProvostError> {
        let downloads = self.download_for_local_scans(incomplete).await?;

        enum JobKind {
            Scan {
                handle: JoinHandle<Result<ScanResult, ScannerError>>,
                local: bool,
            },
            DownloadFailure(String),
        }
        struct Job {
            s_idx: usize,
            provenance: KnownProvenance,
            kind: JobKind,
        }

        let mut jobs: Vec<Job> = Vec::new();
        for (provenance, missing) in incomplete {
            for &s_idx in missing {
                let backend = Arc::clone(&self.scanners[s_idx]);
                let scanner_name = backend.name().to_owned();
                let timeout = self.config.scan_timeout();
                let cancel = self.cancel.clone();

                match backend.as_ref() {
                    ScannerBackend::Provenance(_) => {
                        let target = provenance.clone();
                        debug!(scanner = %scanner_name, provenance = %target, "dispatching provenance scan");
                        let handle = tokio::spawn(async move {
                            let fut = async {
                                match backend.as_ref() {
                                    ScannerBackend::Provenance(b) => {
                                        b.scan_provenance(&target).await
                                    }
                                    _ => Err(ScannerError::Invocation {
                                        scanner: String::new(),
                                        reason: "backend shape mismatch".to_owned(),
                                    }),
                                }
                            };
                            bounded_scan(scanner_name, timeout, cancel, fut).await
                        });
                        jobs.push(Job {
                            s_idx,
                            provenance: provenance.clone(),
                            kind: JobKind::Scan {
                                handle,
                                local: false,
                            },
                        });
                    }
                    ScannerBackend::Local(_) => match downloads.get(provenance) {
                        Some(Ok(dir)) => {
                            let dir = Arc::clone(dir);
                            debug!(scanner = %scanner_name, provenance = %provenance, "dispatching local scan");
                            let handle = tokio::spawn(async move {
                                let fut = async {
                                    match backend.as_ref() {
                                        ScannerBackend::Local(b) => b.scan_path(dir.path()).await,
                                        _ => Err(ScannerError::Invocation {
                                            scanner: String::new(),
                                            reason: "backend shape mismatch".to_owned(),
                                        }),
                                    }
                                };
                                bounded_scan(scanner_name, timeout, cancel, fut).await
                            });
                            jobs.push(Job {
                                s_idx,
                                provenance: provenance.clone(),
                                kind: JobKind::Scan {
                                    handle,
                                    local: true,
                                },
                            });
                        }
                        Some(Err(message)) => jobs.push(Job {
                            s_idx,
                            provenance: provenance.clone(),
                            kind: JobKind::DownloadFailure(message.clone()),
                        }),
                        None => jobs.push(Job {
                            s_idx,
                            provenance: provenance.clone(),
                            kind: JobKind::DownloadFailure(
                                "download unavailable for this provenance".to_owned(),
                            ),
                        }),
                    },
                    // 패키지 단위 백엔드는 5단계에서 처리되었다
                    ScannerBackend::Package(_) => {}
                }
            }
        }

        if !jobs.is_empty() {
            info!(scans = jobs.len(), "dispatched provenance-granular and local scans");
        }

        // 스폰 순서대로 환원한다
        for job in jobs {
            let details = self.scanners[job.s_idx].details().clone();
            let result = match job.kind {
                JobKind::Scan { handle, local } => {
                    let joined = handle.await;
                    if self.cancel.is_cancelled() {
                        return Err(ScannerError::Cancelled.into());
                    }
                    match joined {
                        Ok(Ok(mut result)) => {
                            // 로컬 백엔드는 출처를 알지 못하므로 여기서 기입한다
                            if local {
                                result.provenance = job.provenance.clone().into();
                            }
                            result
                        }
                        Ok(Err(e)) => {
                            warn!(
                                scanner = %details.name,
                                provenance = %job.provenance,
                                error = %e,
                                "provenance scan failed"
                            );
                            error_result(&job.provenance, &details, &details.name, e.to_string())
                        }
                        Err(e) => {
                            warn!(scanner = %details.name, error = %e, "scan task panicked");
                            error_result(
                                &job.provenance,
                                &details,
                                &details.name,
                                format!("scan task panicked: {e}"),
                            )
                        }
                    }
                }
                JobKind::DownloadFailure(message) => {
                    if self.cancel.is_cancelled() {
                        return Err(ScannerError::Cancelled.into());
                    }
                    error_result(&job.provenance, &details, "Downloader", message)
                }
            };

            self.write_provenance_result(&job.provenance, &result).await;
            results[job.s_idx]
                .entry(job.provenance)
                .or_default()
                .push(result);
        }

        Ok(())
    }

    /// 로컬 스캐너가 필요한 출처를 내려받습니다 (출처당 한 번).
    async fn download_for_local_scans(
        &self,
        incomplete: &[(KnownProvenance, Vec<usize>)],
    ) -> Result<BTreeMap<KnownProvenance, Result<Arc<TempDir>, String>>, ProvostError> {
        let mut needed: Vec<KnownProvenance> = Vec::new();
        for (provenance, missing) in incomplete {
            let wants_local = missing.iter().any(|&s_idx| self.scanners[s_idx].is_local());
            if wants_local && !needed.contains(provenance) {
                needed.push(provenance.clone());
            }
        }

        let mut downloads = BTreeMap::new();
        if needed.is_empty() {
            return Ok(downloads);
        }

        let Some(downloader) = &self.downloader else {
            // build()가 로컬 스캐너 + 다운로더 부재를 거부하므로 도달하지
            // 않지만, 계약 위반을 이슈로 강등해 실행은 계속한다.
            for provenance in needed {
                downloads.insert(
                    provenance,
                    Err("no provenance downloader configured".to_owned()),
                );
            }
            return Ok(downloads);
        };

        info!(downloads = needed.len(), "downloading provenances for local scanners");
        let mut handles: Vec<(KnownProvenance, JoinHandle<Result<TempDir, String>>)> = Vec::new();
        for provenance in &needed {
            let downloader = Arc::clone(downloader);
            let target = provenance.clone();
            let parent = self.config.download_dir.clone();
            let timeout = self.config.download_timeout();
            let cancel = self.cancel.clone();
            let handle = tokio::spawn(async move {
                let dir = scratch_dir(parent.as_deref()).map_err(|e| e.to_string())?;
                let fut = async {
                    match timeout {
                        Some(limit) => {
                            match tokio::time::timeout(
                                limit,
                                downloader.download(&target, dir.path()),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(DownloadError::Timeout {
                                    provenance: target.storage_key(),
                                    secs: limit.as_secs(),
                                }),
                            }
                        }
                        None => downloader.download(&target, dir.path()).await,
                    }
                };
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err("download cancelled".to_owned()),
                    result = fut => result.map_err(|e| e.to_string()),
                };
                outcome.map(|()| dir)
            });
            handles.push((provenance.clone(), handle));
        }

        for (provenance, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(dir)) => Ok(Arc::new(dir)),
                Ok(Err(message)) => Err(message),
                Err(e) => Err(format!("download task panicked: {e}")),
            };
            if self.cancel.is_cancelled() {
                return Err(ScannerError::Cancelled.into());
            }
            if let Err(message) = &outcome {
                warn!(provenance = %provenance, error = %message, "provenance download failed");
            }
            downloads.insert(provenance, outcome);
        }

        Ok(downloads)
    }

    /// 새로 생산된 결과를 모든 출처 키 라이터에 전달합니다.
    async fn write_provenance_result(&self, provenance: &KnownProvenance, result: &ScanResult) {
        for writer in &self.writers {
            if let ScanStorageWriter::Provenance(w) = writer {
                if let Err(e) = w.write(provenance, result).await {
                    warn!(
                        storage = writer.name(),
                        provenance = %provenance,
                        error = %e,
                        "storage write failed"
                    );
                }
            }
        }
    }

    /// 9단계: 미완이었던 패키지의 중첩 결과를 패키지 키 라이터에
    /// 전달합니다.
    async fn write_package_results(
        &self,
        resolved: &[ResolvedPackage<'_>],
        incomplete_indices: &BTreeSet<usize>,
        run_results: &BTreeMap<String, PackageScanResult>,
    ) {
        for &rp_idx in incomplete_indices {
            let rp = &resolved[rp_idx];
            let Some(nested_result) = run_results
                .get(&rp.package.id)
                .and_then(|r| r.nested.as_ref())
            else {
                continue;
            };
            for writer in &self.writers {
                if let ScanStorageWriter::Package(w) = writer {
                    if let Err(e) = w.write(rp.package, nested_result).await {
                        warn!(
                            storage = writer.name(),
                            package = %rp.package.id,
                            error = %e,
                            "storage write failed"
                        );
                    }
                }
            }
        }
    }
}

/// 8단계: 스캐너별 결과 맵에서 패키지별 중첩 결과를 조립합니다.
fn assemble_results(
    resolved: &[ResolvedPackage<'_>],
    results: &[ProvenanceResults],
) -> BTreeMap<String, PackageScanResult> {
    let mut run_results = BTreeMap::new();
    for rp in resolved {
        let nested = rp.nested.as_ref().map(|nested| {
            let mut per_provenance: BTreeMap<KnownProvenance, Vec<ScanResult>> = BTreeMap::new();
            for provenance in nested.all_provenances() {
                let merged: Vec<ScanResult> = results
                    .iter()
                    .flat_map(|scanner_results| {
                        scanner_results
                            .get(&provenance)
                            .map(Vec::as_slice)
                            .unwrap_or_default()
                            .iter()
                            .cloned()
                    })
                    .collect();
                per_provenance.insert(provenance, merged);
            }
            NestedProvenanceScanResult::new(nested.clone(), per_provenance)
        });

        run_results.insert(
            rp.package.id.clone(),
            PackageScanResult {
                provenance: rp.provenance.clone(),
                nested,
                issues: rp.issues.clone(),
            },
        );
    }
    run_results
}

/// 출처가 해당 스캐너에 의해 커버되었는지 확인합니다.
///
/// 비어 있지 않은 결과 목록만 캐시 적중으로 인정합니다.
fn covered(results: &ProvenanceResults, provenance: &KnownProvenance) -> bool {
    results.get(provenance).is_some_and(|r| !r.is_empty())
}

/// 비어 있지 않은 기존 항목을 덮어쓰지 않고 병합합니다.
///
/// 리더 등록 순서의 첫 일치가 승리하고, 이후 일치는 버려집니다.
fn merge_if_absent(
    results: &mut ProvenanceResults,
    provenance: &KnownProvenance,
    incoming: Vec<ScanResult>,
) {
    if incoming.is_empty() {
        return;
    }
    let entry = results.entry(provenance.clone()).or_default();
    if entry.is_empty() {
        *entry = incoming;
    } else {
        debug!(
            provenance = %provenance,
            discarded = incoming.len(),
            "discarding later storage match for already covered provenance"
        );
    }
}

/// 이슈 하나가 첨부된 합성 에러 결과를 생성합니다.
fn error_result(
    provenance: &KnownProvenance,
    details: &ScannerDetails,
    source: &str,
    message: String,
) -> ScanResult {
    let now = SystemTime::now();
    ScanResult::new(
        provenance.clone().into(),
        details.clone(),
        ScanSummary::with_issue(now, now, Issue::new(source, message, Severity::Error)),
    )
}

/// 백엔드 호출을 제한 시간과 취소 신호 아래에서 실행합니다.
async fn bounded_scan<F>(
    scanner: String,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    fut: F,
) -> Result<ScanResult, ScannerError>
where
    F: std::future::Future<Output = Result<ScanResult, ScannerError>> + Send,
{
    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ScannerError::Timeout {
                    scanner,
                    secs: limit.as_secs(),
                }),
            },
            None => fut.await,
        }
    };
    tokio::select! {
        _ = cancel.cancelled() => Err(ScannerError::Cancelled),
        result = bounded => result,
    }
}

/// 다운로드 작업 디렉토리를 생성합니다.
fn scratch_dir(parent: Option<&str>) -> Result<TempDir, DownloadError> {
    let result = match parent {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| DownloadError::ScratchDir(e.to_string()))?;
            tempfile::Builder::new().prefix("provost-scan-").tempdir_in(dir)
        }
        None => tempfile::Builder::new().prefix("provost-scan-").tempdir(),
    };
    result.map_err(|e| DownloadError::ScratchDir(e.to_string()))
}

/// [`ScanOrchestrator`] 빌더
///
/// 스캐너·스토리지·해석기·다운로더를 등록하고 구성 시점 검증을
/// 수행합니다.
pub struct ScanOrchestratorBuilder {
    config: ScanConfig,
    scanners: Vec<Arc<ScannerBackend>>,
    readers: Vec<ScanStorageReader>,
    writers: Vec<ScanStorageWriter>,
    package_resolver: Option<Arc<dyn DynPackageProvenanceResolver>>,
    nested_resolver: Option<Arc<dyn DynNestedProvenanceResolver>>,
    downloader: Option<Arc<dyn DynProvenanceDownloader>>,
    cancel: Option<CancellationToken>,
}

impl ScanOrchestratorBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
            scanners: Vec::new(),
            readers: Vec::new(),
            writers: Vec::new(),
            package_resolver: None,
            nested_resolver: None,
            downloader: None,
            cancel: None,
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// 스캐너 백엔드를 등록합니다. 등록 순서가 보존됩니다.
    pub fn scanner(mut self, backend: ScannerBackend) -> Self {
        self.scanners.push(Arc::new(backend));
        self
    }

    /// 스토리지 리더를 등록합니다. 조회는 등록 순서를 따릅니다.
    pub fn reader(mut self, reader: ScanStorageReader) -> Self {
        self.readers.push(reader);
        self
    }

    /// 스토리지 라이터를 등록합니다. 모든 라이터가 새 결과를 받습니다.
    pub fn writer(mut self, writer: ScanStorageWriter) -> Self {
        self.writers.push(writer);
        self
    }

    /// 패키지 출처 해석기를 지정합니다 (기본: 검증 없는 해석기).
    pub fn package_resolver<R>(mut self, resolver: R) -> Self
    where
        R: crate::resolver::PackageProvenanceResolver + 'static,
    {
        self.package_resolver = Some(Arc::new(resolver));
        self
    }

    /// 중첩 출처 해석기를 지정합니다 (기본: 루트 전용 해석기).
    pub fn nested_resolver<R>(mut self, resolver: R) -> Self
    where
        R: crate::nested::NestedProvenanceResolver + 'static,
    {
        self.nested_resolver = Some(Arc::new(resolver));
        self
    }

    /// 출처 다운로더를 지정합니다. 로컬 스캐너가 있으면 필수입니다.
    pub fn downloader<D>(mut self, downloader: D) -> Self
    where
        D: provost_core::download::ProvenanceDownloader + 'static,
    {
        self.downloader = Some(Arc::new(downloader));
        self
    }

    /// 외부 취소 토큰을 지정합니다.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 오케스트레이터를 빌드합니다.
    ///
    /// # Errors
    ///
    /// 다음 경우 `ConfigError`를 반환합니다:
    /// - 설정 값이 유효하지 않음
    /// - 스캐너가 하나도 없음 (`NoScanners`)
    /// - 스캐너 이름이 중복됨
    /// - 로컬 스캐너가 있으나 다운로더가 없음 (`MissingDownloader`)
    /// - 캐시 조회 기준이 모순됨 (`CriteriaConflict`)
    pub fn build(self) -> Result<ScanOrchestrator, ConfigError> {
        self.config.validate()?;

        if self.scanners.is_empty() {
            return Err(ConfigError::NoScanners);
        }

        let mut names: Vec<&str> = Vec::new();
        for scanner in &self.scanners {
            let name = scanner.name();
            if names.contains(&name) {
                return Err(ConfigError::InvalidValue {
                    field: "scanners".to_owned(),
                    reason: format!("duplicate scanner name '{name}'"),
                });
            }
            names.push(name);
        }

        if self.downloader.is_none() {
            if let Some(local) = self.scanners.iter().find(|s| s.is_local()) {
                return Err(ConfigError::MissingDownloader {
                    scanner: local.name().to_owned(),
                });
            }
        }

        let mut criteria = Vec::with_capacity(self.scanners.len());
        for scanner in &self.scanners {
            let name = scanner.name();
            let base = scanner.criteria()?;
            let effective = match self.config.options_for(name) {
                Some(options) => base.with_overrides(name, options)?,
                None => {
                    base.validate(name)?;
                    base
                }
            };
            criteria.push(effective);
        }

        Ok(ScanOrchestrator {
            config: self.config,
            scanners: self.scanners,
            criteria,
            readers: self.readers,
            writers: self.writers,
            package_resolver: self
                .package_resolver
                .unwrap_or_else(|| Arc::new(DefaultPackageProvenanceResolver)),
            nested_resolver: self
                .nested_resolver
                .unwrap_or_else(|| Arc::new(DefaultNestedProvenanceResolver)),
            downloader: self.downloader,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Default for ScanOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
