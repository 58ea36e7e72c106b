//! 패키지 출처 해석기 — 패키지를 구체적 출처로 변환
//!
//! [`PackageProvenanceResolver`]는 우선순위 목록을 순회하며 패키지의
//! 서술자 중 비어 있지 않은 첫 번째 것으로 출처를 결정합니다.
//! 기본 구현([`DefaultPackageProvenanceResolver`])은 검증을 수행하지
//! 않으며 항상 성공합니다. 검증하는 구현(아티팩트 URL 프로브, VCS
//! 리비전 확정)은 [`ResolutionError`]로 실패할 수 있습니다.

use provost_core::backend::BoxFuture;
use provost_core::error::ResolutionError;
use provost_core::provenance::{ArtifactProvenance, Provenance, RepositoryProvenance};
use provost_core::package::{Package, SourceCodeOrigin};

/// 패키지 출처 해석기
///
/// 계약: `Repository` 결과는 반드시 확정 리비전이 채워져 있어야
/// 합니다.
pub trait PackageProvenanceResolver: Send + Sync {
    /// 우선순위 목록에 따라 패키지의 출처를 해석합니다.
    fn resolve(
        &self,
        package: &Package,
        origins: &[SourceCodeOrigin],
    ) -> impl std::future::Future<Output = Result<Provenance, ResolutionError>> + Send;
}

/// dyn-compatible 패키지 출처 해석기 trait
pub trait DynPackageProvenanceResolver: Send + Sync {
    /// 우선순위 목록에 따라 패키지의 출처를 해석합니다.
    fn resolve<'a>(
        &'a self,
        package: &'a Package,
        origins: &'a [SourceCodeOrigin],
    ) -> BoxFuture<'a, Result<Provenance, ResolutionError>>;
}

impl<T: PackageProvenanceResolver> DynPackageProvenanceResolver for T {
    fn resolve<'a>(
        &'a self,
        package: &'a Package,
        origins: &'a [SourceCodeOrigin],
    ) -> BoxFuture<'a, Result<Provenance, ResolutionError>> {
        Box::pin(PackageProvenanceResolver::resolve(self, package, origins))
    }
}

/// 검증 없는 기본 해석기
///
/// 서술자의 존재 여부만으로 출처를 결정합니다. 확정 리비전이 없는
/// VCS 서술자는 요청 리비전을 그대로 확정 리비전으로 사용합니다
/// (요청이 이미 커밋 해시인 흔한 경우를 위한 폴백).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPackageProvenanceResolver;

impl PackageProvenanceResolver for DefaultPackageProvenanceResolver {
    async fn resolve(
        &self,
        package: &Package,
        origins: &[SourceCodeOrigin],
    ) -> Result<Provenance, ResolutionError> {
        for origin in origins {
            match origin {
                SourceCodeOrigin::Artifact => {
                    let Some(artifact) = package.source_artifact.as_ref().filter(|a| !a.is_empty())
                    else {
                        continue;
                    };
                    return Ok(Provenance::Artifact(ArtifactProvenance::new(
                        artifact.url.clone(),
                        artifact.hash.clone(),
                    )));
                }
                SourceCodeOrigin::Vcs => {
                    let Some(vcs) = package.vcs.as_ref().filter(|v| !v.is_empty()) else {
                        continue;
                    };
                    let resolved_revision = match &vcs.resolved_revision {
                        Some(resolved) => resolved.clone(),
                        None => {
                            tracing::warn!(
                                package = %package.id,
                                revision = %vcs.revision,
                                "vcs descriptor has no resolved revision, falling back to the requested revision"
                            );
                            vcs.revision.clone()
                        }
                    };
                    return Ok(Provenance::Repository(RepositoryProvenance {
                        vcs_type: vcs.vcs_type,
                        url: vcs.url.clone(),
                        revision: vcs.revision.clone(),
                        path: vcs.path.clone(),
                        resolved_revision,
                    }));
                }
            }
        }

        tracing::debug!(package = %package.id, "no source location found, provenance is unknown");
        Ok(Provenance::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provost_core::package::{SourceArtifact, VcsInfo};
    use provost_core::provenance::VcsType;

    fn package_with_both() -> Package {
        Package::new("pkg:both")
            .with_source_artifact(SourceArtifact::new("https://example.org/a.zip", None))
            .with_vcs(VcsInfo {
                vcs_type: VcsType::Git,
                url: "https://example.org/repo.git".to_owned(),
                revision: "main".to_owned(),
                path: String::new(),
                resolved_revision: Some("0123abcd".to_owned()),
            })
    }

    #[tokio::test]
    async fn priority_order_selects_first_matching_origin() {
        let resolver = DefaultPackageProvenanceResolver;
        let package = package_with_both();

        let vcs_first = PackageProvenanceResolver::resolve(
            &resolver,
            &package,
            &[SourceCodeOrigin::Vcs, SourceCodeOrigin::Artifact],
        )
        .await
        .unwrap();
        assert!(matches!(vcs_first, Provenance::Repository(_)));

        let artifact_first = PackageProvenanceResolver::resolve(
            &resolver,
            &package,
            &[SourceCodeOrigin::Artifact, SourceCodeOrigin::Vcs],
        )
        .await
        .unwrap();
        assert!(matches!(artifact_first, Provenance::Artifact(_)));
    }

    #[tokio::test]
    async fn repository_result_carries_resolved_revision() {
        let resolver = DefaultPackageProvenanceResolver;
        let package = package_with_both();

        let provenance =
            PackageProvenanceResolver::resolve(&resolver, &package, &[SourceCodeOrigin::Vcs])
                .await
                .unwrap();
        let Provenance::Repository(repository) = provenance else {
            panic!("expected repository provenance");
        };
        assert_eq!(repository.resolved_revision, "0123abcd");
        assert_eq!(repository.revision, "main");
    }

    #[tokio::test]
    async fn missing_resolved_revision_falls_back_to_requested() {
        let resolver = DefaultPackageProvenanceResolver;
        let package = Package::new("pkg:pinned").with_vcs(VcsInfo {
            vcs_type: VcsType::Git,
            url: "https://example.org/repo.git".to_owned(),
            revision: "fedcba98".to_owned(),
            path: String::new(),
            resolved_revision: None,
        });

        let provenance =
            PackageProvenanceResolver::resolve(&resolver, &package, &[SourceCodeOrigin::Vcs])
                .await
                .unwrap();
        let Provenance::Repository(repository) = provenance else {
            panic!("expected repository provenance");
        };
        assert_eq!(repository.resolved_revision, "fedcba98");
    }

    #[tokio::test]
    async fn no_descriptor_resolves_to_unknown() {
        let resolver = DefaultPackageProvenanceResolver;
        let package = Package::new("pkg:bare");

        let provenance = PackageProvenanceResolver::resolve(
            &resolver,
            &package,
            &SourceCodeOrigin::default_priority(),
        )
        .await
        .unwrap();
        assert_eq!(provenance, Provenance::Unknown);
    }

    #[tokio::test]
    async fn empty_descriptor_is_skipped() {
        let resolver = DefaultPackageProvenanceResolver;
        let package = Package::new("pkg:empty-vcs")
            .with_vcs(VcsInfo::default())
            .with_source_artifact(SourceArtifact::new("https://example.org/a.zip", None));

        let provenance = PackageProvenanceResolver::resolve(
            &resolver,
            &package,
            &[SourceCodeOrigin::Vcs, SourceCodeOrigin::Artifact],
        )
        .await
        .unwrap();
        assert!(matches!(provenance, Provenance::Artifact(_)));
    }
}
