//! 출처 모델 — 소스 트리의 기원을 기술하는 태그된 타입
//!
//! [`Provenance`]는 소스가 어디서 왔는지를 기술하는 합 타입입니다.
//! 원격 소스 아카이브([`ArtifactProvenance`]), 버전 관리 저장소
//! ([`RepositoryProvenance`]), 기원 불명(`Unknown`)의 세 경우가 있으며,
//! 앞의 두 경우만 모은 부분집합이 [`KnownProvenance`]입니다.
//!
//! # 캐시 건전성
//!
//! `RepositoryProvenance`의 동등성은 (VCS 종류, URL, 저장소 내 경로,
//! **확정 리비전**)으로만 정의됩니다. 요청 리비전(`revision`)은 심볼릭
//! 참조(`main` 등)일 수 있어 비교에서 제외합니다. 이 규칙이 출처 키
//! 기반 캐시 재사용을 건전하게 만듭니다.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// 버전 관리 시스템 종류
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum VcsType {
    /// Git
    Git,
    /// Mercurial
    Mercurial,
    /// Subversion
    Subversion,
    /// 알 수 없는 VCS
    #[default]
    Unknown,
}

impl VcsType {
    /// 문자열에서 VCS 종류를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며 흔한 축약형을 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "git" => Some(Self::Git),
            "mercurial" | "hg" => Some(Self::Mercurial),
            "subversion" | "svn" => Some(Self::Subversion),
            "unknown" | "" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for VcsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Mercurial => write!(f, "mercurial"),
            Self::Subversion => write!(f, "subversion"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// 원격 소스 아카이브 출처
///
/// URL과 선택적 콘텐츠 해시로 식별됩니다.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ArtifactProvenance {
    /// 아카이브 URL
    pub url: String,
    /// 콘텐츠 해시 (있을 경우)
    pub hash: Option<String>,
}

impl ArtifactProvenance {
    /// 새 아티팩트 출처를 생성합니다.
    pub fn new(url: impl Into<String>, hash: Option<String>) -> Self {
        Self {
            url: url.into(),
            hash,
        }
    }
}

impl fmt::Display for ArtifactProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hash {
            Some(hash) => write!(f, "{} ({hash})", self.url),
            None => write!(f, "{}", self.url),
        }
    }
}

/// 버전 관리 저장소 출처
///
/// 요청 리비전(`revision`)과 해석 시점에 확정된 불변 리비전
/// (`resolved_revision`)을 함께 담습니다. 동등성·순서·해시는
/// `resolved_revision`만 반영하며 `revision`은 제외합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryProvenance {
    /// VCS 종류
    pub vcs_type: VcsType,
    /// 저장소 URL
    pub url: String,
    /// 요청 리비전 (심볼릭 가능, 비교에서 제외)
    pub revision: String,
    /// 저장소 내 경로 ("" = 저장소 루트)
    pub path: String,
    /// 확정된 불변 리비전
    pub resolved_revision: String,
}

impl RepositoryProvenance {
    /// 동등성·순서 비교에 참여하는 필드 튜플
    fn identity(&self) -> (VcsType, &str, &str, &str) {
        (
            self.vcs_type,
            self.url.as_str(),
            self.path.as_str(),
            self.resolved_revision.as_str(),
        )
    }
}

impl PartialEq for RepositoryProvenance {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RepositoryProvenance {}

impl PartialOrd for RepositoryProvenance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RepositoryProvenance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for RepositoryProvenance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for RepositoryProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}@{}", self.vcs_type, self.url, self.resolved_revision)?;
        if !self.path.is_empty() {
            write!(f, "#{}", self.path)?;
        }
        Ok(())
    }
}

/// 소스 출처 (기원 불명 포함)
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Provenance {
    /// 원격 소스 아카이브
    Artifact(ArtifactProvenance),
    /// 버전 관리 저장소
    Repository(RepositoryProvenance),
    /// 출처를 확인할 수 없음
    Unknown,
}

impl Provenance {
    /// 출처가 확인되었는지 여부
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// 확인된 출처로 변환합니다. `Unknown`이면 `None`을 반환합니다.
    pub fn to_known(&self) -> Option<KnownProvenance> {
        match self {
            Self::Artifact(artifact) => Some(KnownProvenance::Artifact(artifact.clone())),
            Self::Repository(repository) => Some(KnownProvenance::Repository(repository.clone())),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact(artifact) => write!(f, "artifact {artifact}"),
            Self::Repository(repository) => write!(f, "repository {repository}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<KnownProvenance> for Provenance {
    fn from(known: KnownProvenance) -> Self {
        match known {
            KnownProvenance::Artifact(artifact) => Self::Artifact(artifact),
            KnownProvenance::Repository(repository) => Self::Repository(repository),
        }
    }
}

/// 확인된 소스 출처
///
/// 캐시 키와 중첩 출처 트리의 노드로 쓰이는 부분집합입니다.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum KnownProvenance {
    /// 원격 소스 아카이브
    Artifact(ArtifactProvenance),
    /// 버전 관리 저장소
    Repository(RepositoryProvenance),
}

impl KnownProvenance {
    /// 스토리지 백엔드가 사용하는 표준 키 문자열을 반환합니다.
    ///
    /// - 아티팩트: `artifact:<url>|<hash>`
    /// - 저장소: `vcs:<type>|<url>|<resolvedRevision>|<path>`
    pub fn storage_key(&self) -> String {
        match self {
            Self::Artifact(artifact) => format!(
                "artifact:{}|{}",
                artifact.url,
                artifact.hash.as_deref().unwrap_or_default(),
            ),
            Self::Repository(repository) => format!(
                "vcs:{}|{}|{}|{}",
                repository.vcs_type,
                repository.url,
                repository.resolved_revision,
                repository.path,
            ),
        }
    }
}

impl fmt::Display for KnownProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact(artifact) => write!(f, "artifact {artifact}"),
            Self::Repository(repository) => write!(f, "repository {repository}"),
        }
    }
}

/// 중첩 출처 트리
///
/// 루트 출처와, 트리 내 경로("/" 구분 상대 디렉토리)에 마운트된 서브
/// 저장소 출처의 매핑입니다. 루트 경로 ""는 서브 저장소 키로 등장할 수
/// 없으며 모든 키는 정규형이어야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedProvenance {
    root: KnownProvenance,
    sub_repositories: BTreeMap<String, KnownProvenance>,
}

impl NestedProvenance {
    /// 중첩 출처 트리를 생성합니다.
    ///
    /// # Errors
    ///
    /// 서브 저장소 키가 정규형이 아니면
    /// `ResolutionError::InvalidSubRepositoryPath`를 반환합니다.
    /// 거부되는 형태: 빈 경로, 절대 경로, 후행 `/`, `.`/`..` 세그먼트,
    /// 빈 세그먼트.
    pub fn new(
        root: KnownProvenance,
        sub_repositories: BTreeMap<String, KnownProvenance>,
    ) -> Result<Self, ResolutionError> {
        for path in sub_repositories.keys() {
            validate_sub_repository_path(path)?;
        }
        Ok(Self {
            root,
            sub_repositories,
        })
    }

    /// 서브 저장소 없는 루트 전용 트리를 생성합니다.
    pub fn root_only(root: KnownProvenance) -> Self {
        Self {
            root,
            sub_repositories: BTreeMap::new(),
        }
    }

    /// 루트 출처
    pub fn root(&self) -> &KnownProvenance {
        &self.root
    }

    /// 트리 내 경로 → 서브 저장소 출처 매핑
    pub fn sub_repositories(&self) -> &BTreeMap<String, KnownProvenance> {
        &self.sub_repositories
    }

    /// 루트를 포함한 트리의 모든 출처를 반환합니다.
    pub fn all_provenances(&self) -> BTreeSet<KnownProvenance> {
        let mut provenances: BTreeSet<KnownProvenance> =
            self.sub_repositories.values().cloned().collect();
        provenances.insert(self.root.clone());
        provenances
    }

    /// 주어진 출처가 트리에 포함되는지 확인합니다.
    pub fn contains(&self, provenance: &KnownProvenance) -> bool {
        self.root == *provenance || self.sub_repositories.values().any(|p| p == provenance)
    }
}

impl fmt::Display for NestedProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (+{} sub-repositories)",
            self.root,
            self.sub_repositories.len(),
        )
    }
}

/// 서브 저장소 경로가 정규형인지 검사합니다.
fn validate_sub_repository_path(path: &str) -> Result<(), ResolutionError> {
    let reject = |reason: &str| {
        Err(ResolutionError::InvalidSubRepositoryPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        })
    };

    if path.is_empty() {
        return reject("the root path \"\" must not be a sub-repository key");
    }
    if path.starts_with('/') {
        return reject("path must be relative");
    }
    if path.ends_with('/') {
        return reject("path must not have a trailing slash");
    }
    for segment in path.split('/') {
        match segment {
            "" => return reject("path must not contain empty segments"),
            "." => return reject("path must not contain '.' segments"),
            ".." => return reject("path must not contain '..' segments"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(revision: &str, resolved: &str) -> RepositoryProvenance {
        RepositoryProvenance {
            vcs_type: VcsType::Git,
            url: "https://example.org/repo.git".to_owned(),
            revision: revision.to_owned(),
            path: String::new(),
            resolved_revision: resolved.to_owned(),
        }
    }

    #[test]
    fn vcs_type_from_str_loose() {
        assert_eq!(VcsType::from_str_loose("GIT"), Some(VcsType::Git));
        assert_eq!(VcsType::from_str_loose("hg"), Some(VcsType::Mercurial));
        assert_eq!(VcsType::from_str_loose("svn"), Some(VcsType::Subversion));
        assert_eq!(VcsType::from_str_loose(""), Some(VcsType::Unknown));
        assert_eq!(VcsType::from_str_loose("cvs"), None);
    }

    #[test]
    fn vcs_type_display() {
        assert_eq!(VcsType::Git.to_string(), "git");
        assert_eq!(VcsType::Subversion.to_string(), "subversion");
    }

    #[test]
    fn repository_equality_ignores_requested_revision() {
        // 동일한 확정 리비전을 가리키는 서로 다른 요청 리비전
        let main = repository("main", "0123abcd");
        let tag = repository("v1.0.0", "0123abcd");
        assert_eq!(main, tag);

        let other = repository("main", "ffffffff");
        assert_ne!(main, other);
    }

    #[test]
    fn repository_ordering_consistent_with_equality() {
        let main = repository("main", "0123abcd");
        let tag = repository("v1.0.0", "0123abcd");
        assert_eq!(main.cmp(&tag), Ordering::Equal);
    }

    #[test]
    fn known_provenance_equal_repositories_collapse_in_set() {
        let mut set = BTreeSet::new();
        set.insert(KnownProvenance::Repository(repository("main", "0123abcd")));
        set.insert(KnownProvenance::Repository(repository("v1.0.0", "0123abcd")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn artifact_storage_key_with_and_without_hash() {
        let with_hash = KnownProvenance::Artifact(ArtifactProvenance::new(
            "https://example.org/a.zip",
            Some("deadbeef".to_owned()),
        ));
        assert_eq!(
            with_hash.storage_key(),
            "artifact:https://example.org/a.zip|deadbeef"
        );

        let without_hash =
            KnownProvenance::Artifact(ArtifactProvenance::new("https://example.org/a.zip", None));
        assert_eq!(
            without_hash.storage_key(),
            "artifact:https://example.org/a.zip|"
        );
    }

    #[test]
    fn repository_storage_key_format() {
        let known = KnownProvenance::Repository(RepositoryProvenance {
            vcs_type: VcsType::Git,
            url: "https://example.org/repo.git".to_owned(),
            revision: "main".to_owned(),
            path: "sub/dir".to_owned(),
            resolved_revision: "0123abcd".to_owned(),
        });
        assert_eq!(
            known.storage_key(),
            "vcs:git|https://example.org/repo.git|0123abcd|sub/dir"
        );
    }

    #[test]
    fn provenance_to_known() {
        let artifact = Provenance::Artifact(ArtifactProvenance::new("url", None));
        assert!(artifact.is_known());
        assert!(artifact.to_known().is_some());

        assert!(!Provenance::Unknown.is_known());
        assert!(Provenance::Unknown.to_known().is_none());
    }

    #[test]
    fn nested_provenance_accepts_normal_form_paths() {
        let root = KnownProvenance::Repository(repository("main", "0123abcd"));
        let sub = KnownProvenance::Artifact(ArtifactProvenance::new("https://example.org/s.zip", None));

        let mut subs = BTreeMap::new();
        subs.insert("vendor/lib".to_owned(), sub.clone());
        let nested = NestedProvenance::new(root.clone(), subs).unwrap();

        assert_eq!(nested.root(), &root);
        assert_eq!(nested.sub_repositories().len(), 1);
        assert!(nested.contains(&sub));
        assert_eq!(nested.all_provenances().len(), 2);
    }

    #[test]
    fn nested_provenance_rejects_root_key() {
        let root = KnownProvenance::Repository(repository("main", "0123abcd"));
        let mut subs = BTreeMap::new();
        subs.insert(String::new(), root.clone());
        assert!(NestedProvenance::new(root, subs).is_err());
    }

    #[test]
    fn nested_provenance_rejects_non_normal_paths() {
        let root = KnownProvenance::Repository(repository("main", "0123abcd"));
        let sub = KnownProvenance::Artifact(ArtifactProvenance::new("url", None));

        for bad in ["/abs", "dir/", "./dir", "a/../b", "a//b"] {
            let mut subs = BTreeMap::new();
            subs.insert(bad.to_owned(), sub.clone());
            let err = NestedProvenance::new(root.clone(), subs).unwrap_err();
            assert!(
                matches!(err, ResolutionError::InvalidSubRepositoryPath { .. }),
                "path '{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn nested_provenance_root_only_has_single_provenance() {
        let root = KnownProvenance::Artifact(ArtifactProvenance::new("url", None));
        let nested = NestedProvenance::root_only(root.clone());
        assert_eq!(nested.all_provenances().len(), 1);
        assert!(nested.contains(&root));
    }

    #[test]
    fn provenance_serialize_roundtrip() {
        let provenance = Provenance::Repository(repository("main", "0123abcd"));
        let json = serde_json::to_string(&provenance).unwrap();
        let deserialized: Provenance = serde_json::from_str(&json).unwrap();
        assert_eq!(provenance, deserialized);
    }

    #[test]
    fn nested_provenance_serialize_roundtrip() {
        let root = KnownProvenance::Repository(repository("main", "0123abcd"));
        let mut subs = BTreeMap::new();
        subs.insert(
            "vendor/lib".to_owned(),
            KnownProvenance::Artifact(ArtifactProvenance::new("url", None)),
        );
        let nested = NestedProvenance::new(root, subs).unwrap();

        let json = serde_json::to_string(&nested).unwrap();
        let deserialized: NestedProvenance = serde_json::from_str(&json).unwrap();
        assert_eq!(nested, deserialized);
    }
}
