//! 패키지 모델 — 스캔 대상 패키지 입력 타입
//!
//! [`Package`]는 스캔 파이프라인에 대한 입력 전용 타입입니다.
//! 분석 단계가 생산한 소스 아티팩트 서술자와 가공된 VCS 서술자를
//! 담으며, 출처 해석기가 우선순위 목록([`SourceCodeOrigin`])에 따라
//! 이 서술자들을 구체적 출처로 변환합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provenance::VcsType;

/// 소스 코드 기원 종류
///
/// 출처 해석의 우선순위 목록 원소입니다. 기본 순서는
/// `[Vcs, Artifact]`입니다.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SourceCodeOrigin {
    /// 버전 관리 저장소
    Vcs,
    /// 소스 아카이브
    Artifact,
}

impl SourceCodeOrigin {
    /// 문자열에서 기원 종류를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vcs" => Some(Self::Vcs),
            "artifact" => Some(Self::Artifact),
            _ => None,
        }
    }

    /// 기본 우선순위 목록을 반환합니다.
    pub fn default_priority() -> Vec<Self> {
        vec![Self::Vcs, Self::Artifact]
    }
}

impl fmt::Display for SourceCodeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vcs => write!(f, "vcs"),
            Self::Artifact => write!(f, "artifact"),
        }
    }
}

/// 소스 아카이브 서술자
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArtifact {
    /// 아카이브 URL
    pub url: String,
    /// 콘텐츠 해시 (있을 경우)
    pub hash: Option<String>,
}

impl SourceArtifact {
    /// 새 서술자를 생성합니다.
    pub fn new(url: impl Into<String>, hash: Option<String>) -> Self {
        Self {
            url: url.into(),
            hash,
        }
    }

    /// 서술자가 비어 있는지 여부 (URL 기준)
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// 가공된 VCS 서술자
///
/// 분석 단계가 정규화한 저장소 정보입니다. 리비전이 이미 불변
/// 리비전으로 확정된 경우 `resolved_revision`에 담깁니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    /// VCS 종류
    pub vcs_type: VcsType,
    /// 저장소 URL
    pub url: String,
    /// 요청 리비전 (브랜치, 태그, 커밋 등)
    pub revision: String,
    /// 저장소 내 경로 ("" = 저장소 루트)
    pub path: String,
    /// 확정된 불변 리비전 (이미 해석된 경우)
    pub resolved_revision: Option<String>,
}

impl VcsInfo {
    /// 서술자가 비어 있는지 여부 (URL 기준)
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// 스캔 대상 패키지
///
/// 파이프라인에 대한 입력 전용이며 실행 중 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// 패키지 식별자 (예: `"crate:serde:1.0.210"`)
    pub id: String,
    /// 소스 아티팩트 서술자 (있을 경우)
    pub source_artifact: Option<SourceArtifact>,
    /// 가공된 VCS 서술자 (있을 경우)
    pub vcs: Option<VcsInfo>,
}

impl Package {
    /// 서술자 없는 패키지를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_artifact: None,
            vcs: None,
        }
    }

    /// 소스 아티팩트 서술자를 설정합니다.
    pub fn with_source_artifact(mut self, artifact: SourceArtifact) -> Self {
        self.source_artifact = Some(artifact);
        self
    }

    /// VCS 서술자를 설정합니다.
    pub fn with_vcs(mut self, vcs: VcsInfo) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// 주어진 기원 종류에 대한 서술자가 비어 있지 않은지 확인합니다.
    pub fn has_origin(&self, origin: SourceCodeOrigin) -> bool {
        match origin {
            SourceCodeOrigin::Artifact => {
                self.source_artifact.as_ref().is_some_and(|a| !a.is_empty())
            }
            SourceCodeOrigin::Vcs => self.vcs.as_ref().is_some_and(|v| !v.is_empty()),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
