//! 중첩 출처 해석기 — 출처를 서브 저장소 트리로 전개
//!
//! [`NestedProvenanceResolver`]는 확인된 출처를 루트와 서브 저장소의
//! 트리([`NestedProvenance`])로 전개합니다. 아티팩트와 서브 모듈 선언이
//! 없는 저장소는 자명하게 루트 전용 트리가 됩니다. 해석은 (출처, 해당
//! 리비전의 서브 모듈 선언) 쌍에 대해 멱등적이고 순수합니다.

use std::collections::BTreeMap;
use std::sync::Mutex;

use provost_core::backend::BoxFuture;
use provost_core::error::ResolutionError;
use provost_core::provenance::{KnownProvenance, NestedProvenance};

/// 중첩 출처 해석기
pub trait NestedProvenanceResolver: Send + Sync {
    /// 출처를 중첩 출처 트리로 전개합니다.
    fn resolve(
        &self,
        provenance: &KnownProvenance,
    ) -> impl std::future::Future<Output = Result<NestedProvenance, ResolutionError>> + Send;
}

/// dyn-compatible 중첩 출처 해석기 trait
pub trait DynNestedProvenanceResolver: Send + Sync {
    /// 출처를 중첩 출처 트리로 전개합니다.
    fn resolve<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
    ) -> BoxFuture<'a, Result<NestedProvenance, ResolutionError>>;
}

impl<T: NestedProvenanceResolver> DynNestedProvenanceResolver for T {
    fn resolve<'a>(
        &'a self,
        provenance: &'a KnownProvenance,
    ) -> BoxFuture<'a, Result<NestedProvenance, ResolutionError>> {
        Box::pin(NestedProvenanceResolver::resolve(self, provenance))
    }
}

/// 서브 모듈을 열거하지 않는 기본 해석기
///
/// 모든 출처를 루트 전용 트리로 전개합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNestedProvenanceResolver;

impl NestedProvenanceResolver for DefaultNestedProvenanceResolver {
    async fn resolve(
        &self,
        provenance: &KnownProvenance,
    ) -> Result<NestedProvenance, ResolutionError> {
        Ok(NestedProvenance::root_only(provenance.clone()))
    }
}

/// 선언된 서브 저장소 테이블에서 서비스하는 해석기
///
/// 분석 단계가 이미 서브 모듈을 열거한 입력이나 테스트에
/// 사용됩니다. 등록되지 않은 출처는 루트 전용 트리로 전개됩니다.
#[derive(Debug, Default)]
pub struct StaticNestedProvenanceResolver {
    table: Mutex<BTreeMap<KnownProvenance, BTreeMap<String, KnownProvenance>>>,
}

impl StaticNestedProvenanceResolver {
    /// 빈 테이블을 가진 해석기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 루트 출처에 서브 저장소 하나를 선언합니다.
    ///
    /// # Errors
    ///
    /// 경로가 정규형이 아니면 `ResolutionError::InvalidSubRepositoryPath`를
    /// 반환합니다. 검증은 등록 시점에 한 번 수행됩니다.
    pub fn declare(
        &self,
        root: KnownProvenance,
        path: impl Into<String>,
        sub: KnownProvenance,
    ) -> Result<(), ResolutionError> {
        let path = path.into();
        let mut table = self.table.lock().expect("sub-repository table poisoned");
        let mut subs = table.get(&root).cloned().unwrap_or_default();
        subs.insert(path, sub);
        // NestedProvenance 생성자가 경로 정규형을 검증한다
        NestedProvenance::new(root.clone(), subs.clone())?;
        table.insert(root, subs);
        Ok(())
    }
}

impl NestedProvenanceResolver for StaticNestedProvenanceResolver {
    async fn resolve(
        &self,
        provenance: &KnownProvenance,
    ) -> Result<NestedProvenance, ResolutionError> {
        let subs = self
            .table
            .lock()
            .expect("sub-repository table poisoned")
            .get(provenance)
            .cloned()
            .unwrap_or_default();
        NestedProvenance::new(provenance.clone(), subs)
    }
}
