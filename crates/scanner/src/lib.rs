#![doc = include_str!("../README.md")]

pub mod nested;
pub mod orchestrator;
pub mod resolver;
pub mod splitter;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 오케스트레이터
pub use orchestrator::{ScanOrchestrator, ScanOrchestratorBuilder};

// 출처 해석기
pub use resolver::{
    DefaultPackageProvenanceResolver, DynPackageProvenanceResolver, PackageProvenanceResolver,
};

// 중첩 출처 해석기
pub use nested::{
    DefaultNestedProvenanceResolver, DynNestedProvenanceResolver, NestedProvenanceResolver,
    StaticNestedProvenanceResolver,
};

// 결과 분할기
pub use splitter::split_nested_result;
