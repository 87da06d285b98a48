//! nsattach 공통 크레이트
//!
//! 워처와 데몬이 함께 사용하는 에러, 설정, 도메인 타입, 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AttachError, ConfigError, NsattachError, RuntimeError};

// 설정
pub use config::{GeneralConfig, MetricsConfig, NsattachConfig, WatcherConfig};

// 도메인 타입
pub use types::{AttachOutcome, ContainerHandle, EventRecord, short_id};
