//! nsattach 워처 -- 컨테이너 시작 이벤트 감시 및 네트워크 인터페이스 이동
//!
//! 지정한 이미지로 컨테이너가 시작되면 그 프로세스의 네트워크 네임스페이스로
//! 호스트 인터페이스를 옮깁니다.
//!
//! # 모듈 구조
//!
//! - [`runtime`]: 컨테이너 런타임 추상화 (`ContainerRuntime` 트레이트, `BollardRuntime`)
//! - [`filter`]: 대상 이미지 시작 이벤트 판별 (`EventFilter`, `is_target_start`)
//! - [`attach`]: 인터페이스 이동 (`Attacher` 트레이트, `IpCommandAttacher`)
//! - [`watcher`]: 워치 루프 (`NetnsWatcher`, `NetnsWatcherBuilder`)
//!
//! # 아키텍처
//!
//! ```text
//! ContainerRuntime.events() --stream--> NetnsWatcher
//!                                           |
//!                                      EventFilter.matches()
//!                                           |
//!                                      ContainerRuntime.inspect_container()
//!                                           |
//!                                      Attacher.attach(interface, pid)
//! ```

pub mod attach;
pub mod filter;
pub mod runtime;
pub mod watcher;

// --- 주요 타입 re-export ---

// 워처
pub use watcher::{DispatchOutcome, NetnsWatcher, NetnsWatcherBuilder, WatchState, WatchStats};

// 런타임
pub use runtime::{BollardRuntime, ContainerRuntime, EventStream};

// 필터
pub use filter::{EventFilter, is_target_start};

// attach
pub use attach::{Attacher, IpCommandAttacher};
