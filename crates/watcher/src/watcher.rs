//! 워치 루프 -- 이벤트 수신/필터링/PID 조회/인터페이스 이동 전체 흐름 관리
//!
//! [`NetnsWatcher`]는 런타임 이벤트 스트림을 한 번에 하나씩, 수신한 순서대로
//! 처리합니다. 버퍼링, 중복 제거, 재정렬, 재시도는 하지 않습니다.
//!
//! # 상태 전이
//! ```text
//! Connecting ──> Watching ──(match)──> Matched ──> Resolving ──> Attaching
//!                   ^                                  |            |
//!                   └──────────────────────────────────┴────────────┘
//! ```
//!
//! 이벤트 하나의 실패(컨테이너 소멸, inspect 실패, attach 실패, 잘못된 이벤트)는
//! 로그만 남기고 `Watching`으로 돌아갑니다. 루프를 끝내는 것은
//! 스트림 자체의 치명적 실패뿐입니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use nsattach_core::config::WatcherConfig;
use nsattach_core::error::{ConfigError, NsattachError, RuntimeError};
use nsattach_core::metrics as m;
use nsattach_core::types::{EventRecord, short_id};

use crate::attach::Attacher;
use crate::filter::EventFilter;
use crate::runtime::ContainerRuntime;

/// 워치 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// 런타임 연결 전
    Connecting,
    /// 다음 이벤트 대기 중
    Watching,
    /// 대상 컨테이너 시작 이벤트 수신
    Matched,
    /// 컨테이너 PID 조회 중
    Resolving,
    /// 인터페이스 이동 중
    Attaching,
}

impl WatchState {
    /// 로그용 상태명을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Watching => "watching",
            Self::Matched => "matched",
            Self::Resolving => "resolving",
            Self::Attaching => "attaching",
        }
    }
}

/// 이벤트 하나를 처리한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 대상 컨테이너 시작 이벤트가 아님
    Ignored,
    /// 일치했지만 컨테이너 ID가 없는 등 처리할 수 없는 이벤트
    Malformed,
    /// inspect 전에 컨테이너가 사라졌거나 PID가 없음
    ContainerVanished,
    /// NotFound 이외의 inspect 실패
    InspectionFailed,
    /// 인터페이스 이동 성공
    Attached {
        /// 대상 프로세스
        pid: u32,
    },
    /// 인터페이스 이동 실패
    AttachFailed {
        /// 대상 프로세스
        pid: u32,
    },
}

/// 워치 루프 누적 통계
#[derive(Debug, Default)]
pub struct WatchStats {
    events_seen: AtomicU64,
    decode_errors: AtomicU64,
    target_starts: AtomicU64,
    vanished: AtomicU64,
    inspection_failures: AtomicU64,
    attached: AtomicU64,
    attach_failures: AtomicU64,
}

impl WatchStats {
    /// 수신한 이벤트 수
    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    /// 디코딩 실패 수
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// 대상 컨테이너 시작 이벤트 수
    pub fn target_starts(&self) -> u64 {
        self.target_starts.load(Ordering::Relaxed)
    }

    /// 사라진 컨테이너 수
    pub fn vanished(&self) -> u64 {
        self.vanished.load(Ordering::Relaxed)
    }

    /// inspect 실패 수
    pub fn inspection_failures(&self) -> u64 {
        self.inspection_failures.load(Ordering::Relaxed)
    }

    /// 성공한 인터페이스 이동 수
    pub fn attached(&self) -> u64 {
        self.attached.load(Ordering::Relaxed)
    }

    /// 실패한 인터페이스 이동 수
    pub fn attach_failures(&self) -> u64 {
        self.attach_failures.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Ignored | DispatchOutcome::Malformed => return,
            DispatchOutcome::ContainerVanished => &self.vanished,
            DispatchOutcome::InspectionFailed => &self.inspection_failures,
            DispatchOutcome::Attached { .. } => &self.attached,
            DispatchOutcome::AttachFailed { .. } => &self.attach_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 네트워크 인터페이스 attach 워처
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use nsattach_watcher::{BollardRuntime, IpCommandAttacher, NetnsWatcherBuilder};
///
/// let runtime = Arc::new(BollardRuntime::connect(&config.socket).await?);
/// let attacher = Arc::new(IpCommandAttacher::from_config(&config));
/// let mut watcher = NetnsWatcherBuilder::new()
///     .config(config)
///     .runtime(runtime)
///     .attacher(attacher)
///     .build()?;
///
/// // 치명적 스트림 에러가 발생할 때만 반환합니다.
/// let err = watcher.run().await.unwrap_err();
/// ```
pub struct NetnsWatcher<R: ContainerRuntime, A: Attacher> {
    /// 런타임 클라이언트 (워처가 독점)
    runtime: Arc<R>,
    /// 네임스페이스 이동 기능
    attacher: Arc<A>,
    /// 대상 이미지 필터
    filter: EventFilter,
    /// 이동할 인터페이스
    interface: String,
    /// 현재 상태
    state: WatchState,
    /// 누적 통계
    stats: Arc<WatchStats>,
}

impl<R: ContainerRuntime, A: Attacher> NetnsWatcher<R, A> {
    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// 누적 통계에 대한 Arc 참조를 반환합니다.
    pub fn stats(&self) -> Arc<WatchStats> {
        Arc::clone(&self.stats)
    }

    /// 대상 이미지 이름을 반환합니다.
    pub fn target_image(&self) -> &str {
        self.filter.target_image()
    }

    /// 이동할 인터페이스 이름을 반환합니다.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 이벤트 스트림을 구독하고 끝날 때까지 처리합니다.
    ///
    /// 정상적으로 반환하지 않습니다. 스트림이 치명적으로 실패하거나 닫히면
    /// 그 에러를 돌려주며, 이후 이벤트는 처리하지 않습니다.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        let mut events = self.runtime.events();
        self.transition(WatchState::Watching);

        info!(
            image = self.target_image(),
            interface = self.interface.as_str(),
            "waiting for a new container with the target image"
        );

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    self.dispatch(&event).await;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "container runtime event stream failed");
                    return Err(e);
                }
                Err(e) => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::EVENT_DECODE_ERRORS_TOTAL).increment(1);
                    error!(error = %e, "skipping event that could not be decoded");
                }
            }
        }

        error!("container runtime event stream ended");
        Err(RuntimeError::StreamClosed)
    }

    /// 이벤트 하나를 처리합니다.
    ///
    /// 어떤 실패도 호출자에게 전파하지 않고 결과로만 돌려줍니다.
    /// 처리 후 상태는 항상 `Watching`입니다.
    pub async fn dispatch(&mut self, event: &EventRecord) -> DispatchOutcome {
        self.stats.events_seen.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::EVENTS_TOTAL).increment(1);

        if !self.filter.matches(event) {
            return DispatchOutcome::Ignored;
        }

        self.transition(WatchState::Matched);
        self.stats.target_starts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::TARGET_STARTS_TOTAL).increment(1);

        let outcome = self.handle_target_start(event).await;
        self.stats.record(&outcome);
        self.transition(WatchState::Watching);
        outcome
    }

    /// Matched -> Resolving -> Attaching
    async fn handle_target_start(&mut self, event: &EventRecord) -> DispatchOutcome {
        let container_id = event.actor_id.as_str();
        if container_id.is_empty() {
            error!(
                image = event.image().unwrap_or_default(),
                "target start event carries no container id, skipping"
            );
            return DispatchOutcome::Malformed;
        }
        let short = short_id(container_id);

        debug!(
            container_id = short,
            image = event.image().unwrap_or_default(),
            container_name = event.name().unwrap_or_default(),
            "target container started"
        );

        self.transition(WatchState::Resolving);
        let container = match self.runtime.inspect_container(container_id).await {
            Ok(container) => container,
            Err(RuntimeError::NotFound(_)) => {
                metrics::counter!(m::CONTAINERS_VANISHED_TOTAL).increment(1);
                warn!(
                    container_id = short,
                    "could not find container {short}, it may have been removed"
                );
                return DispatchOutcome::ContainerVanished;
            }
            Err(e) => {
                metrics::counter!(m::INSPECTION_ERRORS_TOTAL).increment(1);
                error!(
                    container_id = short,
                    error = %e,
                    "an error occurred while inspecting the container"
                );
                return DispatchOutcome::InspectionFailed;
            }
        };

        let Some(pid) = container.live_pid() else {
            metrics::counter!(m::CONTAINERS_VANISHED_TOTAL).increment(1);
            warn!(
                container_id = short,
                container_name = container.name.as_str(),
                "container {short} has no running process, it may have exited"
            );
            return DispatchOutcome::ContainerVanished;
        };

        info!(
            container_id = short,
            container_name = container.name.as_str(),
            pid,
            "found target container {} with pid {pid}",
            container.name
        );

        self.transition(WatchState::Attaching);
        let started = Instant::now();
        let result = self.attacher.attach(&self.interface, pid).await;
        metrics::histogram!(m::ATTACH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::counter!(m::ATTACH_TOTAL, m::LABEL_RESULT => "success").increment(1);
                info!(
                    container_id = short,
                    pid,
                    interface = self.interface.as_str(),
                    "moved interface into container network namespace"
                );
                DispatchOutcome::Attached { pid }
            }
            Err(e) => {
                metrics::counter!(
                    m::ATTACH_TOTAL,
                    m::LABEL_RESULT => "failure",
                    m::LABEL_REASON => e.kind_name()
                )
                .increment(1);
                error!(
                    container_id = short,
                    container_name = container.name.as_str(),
                    pid,
                    interface = self.interface.as_str(),
                    reason = e.kind_name(),
                    error = %e,
                    "failed to move interface into container network namespace"
                );
                DispatchOutcome::AttachFailed { pid }
            }
        }
    }

    fn transition(&mut self, next: WatchState) {
        if self.state != next {
            debug!(from = self.state.name(), to = next.name(), "watch state");
            self.state = next;
        }
    }
}

/// 워처 빌더
pub struct NetnsWatcherBuilder<R: ContainerRuntime, A: Attacher> {
    config: WatcherConfig,
    runtime: Option<Arc<R>>,
    attacher: Option<Arc<A>>,
}

impl<R: ContainerRuntime, A: Attacher> NetnsWatcherBuilder<R, A> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: WatcherConfig::default(),
            runtime: None,
            attacher: None,
        }
    }

    /// 감시 설정을 지정합니다.
    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// 연결된 런타임 클라이언트를 설정합니다.
    pub fn runtime(mut self, runtime: Arc<R>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// 네임스페이스 이동 기능을 설정합니다.
    pub fn attacher(mut self, attacher: Arc<A>) -> Self {
        self.attacher = Some(attacher);
        self
    }

    /// 워처를 빌드합니다.
    pub fn build(self) -> Result<NetnsWatcher<R, A>, NsattachError> {
        self.config.validate()?;

        let runtime = self.runtime.ok_or_else(|| ConfigError::InvalidValue {
            field: "runtime".to_owned(),
            reason: "container runtime client must be provided".to_owned(),
        })?;
        let attacher = self.attacher.ok_or_else(|| ConfigError::InvalidValue {
            field: "attacher".to_owned(),
            reason: "attacher must be provided".to_owned(),
        })?;

        Ok(NetnsWatcher {
            runtime,
            attacher,
            filter: EventFilter::new(&self.config.image),
            interface: self.config.interface,
            state: WatchState::Connecting,
            stats: Arc::new(WatchStats::default()),
        })
    }
}

impl<R: ContainerRuntime, A: Attacher> Default for NetnsWatcherBuilder<R, A> {
    fn default() -> Self {
        Self::new()
    }
}
