//! Container runtime abstraction for testability.
//!
//! The [`ContainerRuntime`] trait abstracts the Docker-compatible runtime API
//! (Podman's compat socket in production), allowing the watcher to use
//! [`BollardRuntime`] while tests feed a scripted event stream through
//! `MockRuntime`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ NetnsWatcher │
//! └──────┬───────┘
//!        │ events() / inspect_container()
//!        ▼
//! ┌──────────────────┐
//! │ ContainerRuntime │ (trait)
//! └──────────────────┘
//!      │         │
//!      ▼         ▼
//! ┌─────────┐ ┌──────┐
//! │ Bollard │ │ Mock │
//! └────┬────┘ └──────┘
//!      │
//!      ▼
//! Podman / Docker daemon
//! ```
//!
//! # Error Classification
//!
//! - HTTP 404 on inspect: [`RuntimeError::NotFound`] (container already removed)
//! - Other inspect failures: [`RuntimeError::Inspection`]
//! - Undecodable event: [`RuntimeError::Decode`] (the stream keeps going)
//! - Transport failure on the event stream: [`RuntimeError::Stream`] (fatal)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::debug;

use nsattach_core::error::RuntimeError;
use nsattach_core::types::{ContainerHandle, EventRecord};

/// Request timeout passed to bollard, in seconds.
///
/// Applies to establishing each response; the event stream body itself
/// stays open indefinitely.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Lifecycle events decoded from the runtime, in delivery order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord, RuntimeError>> + Send>>;

/// Validates a container ID before it reaches the runtime API.
///
/// Docker and Podman container IDs are 64-character hex strings (or shorter
/// prefixes). Anything else in an event's actor ID is treated as malformed.
fn validate_container_id(id: &str) -> Result<(), RuntimeError> {
    if id.is_empty() || id.len() > 64 {
        return Err(RuntimeError::Inspection {
            container_id: id.to_owned(),
            reason: format!("invalid container ID: length {} (must be 1-64)", id.len()),
        });
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RuntimeError::Inspection {
            container_id: id.to_owned(),
            reason: "invalid container ID: contains non-hex characters".to_owned(),
        });
    }
    Ok(())
}

/// Trait abstracting the container runtime operations the watcher needs.
///
/// The trait is `Send + Sync + 'static`, allowing the runtime to be shared
/// behind an `Arc`.
///
/// # Implementations
///
/// - [`BollardRuntime`]: Production implementation using the `bollard` library
/// - `MockRuntime`: Test implementation with a scripted event stream (tests only)
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Subscribes to the runtime's lifecycle event stream.
    ///
    /// The stream is infinite and not restartable. Items are yielded in the
    /// order the runtime delivers them. A stream that ends is a failure of
    /// the runtime connection.
    fn events(&self) -> EventStream;

    /// Inspects a container and resolves its main process id.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::NotFound`: Container no longer exists (404)
    /// - `RuntimeError::Inspection`: Invalid ID or any other API error
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerHandle, RuntimeError>> + Send;

    /// Checks runtime connectivity.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Connection` if the runtime is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), RuntimeError>> + Send;
}

/// Production runtime client using `bollard` over a Unix socket.
///
/// Works against Docker and against Podman's Docker-compatible API.
///
/// # Examples
///
/// ```ignore
/// use nsattach_watcher::BollardRuntime;
///
/// let runtime = BollardRuntime::connect("unix:///run/podman/podman.sock").await?;
/// # Ok::<(), nsattach_core::RuntimeError>(())
/// ```
pub struct BollardRuntime {
    docker: Arc<bollard::Docker>,
}

impl BollardRuntime {
    /// Connects to the runtime socket and verifies the connection with a ping.
    ///
    /// Accepts both `unix:///path` and plain `/path` endpoints. bollard
    /// connects lazily, so the ping is what surfaces a missing socket or a
    /// daemon that is not running.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Connection` if the client cannot be created or
    /// the runtime does not answer.
    pub async fn connect(endpoint: &str) -> Result<Self, RuntimeError> {
        let socket_path = endpoint.strip_prefix("unix://").unwrap_or(endpoint);
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            CLIENT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            RuntimeError::Connection(format!("failed to connect to runtime at {endpoint}: {e}"))
        })?;

        let runtime = Self {
            docker: Arc::new(docker),
        };
        runtime.ping().await?;
        debug!(endpoint, "connected to container runtime");
        Ok(runtime)
    }
}

impl ContainerRuntime for BollardRuntime {
    fn events(&self) -> EventStream {
        use bollard::system::EventsOptions;

        let stream = self
            .docker
            .events(None::<EventsOptions<String>>)
            .map(|item| match item {
                Ok(message) => Ok(event_record_from(message)),
                Err(e) => Err(classify_stream_error(e)),
            });
        Box::pin(stream)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerHandle, RuntimeError> {
        use bollard::container::InspectContainerOptions;

        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => RuntimeError::NotFound(id.to_owned()),
                other => RuntimeError::Inspection {
                    container_id: id.to_owned(),
                    reason: other.to_string(),
                },
            })?;

        let name = details
            .name
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let pid = details
            .state
            .and_then(|s| s.pid)
            .and_then(|pid| u32::try_from(pid).ok());

        Ok(ContainerHandle {
            id: details.id.unwrap_or_else(|| id.to_owned()),
            name,
            pid,
        })
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// Converts a bollard event message into an [`EventRecord`].
///
/// Missing fields become empty strings so the filter simply does not match.
fn event_record_from(message: bollard::models::EventMessage) -> EventRecord {
    let kind = message.typ.map(|t| t.to_string()).unwrap_or_default();
    let action = message.action.unwrap_or_default();
    let (actor_id, attributes) = message
        .actor
        .map(|actor| {
            (
                actor.id.unwrap_or_default(),
                actor.attributes.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    EventRecord {
        kind,
        action,
        actor_id,
        attributes,
    }
}

/// Splits event stream errors into per-event decode errors and fatal
/// transport errors.
fn classify_stream_error(err: bollard::errors::Error) -> RuntimeError {
    use bollard::errors::Error;

    match err {
        Error::JsonDataError { message, .. } => RuntimeError::Decode(message),
        Error::JsonSerdeError { err } => RuntimeError::Decode(err.to_string()),
        other => RuntimeError::Stream(other.to_string()),
    }
}

/// 테스트용 Mock 런타임
///
/// 미리 준비한 이벤트를 순서대로 내보낸 뒤 스트림을 닫고,
/// inspect 호출을 기록합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockRuntime {
    /// events() 호출 시 내보낼 항목 (한 번만 구독 가능)
    events: std::sync::Mutex<Option<Vec<Result<EventRecord, RuntimeError>>>>,
    /// inspect 결과로 돌려줄 컨테이너 목록
    containers: Vec<ContainerHandle>,
    /// NotFound 외의 inspect 실패를 시뮬레이션할 컨테이너 ID
    failing_inspections: Vec<String>,
    /// inspect가 호출된 컨테이너 ID 기록
    inspected: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockRuntime {
    /// 빈 mock 런타임을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스트림으로 내보낼 이벤트를 설정합니다.
    pub fn with_events(self, events: Vec<EventRecord>) -> Self {
        self.with_stream_items(events.into_iter().map(Ok).collect())
    }

    /// 에러를 포함한 스트림 항목을 그대로 설정합니다.
    pub fn with_stream_items(self, items: Vec<Result<EventRecord, RuntimeError>>) -> Self {
        *self.events.lock().unwrap() = Some(items);
        self
    }

    /// inspect 가능한 컨테이너를 추가합니다.
    pub fn with_container(mut self, id: &str, name: &str, pid: Option<u32>) -> Self {
        self.containers.push(ContainerHandle {
            id: id.to_owned(),
            name: name.to_owned(),
            pid,
        });
        self
    }

    /// 해당 컨테이너의 inspect가 NotFound 이외의 에러로 실패하도록 설정합니다.
    pub fn with_failing_inspection(mut self, id: &str) -> Self {
        self.failing_inspections.push(id.to_owned());
        self
    }

    /// 지금까지 inspect된 컨테이너 ID 목록을 반환합니다.
    pub fn inspected(&self) -> Vec<String> {
        self.inspected.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ContainerRuntime for MockRuntime {
    fn events(&self) -> EventStream {
        let items = self.events.lock().unwrap().take().unwrap_or_default();
        Box::pin(futures::stream::iter(items))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerHandle, RuntimeError> {
        self.inspected.lock().unwrap().push(id.to_owned());

        if self.failing_inspections.iter().any(|f| f == id) {
            return Err(RuntimeError::Inspection {
                container_id: id.to_owned(),
                reason: "mock failure".to_owned(),
            });
        }

        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}
