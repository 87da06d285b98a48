//! 에러 타입 -- 도메인별 에러 정의
//!
//! 워치 루프는 [`RuntimeError::is_fatal`]로 스트림 에러를 분류하여
//! 프로세스를 종료할지, 해당 이벤트만 버리고 계속할지 결정합니다.

use std::time::Duration;

/// nsattach 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NsattachError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 런타임(Podman/Docker 호환 API) 에러
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// 런타임 소켓 연결 실패
    #[error("runtime connection error: {0}")]
    Connection(String),

    /// 이벤트 스트림 전송 계층 실패
    #[error("event stream failed: {0}")]
    Stream(String),

    /// 이벤트 스트림이 예기치 않게 종료됨
    #[error("event stream closed by runtime")]
    StreamClosed,

    /// 이벤트 하나를 디코딩하지 못함 (스트림 자체는 유효)
    #[error("failed to decode event: {0}")]
    Decode(String),

    /// 컨테이너를 찾을 수 없음 (이벤트 수신과 inspect 사이에 제거됨)
    #[error("container not found: {0}")]
    NotFound(String),

    /// 그 밖의 inspect 실패
    #[error("inspect container '{container_id}' failed: {reason}")]
    Inspection {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },
}

impl RuntimeError {
    /// 워치 루프를 중단해야 하는 에러인지 반환합니다.
    ///
    /// 연결 실패와 스트림 실패/종료만 치명적입니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Stream(_) | Self::StreamClosed
        )
    }
}

/// 네트워크 인터페이스 네임스페이스 이동 실패
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// 명령이 실행되었으나 0이 아닌 상태로 종료됨
    #[error("moving '{interface}' into netns of pid {pid} failed ({status}): {stderr}")]
    ExecutionFailed {
        /// 이동할 인터페이스
        interface: String,
        /// 대상 프로세스
        pid: u32,
        /// 종료 코드 또는 시그널 설명
        status: String,
        /// 명령의 stderr (trim 됨)
        stderr: String,
    },

    /// 실행 파일을 찾을 수 없음
    #[error("command not found: {program}")]
    CommandNotFound {
        /// 실행하려던 프로그램
        program: String,
    },

    /// 프로세스 생성 실패 (권한 등)
    #[error("failed to spawn '{program}': {reason}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 명령이 제한 시간 내에 끝나지 않음
    #[error("moving '{interface}' into netns of pid {pid} timed out after {timeout:?}")]
    Timeout {
        /// 이동할 인터페이스
        interface: String,
        /// 대상 프로세스
        pid: u32,
        /// 적용된 타임아웃
        timeout: Duration,
    },
}

impl AttachError {
    /// 메트릭/로그 태그용 고정된 실패 유형명을 반환합니다.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::CommandNotFound { .. } => "command_not_found",
            Self::Spawn { .. } => "spawn_failed",
            Self::Timeout { .. } => "timeout",
        }
    }
}
