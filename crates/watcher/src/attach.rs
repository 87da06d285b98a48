//! 인터페이스 attach -- 호스트 네트워크 인터페이스를 컨테이너 네임스페이스로 이동
//!
//! [`Attacher`]는 "인터페이스 X를 프로세스 P의 네트워크 네임스페이스로 이동"하는
//! 기능을 추상화합니다. [`IpCommandAttacher`]는 `ip link set X netns P`를
//! 셸 없이 직접 실행합니다.
//!
//! OS 수준에서 멱등이 아닙니다. 이미 이동된 인터페이스에 다시 실행하면
//! [`AttachError::ExecutionFailed`]로 실패하므로 호출자는 재시도하지 않습니다.

use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use nsattach_core::config::WatcherConfig;
use nsattach_core::error::AttachError;
use nsattach_core::types::AttachOutcome;

/// 네임스페이스 이동 기능
pub trait Attacher: Send + Sync + 'static {
    /// `interface`를 `pid` 프로세스의 네트워크 네임스페이스로 이동합니다.
    ///
    /// 결과 네임스페이스 상태를 다시 확인하지 않습니다.
    fn attach(&self, interface: &str, pid: u32) -> impl Future<Output = AttachOutcome> + Send;
}

/// `ip link set <interface> netns <pid>`를 실행하는 attacher
#[derive(Debug, Clone)]
pub struct IpCommandAttacher {
    /// `ip` 실행 파일
    program: String,
    /// 명령 타임아웃
    timeout: Duration,
}

impl IpCommandAttacher {
    /// 새 attacher를 생성합니다.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// 감시 설정에서 attacher를 생성합니다.
    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(
            config.ip_command.clone(),
            Duration::from_secs(config.attach_timeout_secs),
        )
    }

    /// 실행할 명령줄을 로그용 문자열로 반환합니다.
    pub fn command_line(&self, interface: &str, pid: u32) -> String {
        format!("{} {}", self.program, command_args(interface, pid).join(" "))
    }
}

impl Attacher for IpCommandAttacher {
    async fn attach(&self, interface: &str, pid: u32) -> AttachOutcome {
        debug!(
            command = self.command_line(interface, pid).as_str(),
            "running interface move command"
        );

        let mut command = Command::new(&self.program);
        command
            .args(command_args(interface, pid))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AttachError::CommandNotFound {
                    program: self.program.clone(),
                });
            }
            Ok(Err(e)) => {
                return Err(AttachError::Spawn {
                    program: self.program.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_elapsed) => {
                return Err(AttachError::Timeout {
                    interface: interface.to_owned(),
                    pid,
                    timeout: self.timeout,
                });
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(AttachError::ExecutionFailed {
                interface: interface.to_owned(),
                pid,
                status: describe_status(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

fn command_args(interface: &str, pid: u32) -> [String; 5] {
    [
        "link".to_owned(),
        "set".to_owned(),
        interface.to_owned(),
        "netns".to_owned(),
        pid.to_string(),
    ]
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}

/// 테스트용 attacher -- 호출을 기록하고 설정된 결과를 돌려줍니다.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingAttacher {
    /// (interface, pid) 호출 기록
    calls: std::sync::Mutex<Vec<(String, u32)>>,
    /// true면 ExecutionFailed로 실패
    fail: bool,
}

#[cfg(test)]
impl RecordingAttacher {
    /// 항상 성공하는 attacher를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 항상 실패하도록 설정합니다.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 지금까지의 호출 기록을 반환합니다.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Attacher for RecordingAttacher {
    async fn attach(&self, interface: &str, pid: u32) -> AttachOutcome {
        self.calls.lock().unwrap().push((interface.to_owned(), pid));
        if self.fail {
            return Err(AttachError::ExecutionFailed {
                interface: interface.to_owned(),
                pid,
                status: "exit code 2".to_owned(),
                stderr: "RTNETLINK answers: Invalid argument".to_owned(),
            });
        }
        Ok(())
    }
}
