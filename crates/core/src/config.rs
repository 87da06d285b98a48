//! 설정 관리 -- nsattach.toml 파싱 및 런타임 설정
//!
//! [`NsattachConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//! 프로세스 시작 시 한 번 만들어지고 이후 변경되지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FMA_IMAGE`, `FMA_NETIF`, `PODMAN_SOCKET`, `NSATTACH_*`)
//! 3. 설정 파일 (`nsattach.toml`, 선택)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), nsattach_core::error::NsattachError> {
//! use nsattach_core::config::NsattachConfig;
//!
//! let mut config = NsattachConfig::from_file("nsattach.toml").await?;
//! config.apply_env_overrides();
//! // CLI 오버라이드는 여기서 적용
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, NsattachError};

/// 기본 런타임 엔드포인트 (Podman의 Docker 호환 소켓)
pub const DEFAULT_RUNTIME_SOCKET: &str = "unix:///run/podman/podman.sock";

/// 대상 이미지 이름 환경변수
pub const ENV_IMAGE: &str = "FMA_IMAGE";
/// 이동할 인터페이스 환경변수
pub const ENV_INTERFACE: &str = "FMA_NETIF";
/// 런타임 소켓 환경변수
pub const ENV_SOCKET: &str = "PODMAN_SOCKET";

/// 리눅스 인터페이스 이름 최대 길이 (IFNAMSIZ - 1)
const MAX_INTERFACE_NAME_LEN: usize = 15;
const MAX_ATTACH_TIMEOUT_SECS: u64 = 300;

/// nsattach 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NsattachConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 이벤트 감시 및 attach 설정
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NsattachConfig {
    /// TOML 파일에서 설정을 읽습니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 필수 값(이미지, 인터페이스)은 환경변수로 채워질 수 있으므로
    /// 여기서는 검증하지 않습니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NsattachError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NsattachError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                NsattachError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, NsattachError> {
        toml::from_str(toml_str).map_err(|e| {
            NsattachError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "NSATTACH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "NSATTACH_GENERAL_LOG_FORMAT");

        // Watcher
        override_string(&mut self.watcher.image, ENV_IMAGE);
        override_string(&mut self.watcher.interface, ENV_INTERFACE);
        override_string(&mut self.watcher.socket, ENV_SOCKET);
        override_string(&mut self.watcher.ip_command, "NSATTACH_IP_COMMAND");
        override_u64(
            &mut self.watcher.attach_timeout_secs,
            "NSATTACH_ATTACH_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "NSATTACH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "NSATTACH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "NSATTACH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NsattachError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.watcher.validate()?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 이벤트 감시 및 인터페이스 attach 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// 대상 이미지 이름 (태그 제외, 예: `myapp`)
    pub image: String,
    /// 컨테이너로 이동할 호스트 인터페이스 이름
    pub interface: String,
    /// 런타임 API 엔드포인트 (`unix://` 접두어 허용)
    pub socket: String,
    /// `ip` 실행 파일 경로
    pub ip_command: String,
    /// attach 명령 타임아웃 (초)
    pub attach_timeout_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            interface: String::new(),
            socket: DEFAULT_RUNTIME_SOCKET.to_owned(),
            ip_command: "ip".to_owned(),
            attach_timeout_secs: 30,
        }
    }
}

impl WatcherConfig {
    /// 감시 설정의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NsattachError> {
        if self.image.is_empty() {
            return Err(invalid(
                "watcher.image",
                format!("must not be empty (set {ENV_IMAGE})"),
            ));
        }
        if self.image.chars().any(char::is_whitespace) {
            return Err(invalid("watcher.image", "must not contain whitespace"));
        }
        // 레지스트리 포트(`localhost:5000/myapp`)는 허용, 마지막 경로 요소의 태그는 거부
        let has_tag = self
            .image
            .rsplit('/')
            .next()
            .is_some_and(|last| last.contains(':'));
        if has_tag || self.image.contains('@') {
            return Err(invalid(
                "watcher.image",
                "must be an image name without tag or digest",
            ));
        }

        if self.interface.is_empty() {
            return Err(invalid(
                "watcher.interface",
                format!("must not be empty (set {ENV_INTERFACE})"),
            ));
        }
        if self.interface.len() > MAX_INTERFACE_NAME_LEN {
            return Err(invalid(
                "watcher.interface",
                format!("must be at most {MAX_INTERFACE_NAME_LEN} bytes"),
            ));
        }
        if self
            .interface
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace())
        {
            return Err(invalid(
                "watcher.interface",
                "must not contain '/', ':' or whitespace",
            ));
        }

        if self.socket.is_empty() {
            return Err(invalid("watcher.socket", "must not be empty"));
        }

        if self.ip_command.is_empty() {
            return Err(invalid("watcher.ip_command", "must not be empty"));
        }

        if self.attach_timeout_secs == 0 || self.attach_timeout_secs > MAX_ATTACH_TIMEOUT_SECS {
            return Err(invalid(
                "watcher.attach_timeout_secs",
                format!("must be 1-{MAX_ATTACH_TIMEOUT_SECS}"),
            ));
        }

        Ok(())
    }

    /// `unix://` 접두어를 제거한 소켓 경로를 반환합니다.
    pub fn socket_path(&self) -> &str {
        self.socket
            .strip_prefix("unix://")
            .unwrap_or(self.socket.as_str())
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9185,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> NsattachError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> NsattachConfig {
        let mut config = NsattachConfig::default();
        config.watcher.image = "myapp".to_owned();
        config.watcher.interface = "eth1".to_owned();
        config
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = NsattachConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.watcher.socket, DEFAULT_RUNTIME_SOCKET);
        assert_eq!(config.watcher.ip_command, "ip");
        assert_eq!(config.watcher.attach_timeout_secs, 30);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_requires_image_and_interface() {
        let err = NsattachConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("watcher.image"));

        let mut config = NsattachConfig::default();
        config.watcher.image = "myapp".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watcher.interface"));
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn parse_full_toml() {
        let config = NsattachConfig::parse(
            r#"
[general]
log_level = "debug"
log_format = "json"

[watcher]
image = "registry.local:5000/myapp"
interface = "fakmac0"
socket = "unix:///var/run/docker.sock"
attach_timeout_secs = 10

[metrics]
enabled = true
port = 9999
"#,
        )
        .unwrap();

        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watcher.image, "registry.local:5000/myapp");
        assert_eq!(config.watcher.interface, "fakmac0");
        assert_eq!(config.watcher.socket_path(), "/var/run/docker.sock");
        assert_eq!(config.watcher.attach_timeout_secs, 10);
        assert_eq!(config.watcher.ip_command, "ip");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9999);
        config.validate().unwrap();
    }

    #[test]
    fn parse_malformed_toml_fails() {
        let err = NsattachConfig::parse("[watcher\nimage = 1").unwrap_err();
        assert!(matches!(
            err,
            NsattachError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn socket_path_without_scheme_is_unchanged() {
        let mut config = valid_config();
        config.watcher.socket = "/run/podman/podman.sock".to_owned();
        assert_eq!(config.watcher.socket_path(), "/run/podman/podman.sock");
    }

    #[test]
    fn validate_rejects_tagged_image() {
        let mut config = valid_config();
        config.watcher.image = "myapp:".to_owned();
        assert!(config.validate().is_err());

        config.watcher.image = "myapp@sha256".to_owned();
        assert!(config.validate().is_err());

        config.watcher.image = "myapp:v1".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watcher.image"));

        config.watcher.image = "registry:5000/myapp:latest".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_registry_port() {
        let mut config = valid_config();
        config.watcher.image = "registry:5000/myapp".to_owned();
        config.validate().unwrap();

        config.watcher.image = "localhost:5000/team/myapp".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_long_interface_name() {
        let mut config = valid_config();
        config.watcher.interface = "averyveryverylongif".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watcher.interface"));
    }

    #[test]
    fn validate_rejects_interface_with_slash() {
        let mut config = valid_config();
        config.watcher.interface = "../eth0".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.watcher.attach_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("attach_timeout_secs"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = valid_config();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    #[serial]
    fn env_overrides_watcher_fields() {
        // SAFETY: serial 테스트로 환경변수 경쟁을 막습니다.
        unsafe {
            std::env::set_var(ENV_IMAGE, "myapp");
            std::env::set_var(ENV_INTERFACE, "eth1");
            std::env::set_var(ENV_SOCKET, "unix:///tmp/podman.sock");
        }

        let mut config = NsattachConfig::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var(ENV_IMAGE);
            std::env::remove_var(ENV_INTERFACE);
            std::env::remove_var(ENV_SOCKET);
        }

        config.validate().unwrap();
        assert_eq!(config.watcher.image, "myapp");
        assert_eq!(config.watcher.interface, "eth1");
        assert_eq!(config.watcher.socket_path(), "/tmp/podman.sock");
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut config = valid_config();
        unsafe { std::env::set_var("NSATTACH_ATTACH_TIMEOUT_SECS", "soon") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("NSATTACH_ATTACH_TIMEOUT_SECS") };
        assert_eq!(config.watcher.attach_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn env_override_missing_var_keeps_original() {
        let mut config = valid_config();
        unsafe { std::env::remove_var(ENV_SOCKET) };
        config.apply_env_overrides();
        assert_eq!(config.watcher.socket, DEFAULT_RUNTIME_SOCKET);
    }
}
