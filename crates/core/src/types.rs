//! 도메인 타입 -- 이벤트 레코드, 컨테이너 핸들, attach 결과

use std::collections::HashMap;

use crate::error::AttachError;

/// 컨테이너 이벤트 타입 값
pub const EVENT_TYPE_CONTAINER: &str = "container";
/// 컨테이너 시작 액션 값
pub const ACTION_START: &str = "start";
/// 이미지 이름이 담긴 actor 속성 키
pub const ATTR_IMAGE: &str = "image";
/// 컨테이너 이름이 담긴 actor 속성 키
pub const ATTR_NAME: &str = "name";

/// 로그에 사용하는 짧은 컨테이너 ID 길이
pub const SHORT_ID_LEN: usize = 12;

/// 런타임 이벤트 스트림에서 디코딩된 이벤트 한 건
///
/// 한 번 소비되고 보관되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// 이벤트 타입 (`container`, `image`, `network`, ...)
    pub kind: String,
    /// 액션 (`start`, `die`, `pull`, ...)
    pub action: String,
    /// actor ID (컨테이너 이벤트라면 컨테이너 ID)
    pub actor_id: String,
    /// actor 속성 (`image`, `name`, 라벨 등)
    pub attributes: HashMap<String, String>,
}

impl EventRecord {
    /// 컨테이너 시작 이벤트를 생성합니다.
    pub fn container_start(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self::new(EVENT_TYPE_CONTAINER, ACTION_START, id).with_attribute(ATTR_IMAGE, image)
    }

    /// 임의의 타입/액션으로 이벤트를 생성합니다.
    pub fn new(kind: impl Into<String>, action: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            action: action.into(),
            actor_id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// 속성을 추가합니다.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// `image` 속성을 반환합니다.
    pub fn image(&self) -> Option<&str> {
        self.attributes.get(ATTR_IMAGE).map(String::as_str)
    }

    /// `name` 속성을 반환합니다.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get(ATTR_NAME).map(String::as_str)
    }
}

/// inspect로 확인한 컨테이너
///
/// 한 번의 dispatch 동안만 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (앞의 `/` 제거됨)
    pub name: String,
    /// 메인 프로세스 PID. 이미 종료되었으면 `None`
    pub pid: Option<u32>,
}

impl ContainerHandle {
    /// 네임스페이스 대상으로 사용할 수 있는 PID를 반환합니다.
    ///
    /// 런타임은 종료된 컨테이너의 PID를 0으로 보고하므로 0은 없는 것으로 취급합니다.
    pub fn live_pid(&self) -> Option<u32> {
        self.pid.filter(|pid| *pid != 0)
    }
}

/// attach 한 번의 결과. 저장되지 않고 로그/메트릭으로만 관찰됩니다.
pub type AttachOutcome = Result<(), AttachError>;

/// 컨테이너 ID를 로그용 길이로 자릅니다.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
