//! 이벤트 필터 -- 대상 이미지 컨테이너의 시작 이벤트 판별
//!
//! 이미지 이름은 태그와 무관하게 정확히 일치해야 합니다.
//! `myapp` 대상은 `myapp:v1`, `myapp:latest`와 일치하지만
//! `myapp-extra:latest`, `myapp`(태그 없음), 다이제스트 참조와는 일치하지 않습니다.

use nsattach_core::types::{ACTION_START, EVENT_TYPE_CONTAINER, EventRecord};

/// 이벤트가 대상 이미지 컨테이너의 시작 이벤트인지 판별합니다.
///
/// 부수 효과가 없는 순수 함수입니다.
pub fn is_target_start(event: &EventRecord, target_image: &str) -> bool {
    event.kind == EVENT_TYPE_CONTAINER
        && event.action == ACTION_START
        && event
            .image()
            .and_then(|image| image.strip_prefix(target_image))
            .is_some_and(|tag| tag.starts_with(':'))
}

/// 설정된 대상 이미지에 대한 필터
///
/// 워치 루프가 모든 이벤트에 대해 스트림 순서대로 평가합니다.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// `"<image>:"` 접두어
    prefix: String,
}

impl EventFilter {
    /// 대상 이미지 이름(태그 제외)으로 필터를 생성합니다.
    pub fn new(target_image: &str) -> Self {
        Self {
            prefix: format!("{target_image}:"),
        }
    }

    /// 대상 이미지 이름을 반환합니다.
    pub fn target_image(&self) -> &str {
        self.prefix.strip_suffix(':').unwrap_or(&self.prefix)
    }

    /// 이벤트가 대상 컨테이너의 시작인지 판별합니다.
    pub fn matches(&self, event: &EventRecord) -> bool {
        event.kind == EVENT_TYPE_CONTAINER
            && event.action == ACTION_START
            && event
                .image()
                .is_some_and(|image| image.starts_with(&self.prefix))
    }
}
