//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 워치 루프는 이 상수로 `metrics::counter!()`, `metrics::histogram!()`을 호출합니다.
//! recorder가 설치되지 않았으면 기록은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `nsattach_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 실패 유형 레이블 키 (execution_failed, command_not_found, spawn_failed, timeout)
pub const LABEL_REASON: &str = "reason";

// ─── Watcher 메트릭 ────────────────────────────────────────────────

/// 수신한 전체 이벤트 수 (counter)
pub const EVENTS_TOTAL: &str = "nsattach_events_total";

/// 디코딩에 실패한 이벤트 수 (counter)
pub const EVENT_DECODE_ERRORS_TOTAL: &str = "nsattach_event_decode_errors_total";

/// 대상 이미지의 시작 이벤트 수 (counter)
pub const TARGET_STARTS_TOTAL: &str = "nsattach_target_starts_total";

/// inspect 전에 사라진 컨테이너 수 (counter)
pub const CONTAINERS_VANISHED_TOTAL: &str = "nsattach_containers_vanished_total";

/// inspect 실패 수 (counter)
pub const INSPECTION_ERRORS_TOTAL: &str = "nsattach_inspection_errors_total";

/// attach 시도 수 (counter, label: result, reason)
pub const ATTACH_TOTAL: &str = "nsattach_attach_total";

/// attach 명령 소요 시간 (histogram, 초)
pub const ATTACH_DURATION_SECONDS: &str = "nsattach_attach_duration_seconds";

/// 정의된 모든 메트릭 이름
pub const ALL_METRIC_NAMES: &[&str] = &[
    EVENTS_TOTAL,
    EVENT_DECODE_ERRORS_TOTAL,
    TARGET_STARTS_TOTAL,
    CONTAINERS_VANISHED_TOTAL,
    INSPECTION_ERRORS_TOTAL,
    ATTACH_TOTAL,
    ATTACH_DURATION_SECONDS,
];

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        EVENTS_TOTAL,
        "Total number of lifecycle events received from the container runtime"
    );
    describe_counter!(
        EVENT_DECODE_ERRORS_TOTAL,
        "Total number of events that could not be decoded"
    );
    describe_counter!(
        TARGET_STARTS_TOTAL,
        "Total number of start events for the target image"
    );
    describe_counter!(
        CONTAINERS_VANISHED_TOTAL,
        "Matched containers that were gone before their pid could be resolved"
    );
    describe_counter!(
        INSPECTION_ERRORS_TOTAL,
        "Container inspections that failed for reasons other than not-found"
    );
    describe_counter!(
        ATTACH_TOTAL,
        "Interface namespace moves attempted, by result"
    );
    describe_histogram!(
        ATTACH_DURATION_SECONDS,
        "Duration of the interface namespace move command in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_start_with_nsattach_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("nsattach_"),
                "Metric '{}' does not start with 'nsattach_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            assert!(name.ends_with("_total") || name.ends_with("_seconds"));
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }
}
