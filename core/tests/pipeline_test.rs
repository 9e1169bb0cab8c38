//! Segment pipeline ordering and failure propagation

mod common;

use common::{Call, FailAfter, FakeSession};
use polyglot_core::{
    BackendError, DetectedSpan, LanguageDetector, PipelineError, SegmentPipeline,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

mockall::mock! {
    pub Detector {}
    impl LanguageDetector for Detector {
        fn detect_spans(&self, line: &str) -> Vec<DetectedSpan>;
    }
}

/// "Bonjour world" → French then English
fn bilingual_detector() -> MockDetector {
    let mut detector = MockDetector::new();
    detector.expect_detect_spans().returning(|line| {
        if line == "Bonjour world" {
            vec![DetectedSpan::new(0, 7, "fr"), DetectedSpan::new(8, 13, "en")]
        } else {
            vec![DetectedSpan::new(0, line.len(), "en")]
        }
    });
    detector
}

/// Counts calls and tags every line with a fixed language
struct CountingDetector {
    calls: AtomicUsize,
    language: &'static str,
}

impl LanguageDetector for CountingDetector {
    fn detect_spans(&self, line: &str) -> Vec<DetectedSpan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        vec![DetectedSpan::new(0, line.len(), self.language)]
    }
}

#[tokio::test]
async fn test_spans_spoken_in_order_with_waits() {
    let session = FakeSession {
        playback_delay: Duration::from_millis(5),
        ..Default::default()
    };
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let stats = pipeline
        .run(BufReader::new("Bonjour world\n".as_bytes()))
        .await
        .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            Call::Language("fr".into()),
            Call::Speak("Bonjour".into()),
            Call::Waited("Bonjour".into()),
            Call::Language("en".into()),
            Call::Speak("world".into()),
            Call::Waited("world".into()),
        ]
    );
    assert!(!recorder.overlapped());
    assert_eq!(stats.lines_read, 1);
    assert_eq!(stats.spans_spoken, 2);
    assert_eq!(stats.language_switches, 2);
}

#[tokio::test]
async fn test_out_of_order_spans_are_sorted() {
    let mut detector = MockDetector::new();
    detector
        .expect_detect_spans()
        .returning(|_| vec![DetectedSpan::new(8, 13, "en"), DetectedSpan::new(0, 7, "fr")]);
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(detector));

    pipeline.speak_line("Bonjour world").await.unwrap();

    let spoken: Vec<Call> = recorder
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Speak(_)))
        .collect();
    assert_eq!(
        spoken,
        vec![Call::Speak("Bonjour".into()), Call::Speak("world".into())]
    );
}

#[tokio::test]
async fn test_same_language_switches_once() {
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let detector = CountingDetector {
        calls: AtomicUsize::new(0),
        language: "en",
    };
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(detector));

    let stats = pipeline
        .run(BufReader::new("one\ntwo\nthree\n".as_bytes()))
        .await
        .unwrap();

    assert_eq!(recorder.count(|c| matches!(c, Call::Language(_))), 1);
    assert_eq!(recorder.count(|c| matches!(c, Call::Speak(_))), 3);
    assert_eq!(stats.language_switches, 1);
    assert_eq!(pipeline.active_language(), Some("en"));
}

#[tokio::test]
async fn test_consecutive_same_language_spans_in_one_line() {
    let mut detector = MockDetector::new();
    detector
        .expect_detect_spans()
        .returning(|_| vec![DetectedSpan::new(0, 3, "de"), DetectedSpan::new(4, 7, "de")]);
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(detector));

    pipeline.speak_line("ich bin").await.unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            Call::Language("de".into()),
            Call::Speak("ich".into()),
            Call::Waited("ich".into()),
            Call::Speak("bin".into()),
            Call::Waited("bin".into()),
        ]
    );
}

#[tokio::test]
async fn test_empty_lines_are_skipped() {
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let detector = Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
        language: "en",
    });
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::clone(&detector));

    let stats = pipeline
        .run(BufReader::new("\n   \n\t\nhello\n".as_bytes()))
        .await
        .unwrap();

    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.calls().len(), 3);
    assert_eq!(stats.lines_read, 4);
    assert_eq!(stats.lines_spoken, 1);
}

#[tokio::test]
async fn test_empty_input_is_ok() {
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let stats = pipeline.run(BufReader::new("".as_bytes())).await.unwrap();

    assert_eq!(stats.lines_read, 0);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_rejected_language_aborts() {
    let session = FakeSession {
        reject_language: Some("fr".into()),
        ..Default::default()
    };
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let err = pipeline
        .run(BufReader::new("Bonjour world\nhello\n".as_bytes()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Backend(BackendError::Rejected { code: 410, .. })
    ));
    assert_eq!(recorder.calls(), vec![Call::Language("fr".into())]);
}

#[tokio::test]
async fn test_speak_failure_aborts() {
    let session = FakeSession {
        fail_speak: true,
        ..Default::default()
    };
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let err = pipeline
        .run(BufReader::new("Bonjour world\n".as_bytes()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Backend(BackendError::Closed)));
    assert_eq!(recorder.count(|c| matches!(c, Call::Speak(_))), 1);
}

#[tokio::test]
async fn test_read_failure_surfaces_as_read_error() {
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let err = pipeline
        .run(BufReader::new(FailAfter::new("hello\n")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Read(_)));
    // The complete line before the failure was still spoken
    assert_eq!(recorder.count(|c| matches!(c, Call::Speak(_))), 1);
}

#[tokio::test]
async fn test_invalid_utf8_is_read_error() {
    let session = FakeSession::new();
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()));

    let bytes: &[u8] = &[0x66, 0xff, 0xfe, b'\n'];
    let err = pipeline.run(BufReader::new(bytes)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Read(ref e) if e.kind() == std::io::ErrorKind::InvalidData));
}

#[tokio::test]
async fn test_span_outside_line_is_rejected() {
    let mut detector = MockDetector::new();
    detector
        .expect_detect_spans()
        .returning(|_| vec![DetectedSpan::new(0, 99, "en")]);
    let session = FakeSession::new();
    let recorder = Arc::clone(&session.recorder);
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(detector));

    let err = pipeline.speak_line("short").await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InvalidSpan {
            start: 0,
            end: 99,
            line_len: 5
        }
    ));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_playback_timeout_bounds_wait() {
    let session = FakeSession {
        hang_playback: true,
        ..Default::default()
    };
    let mut pipeline = SegmentPipeline::new(Arc::new(session), Arc::new(bilingual_detector()))
        .with_playback_timeout(Some(Duration::from_millis(20)));

    let err = pipeline.speak_line("hello").await.unwrap_err();

    assert!(matches!(err, PipelineError::PlaybackTimeout(d) if d == Duration::from_millis(20)));
}
