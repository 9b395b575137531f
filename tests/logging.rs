//! Tests for the events emitted when a connection fails.

use std::{sync::Arc, time::Duration};

use log::Level;
use rstest::rstest;
use serial_test::serial;
use streamwire::{
    Header,
    PayloadType,
    transport::{PayloadReceiver, PayloadSender},
};
use streamwire_testing::{LoggerHandle, RecordingTransport, ScriptedTransport, logger};
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(1);

fn assert_logged(logger: &mut LoggerHandle, level: Level, needle: &str) {
    let messages = logger.messages_at(level);
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "expected {level} record containing {needle:?}, got {messages:?}"
    );
}

#[rstest]
#[serial(streamwire_logs)]
#[tokio::test]
async fn malformed_header_is_logged(mut logger: LoggerHandle) {
    logger.clear();
    let receiver = PayloadReceiver::new();
    let transport = Arc::new(ScriptedTransport::new());
    receiver
        .connect(transport.clone())
        .expect("first connect succeeds");
    transport.push(vec![b'?'; 48]);
    timeout(WAIT, receiver.wait_closed())
        .await
        .expect("read loop exits");

    assert_logged(&mut logger, Level::Warn, "failed to read frame");
}

#[rstest]
#[serial(streamwire_logs)]
#[tokio::test]
async fn write_failure_is_logged(mut logger: LoggerHandle) {
    logger.clear();
    let sender = PayloadSender::new(1);
    sender
        .connect(Arc::new(RecordingTransport::failing_after(0)))
        .expect("first connect succeeds");
    sender
        .send_payload(
            Header::new(PayloadType::CancelAll, Uuid::new_v4(), 0, true),
            bytes::Bytes::new(),
            true,
            None,
        )
        .await
        .expect("queued");
    timeout(WAIT, sender.wait_closed())
        .await
        .expect("drain loop exits");

    assert_logged(&mut logger, Level::Error, "failed to write frame");
}
