// Transport Tests
// Session semantics of the simulated lamp

use candela::protocol::{CONTROL_UUID, NOTIFY_UUID};
use candela::transport::{
    LinkEvent, MockTransport, PeripheralHandle, Transport, TransportError, WrittenFrame,
};

// ============================================================================
// MOCK SESSION
// ============================================================================

#[tokio::test]
async fn test_mock_records_writes_in_order() {
    let mock = MockTransport::new();
    let peripheral = PeripheralHandle::parse("AA:BB:CC:DD:EE:FF").unwrap();
    let link = mock.connect(&peripheral).await.unwrap();

    link.session.write(CONTROL_UUID, &[1, 2, 3]).await.unwrap();
    link.session.write(NOTIFY_UUID, &[4]).await.unwrap();

    assert_eq!(
        mock.written(),
        vec![
            WrittenFrame { characteristic: CONTROL_UUID, data: vec![1, 2, 3] },
            WrittenFrame { characteristic: NOTIFY_UUID, data: vec![4] },
        ]
    );
    assert_eq!(mock.written_to(CONTROL_UUID), vec![vec![1, 2, 3]]);
}

#[tokio::test]
async fn test_mock_drop_reports_event_and_kills_session() {
    let mock = MockTransport::new();
    let peripheral = PeripheralHandle::parse("AA:BB:CC:DD:EE:FF").unwrap();
    let mut link = mock.connect(&peripheral).await.unwrap();

    mock.drop_link();

    assert!(matches!(link.events.recv().await, Some(LinkEvent::Disconnected { .. })));
    assert_eq!(
        link.session.write(CONTROL_UUID, &[0]).await,
        Err(TransportError::NotConnected)
    );
    assert!(!mock.is_connected());
}

#[tokio::test]
async fn test_mock_old_session_is_stale_after_reconnect() {
    let mock = MockTransport::new();
    let peripheral = PeripheralHandle::parse("AA:BB:CC:DD:EE:FF").unwrap();
    let first = mock.connect(&peripheral).await.unwrap();
    let second = mock.connect(&peripheral).await.unwrap();

    assert_eq!(
        first.session.write(CONTROL_UUID, &[0]).await,
        Err(TransportError::NotConnected)
    );
    second.session.write(CONTROL_UUID, &[0]).await.unwrap();
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn test_mock_notifications_reach_subscriber() {
    let mock = MockTransport::new();
    let peripheral = PeripheralHandle::parse("AA:BB:CC:DD:EE:FF").unwrap();
    let link = mock.connect(&peripheral).await.unwrap();

    mock.push_notification(&[0xAA]);
    let mut subscription = link.session.subscribe(NOTIFY_UUID).await.unwrap();
    mock.push_notification(&[0xBB]);

    assert_eq!(subscription.notifications.recv().await, Some(vec![0xAA]));
    assert_eq!(subscription.notifications.recv().await, Some(vec![0xBB]));

    link.session.unsubscribe(subscription.id).await.unwrap();
    assert_eq!(mock.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_mock_unreachable() {
    let mock = MockTransport::new().with_unreachable();
    let peripheral = PeripheralHandle::parse("AA:BB:CC:DD:EE:FF").unwrap();

    let error = mock.connect(&peripheral).await.unwrap_err();

    assert!(error.is_retryable());
    assert!(!error.is_link_loss());
    assert_eq!(mock.connect_calls(), 1);
}
