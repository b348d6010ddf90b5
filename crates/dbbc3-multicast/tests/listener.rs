//! End-to-end tests: datagrams sent over loopback UDP through the listener.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use dbbc3_core::{Error, Mode};
use dbbc3_multicast::{
    DecoderRegistry, Layout, ListenerConfig, MissedFramePolicy, MulticastListener,
};
use dbbc3_test_harness::{DdcFrameBuilder, OctFrameBuilder};
use tokio::net::UdpSocket;

const OCT_HEADER: &str = "OCT_D,120,October 19th 2021";
const DDC_HEADER: &str = "DDC_U,125,November 04th 2020";
const POLL: Duration = Duration::from_secs(2);

fn loopback_config() -> ListenerConfig {
    ListenerConfig {
        group: Ipv4Addr::LOCALHOST,
        port: 0,
        receive_timeout: Duration::from_millis(100),
        ..ListenerConfig::default()
    }
}

async fn sender() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn send(socket: &UdpSocket, to: SocketAddr, frame: &[u8]) {
    socket.send_to(frame, to).await.unwrap();
}

#[tokio::test]
async fn oct_datagram_is_decoded() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    let frame = OctFrameBuilder::new(OCT_HEADER)
        .present(0b0000_0011)
        .active(0b0000_0001)
        .board(1, |b| {
            b.pps_delay = 41;
            b.sampler_power = [100, 200, 300, 400];
        })
        .build();
    send(&tx, listener.local_addr(), &frame).await;

    let snapshot = rx.poll_timeout(POLL).await.unwrap();
    assert_eq!(snapshot.mode(), Mode::OctD);
    assert_eq!(snapshot.major_version(), 120);
    assert_eq!(snapshot.minor_version(), 211019);
    assert!(snapshot.is_active(0));
    assert!(!snapshot.is_active(1));
    assert_eq!(snapshot.present_boards().count(), 2);

    let board = snapshot.board(1).unwrap();
    assert_eq!(board.core3h.pps_delay(), 41);
    assert_eq!(board.samplers[3].power, 400);
    assert!(snapshot.board(2).is_none());

    assert_eq!(listener.latest().unwrap().minor_version(), 211019);
    listener.stop();
}

#[tokio::test]
async fn ddc_datagram_is_decoded() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    let frame = DdcFrameBuilder::new(DDC_HEADER)
        .bbc(0, |b| {
            b.frequency_raw = 524_288 * 100;
            b.tsys_usb = 55;
        })
        .build();
    send(&tx, listener.local_addr(), &frame).await;

    let snapshot = rx.poll_timeout(POLL).await.unwrap();
    assert_eq!(snapshot.mode(), Mode::DdcU);
    let bbc = &snapshot.board(0).unwrap().bbcs[0];
    assert_eq!(bbc.number, 1);
    assert_eq!(bbc.frequency, 100.0);
    assert_eq!(bbc.tsys_usb, 55);
}

#[tokio::test]
async fn bad_datagram_is_reported_and_listener_keeps_running() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    // Valid header, truncated body.
    let mut frame = OctFrameBuilder::new(OCT_HEADER).build();
    frame.truncate(100);
    send(&tx, listener.local_addr(), &frame).await;
    match rx.poll_timeout(POLL).await {
        Err(Error::Decode { raw, .. }) => assert_eq!(raw.len(), 100),
        other => panic!("expected Decode, got {other:?}"),
    }

    send(&tx, listener.local_addr(), &OctFrameBuilder::new(OCT_HEADER).build()).await;
    assert!(rx.poll_timeout(POLL).await.is_ok());
    assert!(listener.is_running());
}

#[tokio::test]
async fn unknown_mode_is_unsupported_version() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    send(
        &tx,
        listener.local_addr(),
        &OctFrameBuilder::new("XYZ_Q,120,October 19th 2021").build(),
    )
    .await;
    assert!(matches!(
        rx.poll_timeout(POLL).await,
        Err(Error::UnsupportedVersion { .. })
    ));
    assert!(listener.latest().is_none());
}

#[tokio::test]
async fn version_below_floor_is_unsupported() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    send(
        &tx,
        listener.local_addr(),
        &OctFrameBuilder::new("OCT_D,110,October 19th 2021").build(),
    )
    .await;
    match rx.poll_timeout(POLL).await {
        Err(Error::UnsupportedVersion { mode, version }) => {
            assert_eq!(mode, "OCT_D");
            assert_eq!(version, 110);
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_registry_floor() {
    let mut registry = DecoderRegistry::new();
    registry.register(Mode::OctD, 110, Layout::Oct).unwrap();
    let listener = MulticastListener::start_with_registry(loopback_config(), registry)
        .await
        .unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);
    let tx = sender().await;

    send(
        &tx,
        listener.local_addr(),
        &OctFrameBuilder::new("OCT_D,110,October 19th 2021").build(),
    )
    .await;
    assert_eq!(rx.poll_timeout(POLL).await.unwrap().major_version(), 110);
}

#[tokio::test]
async fn silence_times_out_without_stopping() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);

    // Longer than the receive timeout; the loop logs and carries on.
    assert!(matches!(
        rx.poll_timeout(Duration::from_millis(250)).await,
        Err(Error::Timeout)
    ));
    assert!(listener.is_running());
    assert_eq!(listener.frames(), 0);
}

#[tokio::test]
async fn stop_releases_waiting_receivers() {
    let listener = MulticastListener::start(loopback_config()).await.unwrap();
    let mut rx = listener.subscribe(MissedFramePolicy::Skip);

    let waiter = tokio::spawn(async move { rx.poll().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    listener.stop();

    let result = tokio::time::timeout(POLL, waiter).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(!listener.is_running());
}

#[tokio::test]
async fn zero_buffer_is_rejected() {
    let config = ListenerConfig {
        buffer_size: 0,
        ..loopback_config()
    };
    assert!(matches!(
        MulticastListener::start(config).await,
        Err(Error::InvalidParameter(_))
    ));
}
