//! Validation engine against scripted sessions.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use dbbc3_control::{Session, SessionBuilder};
use dbbc3_core::{BoardRef, Error};
use dbbc3_multicast::{Mailbox, MissedFramePolicy};
use dbbc3_test_harness::{MockTransport, OctFrameBuilder};
use dbbc3_validation::{
    Check, CheckKind, Freshness, Severity, Status, ValidationConfig, ValidationEngine,
};

const DDC_V_123: &str = "version/ DDC_V,123,July 03 2019;\0";
const DDC_V_124: &str = "version/ DDC_V,124,February 18th 2020;\0";
const OCT_D_120: &str = "version/ OCT_D,120,October 19th 2021;\0";

const LOCKED: &str = "lock\nS1 locked\nS2 not locked\n-2->";
const UNLOCKED: &str = "lock\nS1 not locked\nS2 locked\n-2->";
const POWER: &str = "Power at sampler 0 = 65053929\n\
                     Power at sampler 1 = 65053929\n\
                     Power at sampler 2 = 65053929\n\
                     Power at sampler 3 = 65053929\n\0";
const BSTAT: &str = "P(\"11\") = 16.00% (1600)\n\
                     P(\"10\") = 34.00% (3400)\n\
                     P(\"01\") = 34.00% (3400)\n\
                     P(\"00\") = 16.00% (1600)\n\0";
const PPS_ONE_BOARD: &str =
    "pps_delay/ [1]: 39 ns, [2] 0 ns, [3] 0 ns, [4] 0 ns, [5] 0 ns, [6] 0 ns, [7] 0 ns, [8] 0 ns;\0";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 10, 19)
        .unwrap()
        .and_hms_opt(10, 0, 5)
        .unwrap()
}

async fn session(version_reply: &str, boards: usize, script: &[(&str, &str)]) -> Session {
    let mut mock = MockTransport::new();
    mock.expect_command("version", version_reply);
    for (command, reply) in script {
        mock.expect_command(command, reply);
    }
    SessionBuilder::new("dbbc3")
        .board_count(boards)
        .build_with_transport(Box::new(mock))
        .await
        .unwrap()
}

/// The exchanges of one board's part of the system check.
fn board_script(lock_reply: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("core3h=1,time", "2021-10-19T10:00:00\n\0"),
        ("synth=1,lock", lock_reply),
        ("synth=1,source 1", "source 1"),
        ("synth=1,cw", "cw\r\nF 2262 MHz; // Act 2262 MHz\r\n"),
        ("dbbcifa", "dbbcifa/ 2,30,agc,1,32010,32000;\0"),
        ("core3h=1,core3_power", POWER),
        ("core3h=1,core3_bstat 0", BSTAT),
        ("core3h=1,core3_bstat 1", BSTAT),
        ("core3h=1,core3_bstat 2", BSTAT),
        ("core3h=1,core3_bstat 3", BSTAT),
    ]
}

fn engine(session: &Session) -> ValidationEngine<'_> {
    ValidationEngine::new(session, ValidationConfig::default())
        .unwrap()
        .with_clock(now)
}

#[tokio::test]
async fn oct_lock_ok_and_fail() {
    let s = session(
        OCT_D_120,
        1,
        &[("synth=1,lock", LOCKED), ("synth=1,lock", UNLOCKED)],
    )
    .await;
    let engine = engine(&s);

    let ok = engine.run(Check::SynthesizerLock('A'.into())).await.unwrap();
    assert_eq!(ok.status, Status::Ok);
    assert!(!ok.exit);

    let fail = engine.run(Check::SynthesizerLock('A'.into())).await.unwrap();
    assert_eq!(fail.status, Status::Fail);
    assert_eq!(fail.severity, Severity::Critical);
    assert!(fail.exit);
    assert!(!fail.resolution.is_empty());
}

#[tokio::test]
async fn system_check_runs_everything_despite_failure() {
    let mut script = vec![("pps_delay", PPS_ONE_BOARD)];
    script.extend(board_script(UNLOCKED));
    script.push(("checkphase", "checkphase/ ok;\0"));
    let s = session(DDC_V_124, 1, &script).await;

    let report = engine(&s).check_system().await.unwrap();
    assert_eq!(report.len(), 8);
    assert_eq!(report.status(), Status::Fail);
    assert!(report.exit());

    let statuses: Vec<Status> = report.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        [
            Status::Ok,
            Status::Ok,
            Status::Fail,
            Status::Ok,
            Status::Ok,
            Status::Ok,
            Status::Ok,
            Status::Ok,
        ]
    );
    assert!(report.items()[0].action.contains("1PPS"));
    assert_eq!(report.items()[7].action, "sampler phases");

    let text = report.to_string();
    assert!(text.contains("[FAIL] synthesizer lock of board A"));
    assert!(text.contains("[RESOLUTION] Check if 10MHz is connected"));
}

#[tokio::test]
async fn oct_system_check_has_no_pps() {
    let mut script = board_script(LOCKED);
    script.push(("checkphase", "checkphase/ ok;\0"));
    let s = session(OCT_D_120, 1, &script).await;

    let report = engine(&s).check_system().await.unwrap();
    assert_eq!(report.len(), 7);
    assert_eq!(report.status(), Status::Ok);
    assert!(!report.exit());
}

#[tokio::test]
async fn transport_errors_propagate_from_composites() {
    let mut mock = MockTransport::new();
    mock.expect_command("version", OCT_D_120);
    mock.expect_command("synth=1,lock", LOCKED);
    mock.expect_connection_lost("synth=1,source 1");
    let s = SessionBuilder::new("dbbc3")
        .board_count(1)
        .build_with_transport(Box::new(mock))
        .await
        .unwrap();

    let result = engine(&s).check_synthesizer().await;
    assert!(matches!(result, Err(Error::ConnectionLost)));
}

#[tokio::test]
async fn unsupported_checks_per_family() {
    let oct = session(OCT_D_120, 1, &[]).await;
    match engine(&oct).run(Check::Pps).await {
        Err(Error::UnsupportedCheck { check, family }) => {
            assert_eq!(check, "pps");
            assert_eq!(family, "OCT");
        }
        other => panic!("expected UnsupportedCheck, got {other:?}"),
    }

    let old_ddc = session(DDC_V_123, 1, &[]).await;
    assert!(matches!(
        engine(&old_ddc).run(Check::PpsBlocks(0usize.into())).await,
        Err(Error::UnsupportedCheck { .. })
    ));
    assert!(matches!(
        engine(&old_ddc)
            .run(Check::BitStatistics(0usize.into(), Freshness::Latest))
            .await,
        Err(Error::UnsupportedCheck { .. })
    ));
}

#[tokio::test]
async fn pps_blocks_on_ddc_124() {
    let s = session(
        DDC_V_124,
        2,
        &[("pps_delay=2", "pps_delay[2]/ [1]: 43 ns, [5] 45 ns;\0")],
    )
    .await;
    let item = engine(&s).run(Check::PpsBlocks('B'.into())).await.unwrap();
    assert_eq!(item.status, Status::Fail);
    assert!(!item.exit);
}

#[tokio::test]
async fn if_level_attenuation_warning() {
    let s = session(
        OCT_D_120,
        2,
        &[("dbbcifb", "dbbcifb/ 2,4,agc,1,32010,32000;\0")],
    )
    .await;
    let report = engine(&s).check(Check::IfLevel('b'.into())).await.unwrap();
    let item = &report.items()[0];
    assert_eq!(item.status, Status::Warning);
    assert!(item.message.contains("20-40"));
    assert!(item.message.contains("is 4"));
}

#[tokio::test]
async fn timesync_uses_clock() {
    let s = session(
        OCT_D_120,
        1,
        &[
            ("core3h=1,time", "2021-10-19T10:00:00\n\0"),
            ("core3h=1,time", "2021-10-19T10:00:00\n\0"),
            ("core3h=1,time", "no time\0"),
        ],
    )
    .await;
    let check = Check::Timesync(0usize.into());
    assert!(engine(&s).run(check).await.unwrap().is_ok());

    let late = ValidationEngine::new(&s, ValidationConfig::default())
        .unwrap()
        .with_clock(|| now() + chrono::TimeDelta::minutes(1));
    let item = late.run(check).await.unwrap();
    assert_eq!(item.status, Status::Fail);
    assert!(item.message.contains("65 s"));

    let missing = engine(&s).run(check).await.unwrap();
    assert_eq!(missing.status, Status::Fail);
    assert!(missing.message.contains("no timestamp"));
}

#[tokio::test]
async fn configured_synth_frequency() {
    let s = session(
        OCT_D_120,
        1,
        &[
            ("synth=1,source 1", "source 1"),
            ("synth=1,cw", "cw\r\nF 2262 MHz; // Act 2262 MHz\r\n"),
        ],
    )
    .await;
    let config = ValidationConfig::default().with_synth_frequency(0, 4000);
    let engine = ValidationEngine::new(&s, config).unwrap();
    let item = engine
        .run(Check::SynthesizerFrequency(0usize.into()))
        .await
        .unwrap();
    assert_eq!(item.status, Status::Fail);
    assert!(item.message.contains("4000"));
}

#[tokio::test]
async fn phases_out_of_sync() {
    let s = session(
        OCT_D_120,
        1,
        &[("checkphase", "checkphase/ Board A sampler 2 out of sync;\0")],
    )
    .await;
    let item = engine(&s).run(Check::SamplerPhases).await.unwrap();
    assert_eq!(item.status, Status::Fail);
    assert!(item.message.contains("Board A sampler 2 out of sync"));
}

#[tokio::test]
async fn invalid_board_is_an_error_not_an_item() {
    let s = session(OCT_D_120, 2, &[]).await;
    assert!(matches!(
        engine(&s).run(Check::SynthesizerLock(BoardRef::Letter('C'))).await,
        Err(Error::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn bit_statistics_latest_and_fresh() {
    let s = session(OCT_D_120, 2, &[]).await;
    let mailbox = Mailbox::new();
    let rx = mailbox.subscribe(MissedFramePolicy::Skip);
    let engine = engine(&s).with_snapshots(rx);
    let latest = Check::BitStatistics('A'.into(), Freshness::Latest);

    // Nothing received yet.
    let item = engine.run(latest).await.unwrap();
    assert_eq!(item.status, Status::Error);
    assert!(!item.resolution.is_empty());

    let frame = OctFrameBuilder::new("OCT_D,120,October 19th 2021")
        .board(1, |b| b.filter_stats[0] = [30, 20, 34, 16])
        .build();
    mailbox.publish(dbbc3_multicast::decode(&frame).unwrap());

    assert!(engine.run(latest).await.unwrap().is_ok());
    let item = engine
        .run(Check::BitStatistics('B'.into(), Freshness::Latest))
        .await
        .unwrap();
    assert_eq!(item.status, Status::Fail);

    // The published frame is still unread by the receiver, so a fresh
    // read returns it at once; the next one has to wait.
    let fresh = Check::BitStatistics('A'.into(), Freshness::Fresh(Duration::from_millis(50)));
    assert!(engine.run(fresh).await.unwrap().is_ok());
    assert!(matches!(engine.run(fresh).await, Err(Error::Timeout)));
}

#[tokio::test]
async fn bit_statistics_without_telemetry() {
    let s = session(OCT_D_120, 1, &[]).await;
    let item = engine(&s)
        .run(Check::BitStatistics(0usize.into(), Freshness::Latest))
        .await
        .unwrap();
    assert_eq!(item.status, Status::Error);
}

#[tokio::test]
async fn kinds_parse_for_cli_use() {
    let s = session(OCT_D_120, 1, &[("synth=1,lock", LOCKED)]).await;
    let kind: CheckKind = "synthesizer-lock".parse().unwrap();
    let check = Check::new(kind, 'a', Freshness::Latest);
    assert!(engine(&s).run(check).await.unwrap().is_ok());
}
