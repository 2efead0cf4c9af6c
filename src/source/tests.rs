use std::io::Cursor;

use super::*;

const TRACE: &str = "\
# three fingers down, then lifted
frame,0,0:100:100,1:150:100,2:200:100

frame,20, 0:110:100 ,1:160:100,2:210:100
disconnect,30
frame,40
";

#[test]
fn parses_frames_and_skips_comments() {
    let mut source = TraceSource::new(Cursor::new(TRACE));

    let first = source.next_frame().expect("frame").expect("not ended");
    assert_eq!(first.t_ms, 0);
    assert_eq!(first.contacts.len(), 3);
    assert_eq!(
        first.contacts[2],
        Contact {
            slot: 2,
            x: 200.0,
            y: 100.0
        }
    );

    let second = source.next_frame().expect("frame").expect("not ended");
    assert_eq!(second.t_ms, 20);
    assert_eq!(second.contacts[0].x, 110.0);

    let err = source.next_frame().expect_err("disconnect");
    assert!(matches!(err, SourceError::Disconnected { t_ms: 30 }));
    assert!(err.is_transient());
    source.recover().expect("trace sources recover");

    let lifted = source.next_frame().expect("frame").expect("not ended");
    assert!(lifted.contacts.is_empty());
    assert!(source.next_frame().expect("end").is_none());
}

#[test]
fn reports_line_numbers_for_bad_records() {
    let mut source = TraceSource::new(Cursor::new("frame,0\nframe,x\n"));
    assert!(source.next_frame().is_ok());
    match source.next_frame() {
        Err(SourceError::Parse { line, reason }) => {
            assert_eq!(line, 2);
            assert!(reason.contains("timestamp"), "{reason}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn rejects_malformed_lines() {
    for line in [
        "frame",
        "tap,10",
        "frame,10,1:2",
        "frame,10,a:1:2",
        "frame,10,1:2:3:4",
        "frame,10,1:inf:3",
        "disconnect,10,1:2:3",
    ] {
        assert!(parse_trace_line(line).is_err(), "{line}");
    }
    assert_eq!(parse_trace_line("   # note"), Ok(None));
    assert_eq!(parse_trace_line(""), Ok(None));
}

#[test]
fn paced_source_waits_for_recorded_spacing() {
    let mut source = TraceSource::new(Cursor::new("frame,1000\nframe,1040\n")).paced(true);
    let started = Instant::now();
    source.next_frame().expect("frame");
    source.next_frame().expect("frame");
    assert!(started.elapsed() >= Duration::from_millis(40));
}
