//! End-to-end banner grabbing and service detection against local listeners.

use portprobe::{PortStatus, ScanConfig, ScanEngine};
use std::io::Write;
use std::net::TcpListener;
use std::thread;

/// Accept `count` connections and greet each one with `banner`.
fn greeting_listener(banner: &'static [u8], count: usize) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        for _ in 0..count {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let _ = stream.write_all(banner);
            // Keep the connection alive long enough for the read.
            let _ = stream.flush();
        }
    });
    (port, handle)
}

#[test]
fn banner_flows_into_the_result() {
    // The engine opens one scan connection and the grabber a second one.
    let (port, handle) = greeting_listener(b"220 vsFTPd 3.0.5 ready\r\n", 2);

    let config = ScanConfig::new("127.0.0.1")
        .with_ports(vec![port])
        .with_timeout(1000)
        .with_concurrency(1);
    let mut engine = ScanEngine::new(config).unwrap();
    let report = engine.scan().unwrap();
    handle.join().unwrap();

    assert_eq!(report.total_count(), 1);
    let result = &report.results()[0];
    assert_eq!(result.status, PortStatus::Open);

    let banner = result.banner.as_deref().expect("banner grabbed");
    assert!(banner.starts_with("220 vsFTPd 3.0.5"));

    // An ephemeral port has no pattern entry, so the matcher falls back to
    // the well-known table.
    let service = result.service.as_ref().expect("service identified");
    assert!((service.confidence - 0.5).abs() < f32::EPSILON);
}

#[test]
fn detection_disabled_leaves_service_empty() {
    let (port, handle) = greeting_listener(b"SSH-2.0-OpenSSH_8.9p1\r\n", 2);

    let mut config = ScanConfig::new("127.0.0.1")
        .with_ports(vec![port])
        .with_timeout(1000);
    config.service_detection = false;
    let mut engine = ScanEngine::new(config).unwrap();
    let report = engine.scan().unwrap();
    handle.join().unwrap();

    let result = &report.results()[0];
    assert_eq!(result.status, PortStatus::Open);
    assert!(result.service.is_none());
    assert!(result.banner.is_some());
}

#[test]
fn banner_grabbing_disabled_still_classifies() {
    let (port, handle) = greeting_listener(b"220 mail ESMTP\r\n", 1);

    let mut config = ScanConfig::new("127.0.0.1")
        .with_ports(vec![port])
        .with_timeout(1000);
    config.banner_grabbing = false;
    let mut engine = ScanEngine::new(config).unwrap();
    let report = engine.scan().unwrap();
    handle.join().unwrap();

    let result = &report.results()[0];
    assert_eq!(result.status, PortStatus::Open);
    assert!(result.banner.is_none());

    // Detection still runs, on an empty banner.
    let service = result.service.as_ref().expect("service identified");
    assert!((service.confidence - 0.5).abs() < f32::EPSILON);
}

#[test]
fn closed_port_never_reaches_the_grabber() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = ScanConfig::new("127.0.0.1")
        .with_ports(vec![port])
        .with_timeout(1000);
    let mut engine = ScanEngine::new(config).unwrap();
    let report = engine.scan().unwrap();

    let result = &report.results()[0];
    assert_eq!(result.status, PortStatus::Closed);
    assert!(result.banner.is_none());
    assert!(result.service.is_none());
}
