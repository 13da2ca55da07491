//! Process-level scenarios for `jsys_test` (spec.md §8): the hash daemon and
//! SIGINT shutdown, run as a real spawned binary rather than in-process,
//! in the style of `wasmer`'s CLI integration tests.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Command, Stdio};
use std::time::Duration;

fn spawn_daemon(extra_args: &[&str]) -> std::process::Child {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("jsys_test"));
    cmd.args(["--ip", "127.0.0.1", "--port", "0"]);
    cmd.args(extra_args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.spawn().expect("failed to spawn jsys_test")
}

/// Parse the port out of the daemon's "listening on TCP:<ip>:<port>" log
/// line, printed to stdout by the stdio sink at startup.
fn wait_for_listening_port(stdout: &mut BufReader<std::process::ChildStdout>) -> u16 {
    let mut line = String::new();
    loop {
        line.clear();
        let n = stdout.read_line(&mut line).expect("daemon stdout closed before it started listening");
        assert!(n > 0, "daemon exited before printing its listening address");
        if let Some(addr) = line.trim().strip_prefix("[INFO] listening on TCP:") {
            return addr.rsplit(':').next().unwrap().parse().unwrap();
        }
    }
}

#[test]
fn hash_daemon_md5_echoes_hex_digest() {
    let mut child = spawn_daemon(&["--hash", "1"]);
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let port = wait_for_listening_port(&mut stdout);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b"Hello World!").unwrap();

    let mut buf = [0u8; 32];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(std::str::from_utf8(&buf).unwrap(), "ed076287532e86365e841e92bfc50d8c");

    let pid = child.id();
    let _ = Command::new("kill").args(["-INT", &pid.to_string()]).status();
    let status = child.wait().unwrap();
    assert!(status.success());
}

#[test]
fn sigint_closes_live_connections_and_exits_cleanly() {
    let mut child = spawn_daemon(&["--hash", "0"]);
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let port = wait_for_listening_port(&mut stdout);

    let _stream = TcpStream::connect(("127.0.0.1", port)).unwrap();

    let pid = child.id();
    let sent_at = std::time::Instant::now();
    let _ = Command::new("kill").args(["-INT", &pid.to_string()]).status();

    let status = child.wait().unwrap();
    assert!(sent_at.elapsed() < Duration::from_millis(500));
    assert!(status.success());

    let mut stderr = String::new();
    child.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
    assert!(stderr.is_empty(), "unexpected stderr output: {stderr}");
}
