use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::time::sleep;

/// Kills the gateway when a test ends, pass or fail.
pub struct Busgate {
    child: Child,
}

impl Busgate {
    #[allow(dead_code)]
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub async fn wait_for_exit(&mut self) -> ExitStatus {
        for _ in 0..100 {
            if let Some(status) = self.child.try_wait().expect("poll busgate") {
                return status;
            }
            sleep(Duration::from_millis(50)).await;
        }
        panic!("busgate did not exit");
    }
}

impl Drop for Busgate {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[allow(dead_code)]
pub fn reserve_port(host: &str) -> u16 {
    let addr = format!("{host}:0");
    let listener = TcpListener::bind(&addr).expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

pub fn spawn_busgate(args: &[&str]) -> Busgate {
    let exe = env!("CARGO_BIN_EXE_busgate");

    let child = Command::new(exe)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("BUSGATE_CONFIG_FILE")
        .env_remove("BUSGATE_BIND")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn busgate");

    Busgate { child }
}

#[allow(dead_code)]
pub fn spawn_with_config(config: &Path, bind: &str) -> Busgate {
    let config = config.to_str().expect("utf-8 config path");
    spawn_busgate(&["--config", config, "--bind", bind])
}

#[allow(dead_code)]
pub async fn wait_for_listen(host: &str, port: u16) {
    let addr = format!("{host}:{port}");
    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("busgate did not start listening on {addr}");
}

pub fn write_tmp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

/// A config that starts cleanly: a valid range and the built-in backend.
/// `extra` is appended verbatim, so it may add whole sections.
#[allow(dead_code)]
pub fn write_config(min: u64, max: u64, extra: &str) -> NamedTempFile {
    write_tmp(&format!(
        r#"
[channels]
min = {min}
max = {max}

[client]
type = "discard"

{extra}
"#
    ))
}
