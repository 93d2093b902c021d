use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use burnr_core::device::DeviceInventory;
use burnr_core::platform::{DeviceSink, Platform};
use burnr_core::{Error, ImageOptions, OsKind, WriteSession};
use tempfile::TempDir;
use test_log::test;

const CHUNK: usize = 8;

/// One scripted fault, fired when the write of the given zero-based chunk
/// index is attempted.
#[derive(Clone, Copy)]
enum Fault {
    DisconnectAt { chunk: usize },
    DenyAt { chunk: usize },
}

#[derive(Default)]
struct SinkLog {
    written: Vec<Vec<u8>>,
    write_attempts: usize,
    closes: usize,
    reopens: usize,
    syncs: usize,
}

struct FakeSink {
    log: Arc<Mutex<SinkLog>>,
    fault: Arc<Mutex<Option<Fault>>>,
}

impl DeviceSink for FakeSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let attempt_index = {
            let mut log = self.log.lock().unwrap();
            log.write_attempts += 1;
            log.written.len()
        };

        {
            let mut fault = self.fault.lock().unwrap();
            match *fault {
                Some(Fault::DisconnectAt { chunk }) if chunk == attempt_index => {
                    // One-shot: the device "comes back" for the retry.
                    *fault = None;
                    return Err(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "device went away",
                    ));
                }
                Some(Fault::DenyAt { chunk }) if chunk == attempt_index => {
                    return Err(io::Error::from(io::ErrorKind::PermissionDenied));
                }
                _ => {}
            }
        }

        self.log.lock().unwrap().written.push(chunk.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closes += 1;
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().reopens += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().syncs += 1;
        Ok(())
    }
}

struct FakeBackend {
    log: Arc<Mutex<SinkLog>>,
    fault: Arc<Mutex<Option<Fault>>>,
    fail_wipe: bool,
}

impl Platform for FakeBackend {
    fn kind(&self) -> OsKind {
        OsKind::Linux
    }

    fn list_devices(&self) -> burnr_core::Result<DeviceInventory> {
        Ok(DeviceInventory::default())
    }

    fn wipe(&self, _device: &Path) -> burnr_core::Result<()> {
        if self.fail_wipe {
            Err(Error::ExternalTool {
                tool: "sfdisk",
                detail: "exit status 1".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn open_target(&self, _device: &Path) -> burnr_core::Result<Box<dyn DeviceSink>> {
        Ok(Box::new(FakeSink {
            log: self.log.clone(),
            fault: self.fault.clone(),
        }))
    }
}

/// Builds a session writing `chunks` CHUNK-sized chunks through a fake
/// backend. Returns the session, the sink log, and the image content.
fn session_with(
    chunks: usize,
    fault: Option<Fault>,
    fail_wipe: bool,
) -> (WriteSession, Arc<Mutex<SinkLog>>, Vec<u8>, TempDir) {
    let dir = TempDir::new().unwrap();
    let image_path = dir.path().join("source.img");
    let content: Vec<u8> = (0..chunks * CHUNK).map(|i| (i % 256) as u8).collect();
    std::fs::write(&image_path, &content).unwrap();

    let log = Arc::new(Mutex::new(SinkLog::default()));
    let backend = FakeBackend {
        log: log.clone(),
        fault: Arc::new(Mutex::new(fault)),
        fail_wipe,
    };
    let session = WriteSession::with_backend("/dev/fake", &image_path, Box::new(backend))
        .with_image_options(ImageOptions {
            chunk_size: CHUNK,
            ..ImageOptions::default()
        });

    (session, log, content, dir)
}

#[test]
fn clean_write_reaches_100_percent() {
    let (mut session, log, content, _dir) = session_with(10, None, false);
    assert_eq!(session.progress_percent(), 0);

    session.write_image().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.written.len(), 10);
    assert_eq!(log.written.concat(), content);
    assert_eq!(log.syncs, 1);
    assert_eq!(session.progress_percent(), 100);
}

#[test]
fn disconnect_mid_stream_resumes_at_the_failed_chunk() {
    // The device vanishes as chunk index 4 of 10 is being written.
    let (mut session, log, content, _dir) =
        session_with(10, Some(Fault::DisconnectAt { chunk: 4 }), false);

    session.write_image().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.closes, 1);
    assert_eq!(log.reopens, 1);
    // Ten successful writes plus the one that hit the disconnect.
    assert_eq!(log.write_attempts, 11);
    // No chunk skipped, none written twice.
    assert_eq!(log.written.concat(), content);
    assert_eq!(session.progress_percent(), 100);
}

#[test]
fn permission_denied_aborts_immediately() {
    // Deny the third chunk (index 2): two chunks land, nothing after.
    let (mut session, log, _content, _dir) =
        session_with(10, Some(Fault::DenyAt { chunk: 2 }), false);

    let err = session.write_image().unwrap_err();
    assert!(matches!(err, Error::PermissionDenied { .. }));

    let log = log.lock().unwrap();
    assert_eq!(log.written.len(), 2);
    assert_eq!(log.write_attempts, 3);
    assert_eq!(log.reopens, 0);
    assert_eq!(log.syncs, 0);
    // Frozen at the value computed through the second chunk.
    assert_eq!(session.progress_percent(), 20);
}

#[test]
fn failed_wipe_does_not_block_the_write() {
    let (mut session, log, content, _dir) = session_with(4, None, true);

    session.write_image().unwrap();

    assert_eq!(log.lock().unwrap().written.concat(), content);
    assert_eq!(session.progress_percent(), 100);
}

#[test]
fn empty_image_completes_at_100() {
    let (mut session, log, _content, _dir) = session_with(0, None, false);

    session.write_image().unwrap();

    let log = log.lock().unwrap();
    assert!(log.written.is_empty());
    assert_eq!(log.syncs, 1);
    assert_eq!(session.progress_percent(), 100);
}

#[cfg(not(windows))]
#[test]
fn windows_raw_writing_is_unimplemented_off_windows() {
    use burnr_core::platform;

    let err = match platform::backend_for(OsKind::Windows)
        .open_target(Path::new(r"\\.\PHYSICALDRIVE9"))
    {
        Ok(_) => panic!("expected open_target to fail off Windows"),
        Err(e) => e,
    };
    assert!(matches!(err, Error::NotImplemented { .. }));
}
