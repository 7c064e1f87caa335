//! 采集 -> 提交 -> 撤销的完整流程

use capcad_command::prelude::*;
use capcad_core::prelude::*;
use std::thread;

#[test]
fn test_capture_commit_is_single_history_entry() {
    let (tx, rx) = capture_channel();
    let producer = thread::spawn(move || {
        for i in 0..50i64 {
            let point = MachinePoint::new(i * 500, (i % 5) * 250, i);
            if tx.send(point).is_err() {
                break;
            }
        }
    });
    producer.join().unwrap();

    let mut session = CaptureSession::default();
    session.start();
    assert_eq!(session.pump(&rx), 50);
    session.stop();

    let mut mgr = CommandManager::default();
    let ids = mgr.execute(session.commit()).unwrap();
    assert_eq!(ids.len(), 49);
    assert_eq!(mgr.undo_len(), 1);
    mgr.scene().check_integrity().unwrap();

    mgr.undo().unwrap();
    assert!(mgr.scene().is_empty());
    mgr.redo().unwrap();
    assert!(ids.iter().all(|id| mgr.scene().has(id)));
}

#[test]
fn test_samples_outside_capture_are_discarded() {
    let (tx, rx) = capture_channel();
    let mut session = CaptureSession::default();

    tx.send(MachinePoint::new(0, 0, 0)).unwrap();
    assert_eq!(session.pump(&rx), 0);

    session.start();
    tx.send(MachinePoint::new(1_000, 0, 1)).unwrap();
    tx.send(MachinePoint::new(2_000, 0, 2)).unwrap();
    session.pause();
    tx.send(MachinePoint::new(3_000, 0, 3)).unwrap();
    assert_eq!(session.pump(&rx), 0);
    assert!(session.is_empty());
}

#[test]
fn test_script_failure_after_capture_rolls_back() {
    let mut session = CaptureSession::default();
    session.start();
    for i in 0..4 {
        session.ingest(MachinePoint::new(i * 1_000, 0, i));
    }
    let commit = session.commit();

    let mut mgr = CommandManager::default();
    mgr.execute(commit).unwrap();
    let before = mgr.scene().len();
    let result: Result<(), ScriptError> = run_script(&mut mgr, "capture then fail", |api| {
        let first = api.list()[0].id;
        api.remove(first)?;
        Err(anyhow::anyhow!("operator cancelled").into())
    });
    assert!(matches!(result, Err(ScriptError::Other(_))));
    assert_eq!(mgr.scene().len(), before);
}
