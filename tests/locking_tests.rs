use safekeep::{DirMedium, LockMode, Vault};
use tempfile::tempdir;

#[test]
fn test_second_vault_fails_to_open() {
    let dir = tempdir().unwrap();
    let _vault = Vault::open(dir.path()).unwrap();

    let err = Vault::open(dir.path()).unwrap_err();
    match err {
        safekeep::Error::Io(e) => {
            assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists);
            let msg = e.to_string();
            assert!(
                msg.contains("another writer holds the lock"),
                "error should mention the lock: {msg}"
            );
            assert!(
                msg.contains("safekeep.lock"),
                "error should mention the lock path: {msg}"
            );
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

#[test]
fn test_lock_released_on_drop() {
    let dir = tempdir().unwrap();

    {
        let _vault = Vault::open(dir.path()).unwrap();
    }

    let _vault = Vault::open(dir.path()).unwrap();
}

#[test]
fn test_lock_mode_none_allows_multiple() {
    let dir = tempdir().unwrap();

    let _a = Vault::builder(dir.path())
        .lock_mode(LockMode::None)
        .open()
        .unwrap();
    let _b = Vault::builder(dir.path())
        .lock_mode(LockMode::None)
        .open()
        .unwrap();
}

#[test]
fn test_medium_lock_blocks_vault() {
    let dir = tempdir().unwrap();
    let _medium = DirMedium::open(dir.path()).unwrap();

    let err = Vault::open(dir.path()).unwrap_err();
    assert_eq!(err.kind(), safekeep::ErrorKind::Persistence);
}
