mod common;

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rax_ftp_client::{FtpClient, RemoteClient};
use rax_ftp_client::error::{Error, PoolError};
use rax_ftp_client::pool::{ConnectionSource, Pool, PoolConfig};

use common::{Behaviour, MemFs, MockFtpFactory, Mode, SharedFs, Stats, ftp_client, sftp_client};

fn slow() -> Behaviour {
    Behaviour {
        latency: Duration::from_millis(50),
        ..Default::default()
    }
}

fn concurrent_gets(client: Arc<dyn RemoteClient>, readers: usize) {
    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let mut out = Vec::new();
                client.get(&mut out, "/shared", "file.txt").unwrap();
                out
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"x");
    }
}

#[test]
fn ftp_pool_of_two_serves_three_readers() {
    let fs = MemFs::shared();
    fs.lock().add_file("/shared/file.txt", b"x");
    let (client, stats) = ftp_client(&fs, Mode::Pooled { max_size: 2 }, slow());

    concurrent_gets(Arc::new(client), 3);

    assert_eq!(stats.created(), 2);
    assert!(stats.max_live() <= 2);
    assert_eq!(stats.max_busy(), 2);
}

#[test]
fn sftp_pool_of_two_serves_three_readers() {
    let fs = MemFs::shared();
    fs.lock().add_file("/shared/file.txt", b"x");
    let (client, stats) = sftp_client(&fs, Mode::Pooled { max_size: 2 }, slow());

    concurrent_gets(Arc::new(client), 3);

    assert!(stats.max_live() <= 2);
    assert!(stats.max_busy() <= 2);
}

#[test]
fn over_borrow_fails_with_exhausted() {
    let fs = MemFs::shared();
    let stats = Arc::new(Stats::default());
    let factory = MockFtpFactory {
        fs: Arc::clone(&fs),
        stats: Arc::clone(&stats),
        behaviour: Behaviour::default(),
    };
    let config = PoolConfig {
        max_size: 1,
        borrow_timeout: Some(Duration::from_millis(30)),
        test_on_borrow: true,
    };
    let source = ConnectionSource::pooled(factory, config).unwrap();

    let held = source.acquire().unwrap();
    match source.acquire() {
        Err(Error::Pool(PoolError::Exhausted { max, waited })) => {
            assert_eq!(max, 1);
            assert!(waited >= Duration::from_millis(30));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("second lease handed out while the only one is held"),
    }
    drop(held);

    assert!(source.acquire().is_ok());
    assert_eq!(stats.created(), 1);
}

#[test]
fn blocked_borrower_gets_returned_connection() {
    let fs = MemFs::shared();
    let stats = Arc::new(Stats::default());
    let factory = MockFtpFactory {
        fs: Arc::clone(&fs),
        stats: Arc::clone(&stats),
        behaviour: Behaviour::default(),
    };
    let config = PoolConfig {
        max_size: 1,
        borrow_timeout: None,
        test_on_borrow: false,
    };
    let pool = Arc::new(Pool::new(factory, config).unwrap());

    let held = pool.borrow().unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.borrow().map(|_| ()).is_ok())
    };
    thread::sleep(Duration::from_millis(30));
    drop(held);

    assert!(waiter.join().unwrap());
    assert_eq!(stats.created(), 1);
    assert_eq!(pool.status().idle, 1);

    pool.close();
    assert_eq!(stats.destroyed(), 1);
}

#[test]
fn closed_client_refuses_operations() {
    let fs = MemFs::shared();
    let (client, stats) = ftp_client(&fs, Mode::Pooled { max_size: 2 }, Behaviour::default());

    client.close();
    assert_eq!(stats.live(), 0);
    let err = client.path_exists("/").unwrap_err();
    assert!(matches!(err, Error::Pool(PoolError::Closed)));
}

fn unbounded_ftp_client(fs: &SharedFs, max_size: usize) -> FtpClient<MockFtpFactory> {
    let factory = MockFtpFactory {
        fs: Arc::clone(fs),
        stats: Arc::new(Stats::default()),
        behaviour: Behaviour::default(),
    };
    let config = PoolConfig {
        max_size,
        borrow_timeout: None,
        test_on_borrow: true,
    };
    FtpClient::new(ConnectionSource::pooled(factory, config).unwrap(), 4096)
}

#[test]
fn copy_on_single_connection_pool_fails_fast() {
    let fs = MemFs::shared();
    fs.lock().add_file("/src/a.bin", b"abc");
    let client = unbounded_ftp_client(&fs, 1);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = client.copy("/src", "/dst", "a.bin", ".tmp", "");
        let idle = client.status().map(|s| s.idle);
        let _ = tx.send((result, idle));
    });

    let (result, idle) = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("copy blocked on a pool of one");
    match result {
        Err(Error::Pool(PoolError::TooSmall { needed: 2, max: 1 })) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(idle, Some(1));
    assert!(!fs.lock().is_file("/dst/a.bin"));
}

#[test]
fn concurrent_copies_share_a_pool_without_deadlock() {
    let fs = MemFs::shared();
    for i in 0..4 {
        fs.lock().add_file(&format!("/src/{i}.bin"), b"payload");
    }
    let client = Arc::new(unbounded_ftp_client(&fs, 2));

    let (tx, rx) = mpsc::channel();
    for i in 0..4 {
        let client = Arc::clone(&client);
        let tx = tx.clone();
        thread::spawn(move || {
            let name = format!("{i}.bin");
            let _ = tx.send(client.copy("/src", "/dst", &name, ".tmp", "").is_ok());
        });
    }

    for _ in 0..4 {
        let copied = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("concurrent copies deadlocked");
        assert!(copied);
    }
    assert_eq!(fs.lock().file_paths().len(), 8);
    assert_eq!(client.status().unwrap().idle, 2);
}
