//! Integration tests for pooling real TCP connections.
//!
//! These tests run a local PING/PONG server and drive a `Pool<TcpStream>`
//! through checkout, reuse, overflow and teardown.

use std::net::TcpStream;
use std::sync::Barrier;
use std::thread;

use lion_pool::tcp::{ping, PingServer, TcpConnector};
use lion_pool::{Pool, PoolConfig, PoolError};

fn connection_pool(server: &PingServer, initial_size: usize, max_size: usize) -> Pool<TcpStream> {
    TcpConnector::new(server.local_addr())
        .into_pool(PoolConfig::new(initial_size, max_size), true)
        .expect("pool should be created")
}

#[test]
fn test_connection_pool_lifecycle() {
    let server = PingServer::bind("127.0.0.1:0").unwrap();
    let pool = connection_pool(&server, 2, 10);
    assert_eq!(pool.len(), 2);

    // Get a connection, use it, then put it back
    let mut conn = pool.get().unwrap();
    ping(&mut conn).unwrap();
    assert_eq!(pool.len(), 1);
    pool.put(conn);
    assert_eq!(pool.len(), 2);

    // Reuse a single connection for several exchanges
    let mut conn = pool.get().unwrap();
    for _ in 0..10 {
        ping(&mut conn).unwrap();
    }
    assert_eq!(pool.len(), 1);
    pool.put(conn);
    assert_eq!(pool.len(), 2);

    // Many get/put cycles leave the idle count unchanged
    for _ in 0..10 {
        let mut conn = pool.get().unwrap();
        ping(&mut conn).unwrap();
        pool.put(conn);
    }
    assert_eq!(pool.len(), 2);

    // Check out more connections than the pool can hold
    let barrier = Barrier::new(20);
    let (shared, barrier) = (&pool, &barrier);
    let conns: Vec<TcpStream> = thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(move |_| {
                s.spawn(move || {
                    let mut conn = shared.get().unwrap();
                    ping(&mut conn).unwrap();
                    barrier.wait();
                    conn
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for conn in conns {
        pool.put(conn);
    }
    assert_eq!(pool.len(), 10);

    // A connection that is never returned
    let mut kept = pool.get().unwrap();
    ping(&mut kept).unwrap();
    assert_eq!(pool.len(), 9);

    pool.destroy();
    assert_eq!(pool.len(), 0);

    let result = pool.get();
    assert!(matches!(result, Err(PoolError::PoolClosed)));

    TcpConnector::close(kept);
    server.shutdown();
}

#[test]
fn test_stale_connections_are_replaced() {
    let server = PingServer::bind("127.0.0.1:0").unwrap();
    let pool = connection_pool(&server, 0, 4);

    // Return a connection with an unread reply; it no longer validates
    let conn = pool.get().unwrap();
    let mut writer = conn.try_clone().unwrap();
    std::io::Write::write_all(&mut writer, lion_pool::tcp::PING).unwrap();
    drop(writer);
    thread::sleep(std::time::Duration::from_millis(50));
    pool.put(conn);
    assert_eq!(pool.len(), 1);

    let mut fresh = pool.get().unwrap();
    ping(&mut fresh).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.reused, 0);
}

#[test]
fn test_connection_refused() {
    // Bind then drop a listener to get an address nobody is listening on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let result = TcpConnector::new(addr).into_pool(PoolConfig::new(1, 2), true);
    assert!(matches!(result, Err(PoolError::CreateFailed(_))));

    let pool = TcpConnector::new(addr)
        .into_pool(PoolConfig::new(0, 2), true)
        .unwrap();
    assert!(matches!(pool.get(), Err(PoolError::CreateFailed(_))));
}

#[test]
fn test_guard_returns_connection() {
    let server = PingServer::bind("127.0.0.1:0").unwrap();
    let pool = connection_pool(&server, 1, 2);

    {
        let mut conn = pool.acquire().unwrap();
        ping(&mut conn).unwrap();
        assert_eq!(pool.len(), 0);
    }
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.stats().returned, 1);
}
