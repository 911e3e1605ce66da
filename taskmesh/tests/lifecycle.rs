//! Session lifecycle under pool shutdown and worker disconnects.

use bytes::Bytes;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taskmesh::log::{Logger, NoOpLogger};
use taskmesh::message::Task;
use taskmesh::server::{ServerConfig, TransportServer};
use taskmesh::session::SessionState;
use taskmesh::skills::{register_builtin_skills, skill_ids};
use taskmesh::wire::{WireHeader, HEADER_SIZE};

const MAX_FRAME: usize = 1024 * 1024;

fn logger() -> Arc<dyn Logger> {
    Arc::new(NoOpLogger)
}

fn test_server() -> TransportServer {
    register_builtin_skills();
    let config = ServerConfig {
        listen_host: "127.0.0.1".to_string(),
        listen_port: 0,
        io_threads: 1,
        max_frame_size: MAX_FRAME,
        accept_timeout: Duration::from_millis(100),
        maintenance_interval: Duration::from_millis(200),
        poll_interval: Duration::from_millis(2),
    };
    let server = TransportServer::new(config, logger());
    server.start().expect("server should start");
    server
}

fn wait_until(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn read_request(stream: &mut TcpStream) -> (WireHeader, Vec<u8>) {
    let mut header_buf = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header_buf).unwrap();
    let header = WireHeader::decode(&header_buf);
    let mut body = vec![0u8; header.body_size as usize];
    if header.body_size > 0 {
        stream.read_exact(&mut body).unwrap();
    }
    (header, body)
}

// ==================== pool shutdown ====================

/// Shutting the pool down promptly releases every idle session; all of them
/// terminate and get reaped.
#[test]
fn test_pool_shutdown_releases_all_waiting_sessions() {
    let server = test_server();
    let addr = server.listen_addr().unwrap();

    // Four idle workers; their sessions suspend on the empty pool.
    let workers: Vec<TcpStream> = (0..4).map(|_| TcpStream::connect(addr).unwrap()).collect();

    assert!(wait_until(Duration::from_secs(5), || {
        server.session_manager().task_pool().waiting_count() == 4
    }));

    let shutdown_at = Instant::now();
    server.session_manager().task_pool().shutdown();

    assert!(wait_until(Duration::from_secs(1), || {
        server.session_manager().unfinished_session_count() == 0
    }));
    // Waiters resume with the invalid sentinel almost immediately; the wide
    // margin only covers scheduler noise.
    assert!(shutdown_at.elapsed() < Duration::from_secs(1));

    for id in 1..=4 {
        assert_eq!(
            server.session_manager().session_state(id),
            Some(SessionState::Terminated)
        );
    }

    assert_eq!(server.session_manager().cleanup_completed_sessions(), 4);
    assert_eq!(server.session_manager().active_session_count(), 0);

    drop(workers);
    server.stop();
}

// ==================== worker disconnect mid-task ====================

/// A worker that dies mid-exchange loses nothing: the in-flight task is
/// requeued, the unacquired tasks stay put, and the session terminates.
#[test]
fn test_worker_disconnect_requeues_in_flight_task() {
    let server = test_server();
    let addr = server.listen_addr().unwrap();

    let tasks: Vec<Task> = (1..=10)
        .map(|id| {
            Task::new(
                id,
                skill_ids::STRING_REVERSE,
                Bytes::from(format!("payload-{id}")),
            )
        })
        .collect();
    server.enqueue_tasks(tasks);

    let mut worker = TcpStream::connect(addr).unwrap();

    // Acknowledge the first three tasks properly.
    for _ in 0..3 {
        let (request, body) = read_request(&mut worker);
        let mut reversed = body.clone();
        reversed.reverse();
        let response = WireHeader {
            task_id: request.task_id,
            body_size: reversed.len() as u32,
            skill_id: request.skill_id,
        };
        worker.write_all(&response.encode()).unwrap();
        worker.write_all(&reversed).unwrap();
    }

    // Read the fourth request, then die without responding.
    let (in_flight, _body) = read_request(&mut worker);
    assert_eq!(in_flight.task_id, 4);
    drop(worker);

    assert!(wait_until(Duration::from_secs(5), || {
        server.session_manager().session_state(1) == Some(SessionState::Terminated)
    }));

    let stats = server.session_manager().session_stats(1).unwrap();
    assert_eq!(stats.tasks_completed, 3);
    assert!(stats.tasks_failed >= 1);

    // Six unacquired tasks plus the requeued fourth.
    assert_eq!(server.task_pool_stats().0, 7);

    // FIFO: the untouched tail first, the requeued task at the back.
    let pool = server.session_manager().task_pool();
    let mut drained = Vec::new();
    for _ in 0..7 {
        drained.push(futures::executor::block_on(pool.get_next_task()));
    }
    let ids: Vec<u32> = drained.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![5, 6, 7, 8, 9, 10, 4]);

    // The requeued task is byte-identical to the original.
    let requeued = drained.last().unwrap();
    assert_eq!(requeued.skill_id, skill_ids::STRING_REVERSE);
    assert_eq!(requeued.payload, Bytes::from(format!("payload-{}", 4)));

    server.stop();
}

// ==================== server shutdown ====================

/// Stopping the server terminates connected sessions and the acceptor
/// within the accept timeout budget.
#[test]
fn test_server_stop_with_connected_workers() {
    let server = test_server();
    let addr = server.listen_addr().unwrap();

    let _w1 = TcpStream::connect(addr).unwrap();
    let _w2 = TcpStream::connect(addr).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        server.session_manager().active_session_count() == 2
    }));

    let stop_at = Instant::now();
    server.stop();
    assert!(stop_at.elapsed() < Duration::from_secs(3));
    assert!(!server.is_running());
    assert_eq!(server.session_manager().active_session_count(), 0);
}

/// New connections after stop are not accepted.
#[test]
fn test_no_accept_after_stop() {
    let server = test_server();
    let addr = server.listen_addr().unwrap();
    server.stop();

    // The listener is closed; connecting now either fails outright or the
    // connection is never turned into a session.
    if TcpStream::connect(addr).is_ok() {
        thread::sleep(Duration::from_millis(300));
        assert_eq!(server.session_manager().active_session_count(), 0);
    }
}
