//! Drives the dispatcher the way the wire layer would — one `Command`
//! at a time, on connections identified only by a [`ConnId`] — without
//! any sockets.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::queue::NullQueue;
use crate::types::job::{JobHandle, Priority};
use crate::wire::protocol::{AdminCommand, Command, Response, SubmitJob};

struct Harness {
    dispatcher: Dispatcher,
    next_id: ConnId,
}

impl Harness {
    async fn new() -> Self {
        let (dispatcher, _handle, _rx) = Dispatcher::new(
            "host".to_string(),
            Box::new(NullQueue::default()),
            CancellationToken::new(),
            64,
        )
        .await
        .unwrap();
        Self { dispatcher, next_id: 1 }
    }

    async fn connect(&mut self) -> (ConnId, mpsc::Receiver<Response>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = mpsc::channel(64);
        self.dispatcher.on_connect(id, None, tx, CancellationToken::new()).await;
        (id, rx)
    }

    async fn command(&mut self, id: ConnId, cmd: Command) {
        self.dispatcher.on_command(id, cmd).await;
    }

    async fn disconnect(&mut self, id: ConnId) {
        self.dispatcher.on_disconnect(id).await;
    }

    fn job_exists(&self, handle: &Bytes) -> bool {
        self.dispatcher.server.jobs.contains_key(&job_handle(handle))
    }
}

fn job_handle(b: &Bytes) -> JobHandle {
    JobHandle::from(String::from_utf8_lossy(b).into_owned())
}

fn can_do(function: &str) -> Command {
    Command::CanDo { function: Bytes::copy_from_slice(function.as_bytes()) }
}

fn submit(function: &str, unique: &str, data: &str, priority: Priority, background: bool) -> Command {
    Command::SubmitJob(SubmitJob {
        function: Bytes::copy_from_slice(function.as_bytes()),
        unique: Bytes::copy_from_slice(unique.as_bytes()),
        priority,
        background,
        when: None,
        reducer: None,
        workload: Bytes::copy_from_slice(data.as_bytes()),
    })
}

async fn expect_job_created(rx: &mut mpsc::Receiver<Response>) -> Bytes {
    match rx.recv().await.expect("channel closed before JOB_CREATED") {
        Response::JobCreated { handle } => handle,
        other => panic!("expected JobCreated, got {other:?}"),
    }
}

async fn expect_job_assign(rx: &mut mpsc::Receiver<Response>) -> (Bytes, Bytes, Bytes) {
    match rx.recv().await.expect("channel closed before JOB_ASSIGN") {
        Response::JobAssign { handle, function, workload } => (handle, function, workload),
        other => panic!("expected JobAssign, got {other:?}"),
    }
}

#[tokio::test]
async fn round_trip_submit_grab_complete() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(client, submit("reverse", "", "hello", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(worker, can_do("reverse")).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned_handle, function, workload) = expect_job_assign(&mut worker_rx).await;
    assert_eq!(assigned_handle, handle);
    assert_eq!(function, Bytes::from_static(b"reverse"));
    assert_eq!(workload, Bytes::from_static(b"hello"));

    h.command(worker, Command::WorkComplete { handle: handle.clone(), data: Bytes::from_static(b"olleh") })
        .await;
    match client_rx.recv().await.unwrap() {
        Response::WorkComplete { handle: h2, data } => {
            assert_eq!(h2, handle);
            assert_eq!(data, Bytes::from_static(b"olleh"));
        },
        other => panic!("expected WorkComplete, got {other:?}"),
    }
    assert!(!h.job_exists(&handle), "job should be removed from the registry once complete");
}

#[tokio::test]
async fn coalescing_same_unique_shares_one_job() {
    let mut h = Harness::new().await;
    let (c1, mut c1_rx) = h.connect().await;
    let (c2, mut c2_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(c1, submit("f", "u", "x", Priority::Normal, false)).await;
    let h1 = expect_job_created(&mut c1_rx).await;
    h.command(c2, submit("f", "u", "y", Priority::Normal, false)).await;
    let h2 = expect_job_created(&mut c2_rx).await;
    assert_eq!(h1, h2, "both submits with the same unique must share one handle");

    h.command(worker, can_do("f")).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned, _function, _workload) = expect_job_assign(&mut worker_rx).await;

    h.command(worker, Command::WorkComplete { handle: assigned, data: Bytes::from_static(b"z") }).await;

    for rx in [&mut c1_rx, &mut c2_rx] {
        match rx.recv().await.unwrap() {
            Response::WorkComplete { handle, data } => {
                assert_eq!(handle, h1);
                assert_eq!(data, Bytes::from_static(b"z"));
            },
            other => panic!("expected WorkComplete, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn background_job_survives_client_disconnect() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(client, submit("wc", "", "a b c", Priority::Normal, true)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.disconnect(client).await;
    assert!(h.job_exists(&handle), "background job must outlive its submitting client");

    h.command(worker, can_do("wc")).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker_rx).await;
    assert_eq!(assigned, handle);

    h.command(worker, Command::WorkComplete { handle: assigned, data: Bytes::new() }).await;
    assert!(!h.job_exists(&handle));
}

#[tokio::test]
async fn priority_ordering_high_then_normal_then_low() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    let order = [Priority::Low, Priority::Normal, Priority::High, Priority::Normal, Priority::Low, Priority::High];
    let mut handles = Vec::new();
    for (i, pri) in order.iter().enumerate() {
        h.command(client, submit("cold", "", &format!("job{i}"), *pri, false)).await;
        handles.push(expect_job_created(&mut client_rx).await);
    }

    h.command(worker, can_do("cold")).await;

    let mut assigned = Vec::new();
    for _ in 0..order.len() {
        h.command(worker, Command::GrabJob).await;
        let (handle, ..) = expect_job_assign(&mut worker_rx).await;
        assigned.push(handle);
    }

    // submission order was L, N, H, N, L, H (indices 0..6); expected
    // hand-out order is H, H, N, N, L, L.
    let expect_order = [2, 5, 1, 3, 0, 4];
    let expected: Vec<Bytes> = expect_order.iter().map(|&i| handles[i].clone()).collect();
    assert_eq!(assigned, expected);
}

#[tokio::test]
async fn status_reflects_work_status_then_clears_on_completion() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(client, submit("f", "", "x", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(worker, can_do("f")).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker_rx).await;

    h.command(worker, Command::WorkStatus { handle: assigned.clone(), numerator: 2, denominator: 5 }).await;
    match client_rx.recv().await.unwrap() {
        Response::WorkStatus { numerator, denominator, .. } => {
            assert_eq!((numerator, denominator), (2, 5));
        },
        other => panic!("expected WorkStatus, got {other:?}"),
    }

    h.command(client, Command::GetStatus { handle: handle.clone() }).await;
    match client_rx.recv().await.unwrap() {
        Response::StatusRes { known, running, numerator, denominator, .. } => {
            assert!(known);
            assert!(running);
            assert_eq!((numerator, denominator), (2, 5));
        },
        other => panic!("expected StatusRes, got {other:?}"),
    }

    h.command(worker, Command::WorkComplete { handle: assigned, data: Bytes::new() }).await;
    let _ = client_rx.recv().await; // WORK_COMPLETE

    h.command(client, Command::GetStatus { handle }).await;
    match client_rx.recv().await.unwrap() {
        Response::StatusRes { known, .. } => assert!(!known),
        other => panic!("expected StatusRes, got {other:?}"),
    }
}

#[tokio::test]
async fn wake_discipline_sends_one_noop_per_sleeping_worker() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;

    let mut workers = Vec::new();
    for _ in 0..3 {
        let (id, rx) = h.connect().await;
        h.command(id, can_do("f")).await;
        h.command(id, Command::PreSleep).await;
        workers.push((id, rx));
    }

    h.command(client, submit("f", "", "p", Priority::Normal, false)).await;
    let _ = expect_job_created(&mut client_rx).await;

    for (_, rx) in workers.iter_mut() {
        match rx.try_recv() {
            Ok(Response::Noop) => {},
            other => panic!("expected exactly one Noop, got {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "expected exactly one Noop per sleeping worker");
    }

    let mut assigns = 0;
    let mut no_jobs = 0;
    for (id, mut rx) in workers {
        h.command(id, Command::GrabJob).await;
        match rx.recv().await.unwrap() {
            Response::JobAssign { .. } => assigns += 1,
            Response::NoJob => no_jobs += 1,
            other => panic!("unexpected response: {other:?}"),
        }
    }
    assert_eq!(assigns, 1, "exactly one worker should win the job");
    assert_eq!(no_jobs, 2);
}

#[tokio::test]
async fn worker_disconnect_requeues_job_at_head() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker1, mut worker1_rx) = h.connect().await;
    let (worker2, mut worker2_rx) = h.connect().await;

    h.command(client, submit("f", "", "first", Priority::Normal, true)).await;
    let first = expect_job_created(&mut client_rx).await;
    h.command(client, submit("f", "unique-2", "second", Priority::Normal, true)).await;
    let _second = expect_job_created(&mut client_rx).await;

    h.command(worker1, can_do("f")).await;
    h.command(worker1, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker1_rx).await;
    assert_eq!(assigned, first);

    h.disconnect(worker1).await;

    h.command(worker2, can_do("f")).await;
    h.command(worker2, Command::GrabJob).await;
    let (reassigned, ..) = expect_job_assign(&mut worker2_rx).await;
    assert_eq!(reassigned, first, "the abandoned job must be handed out before the one behind it");
}

#[tokio::test]
async fn max_queue_size_rejects_submit_once_full() {
    let mut h = Harness::new().await;
    let (admin, mut admin_rx) = h.connect().await;
    let (client, mut client_rx) = h.connect().await;

    h.command(
        admin,
        Command::Admin(AdminCommand::MaxQueue { function: Bytes::from_static(b"f"), sizes: vec![1] }),
    )
    .await;
    match admin_rx.recv().await.unwrap() {
        Response::AdminLine(line) => assert_eq!(&line[..], b"OK"),
        other => panic!("expected AdminLine, got {other:?}"),
    }

    h.command(client, submit("f", "", "first", Priority::Normal, false)).await;
    let _ = expect_job_created(&mut client_rx).await;

    h.command(client, submit("f", "unique-2", "second", Priority::Normal, false)).await;
    match client_rx.recv().await.unwrap() {
        Response::Error { code, .. } => assert_eq!(&code[..], b"queue_full"),
        other => panic!("expected Error(queue_full), got {other:?}"),
    }
}

#[tokio::test]
async fn admin_status_reports_totals_per_function() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;
    let (other_worker, _other_worker_rx) = h.connect().await;

    for i in 0..4 {
        h.command(client, submit("f", &format!("u{i}"), "x", Priority::Normal, false)).await;
        let _ = expect_job_created(&mut client_rx).await;
    }

    h.command(worker, can_do("f")).await;
    h.command(other_worker, can_do("f")).await;
    h.command(worker, Command::GrabJob).await;
    let _ = expect_job_assign(&mut worker_rx).await;

    h.command(client, Command::Admin(AdminCommand::Status)).await;
    match client_rx.recv().await.unwrap() {
        Response::AdminTable(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(&rows[0][..], b"f\t4\t1\t2");
        },
        other => panic!("expected AdminTable, got {other:?}"),
    }
}

#[tokio::test]
async fn delayed_job_promoted_to_ready_when_due() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(worker, can_do("delayed")).await;
    h.command(worker, Command::PreSleep).await;

    let due = crate::time::unix_epoch_secs() + 1;
    h.command(
        client,
        Command::SubmitJob(SubmitJob {
            function: Bytes::from_static(b"delayed"),
            unique: Bytes::new(),
            priority: Priority::Normal,
            background: false,
            when: Some(due),
            reducer: None,
            workload: Bytes::from_static(b"later"),
        }),
    )
    .await;
    let handle = expect_job_created(&mut client_rx).await;

    // A tick before the deadline must not promote or wake anyone.
    h.dispatcher.promote_delayed_jobs(tokio::time::Instant::now()).await;
    assert!(worker_rx.try_recv().is_err(), "worker must not be woken before the delay elapses");

    h.dispatcher.promote_delayed_jobs(tokio::time::Instant::now() + std::time::Duration::from_secs(2)).await;

    match worker_rx.recv().await.unwrap() {
        Response::Noop => {},
        other => panic!("expected Noop once the delayed job comes due, got {other:?}"),
    }

    h.command(worker, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker_rx).await;
    assert_eq!(assigned, handle);
}

#[tokio::test]
async fn can_do_timeout_requeues_job_and_disconnects_worker() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(client, submit("slow", "", "x", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(worker, Command::CanDoTimeout { function: Bytes::from_static(b"slow"), timeout: 0 }).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker_rx).await;
    assert_eq!(assigned, handle);

    assert!(!h.dispatcher.server.connections.get(&worker).unwrap().disconnect.is_cancelled());

    h.dispatcher
        .expire_timed_out_jobs(tokio::time::Instant::now() + std::time::Duration::from_millis(1))
        .await;

    assert!(
        h.dispatcher.server.connections.get(&worker).unwrap().disconnect.is_cancelled(),
        "worker that exceeded its CAN_DO_TIMEOUT must be disconnected"
    );
    assert!(h.job_exists(&handle), "a timed-out job must be requeued, not dropped");

    let (worker2, mut worker2_rx) = h.connect().await;
    h.command(worker2, can_do("slow")).await;
    h.command(worker2, Command::GrabJob).await;
    let (reassigned, ..) = expect_job_assign(&mut worker2_rx).await;
    assert_eq!(reassigned, handle, "the requeued job must be handed out again");
}

#[tokio::test]
async fn grab_job_uniq_includes_unique_field() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(client, submit("f", "my-unique", "payload", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(worker, can_do("f")).await;
    h.command(worker, Command::GrabJobUniq).await;
    match worker_rx.recv().await.unwrap() {
        Response::JobAssignUniq { handle: assigned, function, unique, workload } => {
            assert_eq!(assigned, handle);
            assert_eq!(function, Bytes::from_static(b"f"));
            assert_eq!(unique, Bytes::from_static(b"my-unique"));
            assert_eq!(workload, Bytes::from_static(b"payload"));
        },
        other => panic!("expected JobAssignUniq, got {other:?}"),
    }
}

#[tokio::test]
async fn grab_job_all_includes_unique_and_reducer() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(
        client,
        Command::SubmitJob(SubmitJob {
            function: Bytes::from_static(b"map_fn"),
            unique: Bytes::from_static(b"r-unique"),
            priority: Priority::Normal,
            background: false,
            when: None,
            reducer: Some(Bytes::from_static(b"reduce_fn")),
            workload: Bytes::from_static(b"chunk"),
        }),
    )
    .await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(worker, can_do("map_fn")).await;
    h.command(worker, Command::GrabJobAll).await;
    match worker_rx.recv().await.unwrap() {
        Response::JobAssignAll { handle: assigned, function, unique, reducer, workload } => {
            assert_eq!(assigned, handle);
            assert_eq!(function, Bytes::from_static(b"map_fn"));
            assert_eq!(unique, Bytes::from_static(b"r-unique"));
            assert_eq!(reducer, Bytes::from_static(b"reduce_fn"));
            assert_eq!(workload, Bytes::from_static(b"chunk"));
        },
        other => panic!("expected JobAssignAll, got {other:?}"),
    }
}

#[tokio::test]
async fn get_status_unique_known_then_unknown() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;

    h.command(client, submit("f", "the-unique", "x", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;

    h.command(
        client,
        Command::GetStatusUnique { function: Bytes::from_static(b"f"), unique: Bytes::from_static(b"the-unique") },
    )
    .await;
    match client_rx.recv().await.unwrap() {
        Response::StatusRes { handle: h2, known, running, .. } => {
            assert_eq!(h2, handle);
            assert!(known);
            assert!(!running);
        },
        other => panic!("expected StatusRes, got {other:?}"),
    }

    h.command(
        client,
        Command::GetStatusUnique { function: Bytes::from_static(b"f"), unique: Bytes::from_static(b"no-such-unique") },
    )
    .await;
    match client_rx.recv().await.unwrap() {
        Response::StatusRes { known, .. } => assert!(!known),
        other => panic!("expected StatusRes, got {other:?}"),
    }
}

#[tokio::test]
async fn option_req_exceptions_then_unknown_option() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;

    h.command(client, Command::OptionReq { option: Bytes::from_static(b"exceptions") }).await;
    match client_rx.recv().await.unwrap() {
        Response::OptionRes { option } => assert_eq!(option, Bytes::from_static(b"exceptions")),
        other => panic!("expected OptionRes, got {other:?}"),
    }
    assert!(h.dispatcher.server.connections.get(&client).unwrap().exceptions);

    h.command(client, Command::OptionReq { option: Bytes::from_static(b"bogus") }).await;
    match client_rx.recv().await.unwrap() {
        Response::Error { code, .. } => assert_eq!(&code[..], b"unknown_option"),
        other => panic!("expected Error(unknown_option), got {other:?}"),
    }
}

#[tokio::test]
async fn echo_req_round_trip() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;

    h.command(client, Command::EchoReq { data: Bytes::from_static(b"ping") }).await;
    match client_rx.recv().await.unwrap() {
        Response::EchoRes { data } => assert_eq!(data, Bytes::from_static(b"ping")),
        other => panic!("expected EchoRes, got {other:?}"),
    }
}

#[tokio::test]
async fn reset_abilities_clears_every_registered_function() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(worker, can_do("f1")).await;
    h.command(worker, can_do("f2")).await;
    h.command(worker, Command::ResetAbilities).await;

    h.command(client, submit("f1", "", "x", Priority::Normal, false)).await;
    let _ = expect_job_created(&mut client_rx).await;
    h.command(client, submit("f2", "", "y", Priority::Normal, false)).await;
    let _ = expect_job_created(&mut client_rx).await;

    h.command(worker, Command::GrabJob).await;
    match worker_rx.recv().await.unwrap() {
        Response::NoJob => {},
        other => panic!("worker with reset abilities must not be assigned any job, got {other:?}"),
    }
}

#[tokio::test]
async fn cant_do_removes_a_single_ability() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (worker, mut worker_rx) = h.connect().await;

    h.command(worker, can_do("f1")).await;
    h.command(worker, can_do("f2")).await;
    h.command(worker, Command::CantDo { function: Bytes::from_static(b"f1") }).await;

    h.command(client, submit("f1", "", "x", Priority::Normal, false)).await;
    let _ = expect_job_created(&mut client_rx).await;

    h.command(worker, Command::GrabJob).await;
    match worker_rx.recv().await.unwrap() {
        Response::NoJob => {},
        other => panic!("worker that dropped f1 must not be assigned an f1 job, got {other:?}"),
    }

    h.command(client, submit("f2", "", "y", Priority::Normal, false)).await;
    let handle = expect_job_created(&mut client_rx).await;
    h.command(worker, Command::GrabJob).await;
    let (assigned, ..) = expect_job_assign(&mut worker_rx).await;
    assert_eq!(assigned, handle, "f2 must still be assignable after CANT_DO f1");
}

#[tokio::test]
async fn reduce_job_delivers_single_child_result() {
    let mut h = Harness::new().await;
    let (client, mut client_rx) = h.connect().await;
    let (mapper, mut mapper_rx) = h.connect().await;
    let (reducer, mut reducer_rx) = h.connect().await;

    h.command(mapper, can_do("map_fn")).await;
    h.command(reducer, can_do("reduce_fn")).await;

    h.command(
        client,
        Command::SubmitJob(SubmitJob {
            function: Bytes::from_static(b"map_fn"),
            unique: Bytes::new(),
            priority: Priority::Normal,
            background: false,
            when: None,
            reducer: Some(Bytes::from_static(b"reduce_fn")),
            workload: Bytes::from_static(b"input"),
        }),
    )
    .await;
    let parent_handle = expect_job_created(&mut client_rx).await;

    h.command(mapper, Command::GrabJob).await;
    let (map_handle, map_function, _) = expect_job_assign(&mut mapper_rx).await;
    assert_eq!(map_handle, parent_handle);
    assert_eq!(map_function, Bytes::from_static(b"map_fn"));

    h.command(mapper, Command::WorkComplete { handle: map_handle, data: Bytes::from_static(b"mapped") }).await;

    // The parent job is still alive, now waiting on its synthesized
    // reduce-phase child rather than reporting completion yet.
    assert!(h.job_exists(&parent_handle));
    assert!(client_rx.try_recv().is_err(), "client must not see a result until the reduce phase finishes");

    h.command(reducer, Command::GrabJob).await;
    let (child_handle, child_function, child_workload) = expect_job_assign(&mut reducer_rx).await;
    assert_eq!(child_function, Bytes::from_static(b"reduce_fn"));
    assert_eq!(child_workload, Bytes::from_static(b"mapped"));
    assert_ne!(child_handle, parent_handle, "the reduce phase runs as its own synthesized job");

    h.command(reducer, Command::WorkComplete { handle: child_handle, data: Bytes::from_static(b"reduced") }).await;

    match client_rx.recv().await.unwrap() {
        Response::WorkComplete { handle, data } => {
            assert_eq!(handle, parent_handle);
            assert_eq!(data, Bytes::from_static(b"reduced"));
        },
        other => panic!("expected WorkComplete carrying the reducer's output, got {other:?}"),
    }
    assert!(!h.job_exists(&parent_handle));
}
