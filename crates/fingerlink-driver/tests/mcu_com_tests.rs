//! McuCom 集成测试（MockChannel 模拟 MCU）

use fingerlink_driver::{
    AckFailure, AckHandlers, ComConfig, DriverError, ManualClock, McuCom, McuComBuilder, Severity,
};
use fingerlink_protocol::*;
use fingerlink_serial::{ComChannel, Direction, MockChannel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// 对每个请求回送同 ID、同字段的 RESPONSE；`tweak` 可修改应答
fn responder(
    tweak: impl Fn(&Message) -> Option<Message> + Send + 'static,
) -> impl FnMut(&[u8]) -> Vec<u8> + Send + 'static {
    let mut decoder = FrameDecoder::new();
    move |bytes| {
        decoder
            .push(bytes)
            .into_iter()
            .flatten()
            .filter(|m| m.kind() == MessageKind::Request)
            .filter_map(|req| tweak(&req))
            .flat_map(|resp| encode_frame(&resp))
            .collect()
    }
}

fn echo(req: &Message) -> Option<Message> {
    Message::response_to(req, MessageKind::Response, req.prototype(), req.values().to_vec()).ok()
}

fn build(channel: Arc<MockChannel>) -> Arc<McuCom> {
    McuComBuilder::new()
        .channel(channel)
        .without_heartbeat()
        .build()
        .unwrap()
}

#[test]
fn test_send_and_wait_echo() {
    let channel = Arc::new(MockChannel::new(responder(echo)));
    let com = build(channel.clone());

    let sent = Arc::new(AtomicUsize::new(0));
    let received = Arc::new(AtomicUsize::new(0));
    let s = sent.clone();
    com.add_send_listener(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    let r = received.clone();
    com.add_receive_listener(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    let (request, response) = com
        .send_and_wait(create_heartbeat(MessageKind::Request, 21))
        .unwrap();
    assert_eq!(request.number(), response.number());
    assert_eq!(response.get_i8("rand").unwrap(), 21);

    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert_eq!(received.load(Ordering::SeqCst), 1);

    let history = com.message_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].direction, Direction::Sent);
    assert_eq!(history[1].direction, Direction::Received);
    assert_eq!(com.pending_count(), 0);
    assert_eq!(channel.history().len(), 2);
}

#[test]
fn test_retries_then_timeout_with_manual_clock() {
    let channel = Arc::new(MockChannel::silent());
    let clock = Arc::new(ManualClock::new(0));
    let com = McuComBuilder::new()
        .channel(channel.clone())
        .clock(clock.clone())
        .without_heartbeat()
        .build()
        .unwrap();

    let failure: Arc<Mutex<Option<AckFailure>>> = Arc::new(Mutex::new(None));
    let slot = failure.clone();
    com.send(
        create_stop(MessageKind::Request, 0),
        true,
        AckHandlers::new()
            .on_success(|_, _| panic!("silent channel cannot answer"))
            .on_failure(move |_, f| *slot.lock() = Some(f.clone())),
    )
    .unwrap();

    for _ in 0..4 {
        com.poll();
        clock.advance(1000);
    }
    com.poll();

    assert_eq!(channel.sent_count(), 4);
    assert_eq!(*failure.lock(), Some(AckFailure::Timeout { attempts: 4 }));
    assert_eq!(com.pending_count(), 0);
}

#[test]
fn test_error_response_fails_wait() {
    let channel = Arc::new(MockChannel::new(responder(|req| {
        Message::response_to(req, MessageKind::Error, req.prototype(), req.values().to_vec()).ok()
    })));
    let com = build(channel);

    let err = com
        .send_and_wait(create_clear_control_queue(MessageKind::Request, 1))
        .unwrap_err();
    assert!(matches!(err, DriverError::ErrorResponse { .. }));
}

#[test]
fn test_heartbeat_mismatch_is_reported() {
    let channel = Arc::new(MockChannel::new(responder(|req| {
        let rand = req.get_i8("rand").ok()?;
        let mut resp = create_heartbeat(MessageKind::Response, rand.wrapping_add(1));
        resp.set_number(req.number());
        Some(resp)
    })));
    let com = McuComBuilder::new()
        .channel(channel)
        .heartbeat_interval_ms(0)
        .build()
        .unwrap();

    // 第一次 tick 发出心跳，第二次 tick 处理应答
    com.tick();
    com.tick();

    let warnings = com.reporter().records_with(Severity::Warning);
    assert!(
        warnings.iter().any(|r| r.message.contains("Heartbeat mismatch")),
        "warnings: {warnings:?}"
    );
}

#[test]
fn test_heartbeat_echo_is_silent() {
    let channel = Arc::new(MockChannel::new(responder(echo)));
    let com = McuComBuilder::new()
        .channel(channel.clone())
        .heartbeat_interval_ms(0)
        .build()
        .unwrap();

    for _ in 0..5 {
        com.tick();
    }
    assert!(channel.sent_count() >= 4);
    assert!(com.reporter().is_empty());
}

#[test]
fn test_default_handlers() {
    let channel = Arc::new(MockChannel::silent());
    let com = build(channel.clone());

    channel.inject(&encode_frame(&create_error_message(MessageKind::Request, 7)));
    channel.inject(&encode_frame(&create_control_done(MessageKind::Request, true, 1500, 6)));
    channel.inject(&encode_frame(&create_control_done(MessageKind::Request, false, 20, 1)));
    assert_eq!(com.poll(), 3);

    let records = com.reporter().records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].severity, Severity::Error);
    assert!(records[0].message.contains('7'));
    assert_eq!(records[1].severity, Severity::Info);
    assert!(records[1].message.contains("6 commands in 1500 ms"));
    assert_eq!(records[2].severity, Severity::Warning);
}

#[test]
fn test_handlers_receive_incoming_by_id() {
    let channel = Arc::new(MockChannel::silent());
    let com = build(channel.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    com.add_handler(ID_SENSOR_DATASTREAM, move |msg| {
        s.lock().push(msg.get_f32("data").unwrap());
    });

    channel.inject(&encode_frame(&create_sensor_datastream(MessageKind::Request, 0, 1.5)));
    channel.inject(&encode_frame(&create_stop_sensor_datastream(MessageKind::Request, 0)));
    channel.inject(&encode_frame(&create_sensor_datastream(MessageKind::Request, 1, 2.5)));
    com.poll();

    assert_eq!(*seen.lock(), vec![1.5, 2.5]);
}

#[test]
fn test_malformed_frame_is_reported() {
    let channel = Arc::new(MockChannel::silent());
    let com = build(channel.clone());

    let mut frame = encode_frame(&create_stop(MessageKind::Request, 1));
    let last = frame.len() - 1;
    frame[last] ^= 0x55;
    channel.inject(&frame);
    com.poll();

    assert_eq!(com.reporter().records_with(Severity::Warning).len(), 1);
}

#[test]
fn test_closed_channel() {
    let channel = Arc::new(MockChannel::silent());
    channel.set_open(false);
    let com = build(channel.clone());

    let err = com
        .send(create_stop(MessageKind::Request, 0), false, AckHandlers::new())
        .unwrap_err();
    assert!(matches!(err, DriverError::Channel(_)));

    // 需要应答时不返回错误，交由应答层重试
    assert!(com.send(create_stop(MessageKind::Request, 0), true, AckHandlers::new()).is_ok());
    assert_eq!(com.pending_count(), 1);
    assert_eq!(com.message_history().len(), 2);
}

#[test]
fn test_zero_reports_response() {
    let channel = Arc::new(MockChannel::new(responder(|req| {
        let mut resp = create_zero_command(MessageKind::Response, true);
        resp.set_number(req.number());
        Some(resp)
    })));
    let com = build(channel);

    com.zero();
    com.poll();
    let info = com.reporter().records_with(Severity::Info);
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].message, "Zeroing started");
}

#[test]
fn test_worker_wait_while_main_loop_ticks() {
    let channel = Arc::new(MockChannel::new(responder(echo)));
    let com = build(channel);

    let worker = {
        let com = Arc::clone(&com);
        thread::spawn(move || {
            (0..20)
                .map(|i| com.send_and_wait(create_motor_control(MessageKind::Request, 0, 0, i as f32, false)))
                .filter(Result::is_ok)
                .count()
        })
    };

    while !worker.is_finished() {
        com.tick();
    }
    assert_eq!(worker.join().unwrap(), 20);
    assert_eq!(com.pending_count(), 0);
}

#[test]
fn test_config_flows_into_ack_layer() {
    let channel = Arc::new(MockChannel::silent());
    let clock = Arc::new(ManualClock::new(0));
    let config = ComConfig {
        max_retries: 0,
        retry_timeout_ms: 10,
        heartbeat_enabled: false,
        ..ComConfig::default()
    };
    let com = McuComBuilder::new()
        .config(config)
        .channel(channel.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    com.send(create_stop(MessageKind::Request, 0), true, AckHandlers::new())
        .unwrap();
    clock.advance(10);
    com.poll();

    assert_eq!(channel.sent_count(), 1);
    let warnings = com.reporter().records_with(Severity::Warning);
    assert!(warnings[0].message.contains("no response after 1 attempts"));
}

/// 把每个应答拆成两段交付；第一段的 `receive` 在返回前停顿，模拟调度延迟
struct SplitReplyChannel {
    decoder: Mutex<FrameDecoder>,
    chunks: Mutex<std::collections::VecDeque<(Vec<u8>, std::time::Duration)>>,
}

impl SplitReplyChannel {
    fn new() -> Self {
        Self {
            decoder: Mutex::new(FrameDecoder::new()),
            chunks: Mutex::new(std::collections::VecDeque::new()),
        }
    }
}

impl ComChannel for SplitReplyChannel {
    fn send(&self, bytes: &[u8]) -> Result<(), fingerlink_serial::ChannelError> {
        let requests: Vec<Message> = self.decoder.lock().push(bytes).into_iter().flatten().collect();
        let mut chunks = self.chunks.lock();
        for request in requests {
            if let Some(reply) = echo(&request) {
                let frame = encode_frame(&reply);
                let (head, tail) = frame.split_at(3);
                chunks.push_back((head.to_vec(), std::time::Duration::from_millis(200)));
                chunks.push_back((tail.to_vec(), std::time::Duration::ZERO));
            }
        }
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, fingerlink_serial::ChannelError> {
        let next = self.chunks.lock().pop_front();
        match next {
            Some((chunk, delay)) => {
                thread::sleep(delay);
                Ok(chunk)
            },
            None => Ok(Vec::new()),
        }
    }

    fn is_open(&self) -> bool {
        true
    }

    fn add_observer(&self, _direction: Direction, _observer: fingerlink_serial::ByteObserver) {}

    fn history(&self) -> Vec<fingerlink_serial::HistoryEntry> {
        Vec::new()
    }

    fn clear_history(&self) {}
}

#[test]
fn test_concurrent_polls_keep_receive_order() {
    let channel = Arc::new(SplitReplyChannel::new());
    let com = McuComBuilder::new()
        .channel(channel)
        .without_heartbeat()
        .build()
        .unwrap();

    let acked = Arc::new(AtomicUsize::new(0));
    let a = acked.clone();
    com.send(
        create_heartbeat(MessageKind::Request, 7),
        true,
        AckHandlers::new().on_success(move |_, _| {
            a.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    // 第一个 poll 取走前半帧后停顿，第二个 poll 在此期间取后半帧
    let first = {
        let com = com.clone();
        thread::spawn(move || com.poll())
    };
    thread::sleep(std::time::Duration::from_millis(50));
    com.poll();
    first.join().unwrap();

    assert_eq!(acked.load(Ordering::SeqCst), 1);
    assert_eq!(com.pending_count(), 0);
    assert!(com.reporter().is_empty());
}
