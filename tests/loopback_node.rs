// Both nodes wired over the loopback radio.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use lora_batch::{
    advanced::async_node::spawn_async_node,
    component_a::{
        sensor::{SensorError, SimulatedSensor},
        transmitter::{Transmitter, TxOutcome},
    },
    component_b::{
        publisher::{ChannelPublisher, DecodedBatch},
        receiver::{FrameReceiver, RxOutcome},
    },
    config::NodeConfig,
    link::{
        LinkLayer,
        loopback::{LoopbackConfig, LoopbackLink},
    },
    protocol::{batch::shared_batch, layout::CAPACITY, reading::Reading},
    simulation::run_loopback,
    utils::metrics::{EventRecorder, LinkMetrics},
};

fn fast_config() -> NodeConfig {
    let mut c = NodeConfig::with_tx_period(Duration::from_millis(300));
    c.rx_poll_period = Duration::from_millis(10);
    c
}

fn linked(config: &NodeConfig, link: LoopbackConfig) -> (LoopbackLink, LoopbackLink) {
    LoopbackLink::pair(
        config.local_address,
        config.destination,
        config.channel,
        link,
    )
}

#[test]
fn back_to_back_full_batches_arrive_in_order() {
    let config = fast_config();
    let (tx_link, rx_link) = linked(&config, LoopbackConfig::default());
    let batch = shared_batch();
    let running = Arc::new(AtomicBool::new(true));

    let mut transmitter = Transmitter::new(
        tx_link,
        batch.clone(),
        &config,
        running.clone(),
        LinkMetrics::new_shared(),
        Arc::new(EventRecorder::new()),
    );
    let (publisher, published) = ChannelPublisher::new(8);
    let rx_metrics = LinkMetrics::new_shared();
    let mut receiver = FrameReceiver::new(
        rx_link,
        publisher,
        config.rx_poll_period,
        running,
        rx_metrics.clone(),
        Arc::new(EventRecorder::new()),
    );

    for round in 0..3u32 {
        {
            let mut b = batch.lock();
            for i in 0..CAPACITY {
                assert!(b.append(Reading::new(round as f32, i as f32)));
            }
            assert!(b.is_full());
        }
        assert_eq!(
            transmitter.tick(),
            TxOutcome::Sent {
                sequence: round,
                readings: CAPACITY as u8
            }
        );
        assert!(matches!(receiver.poll(), RxOutcome::Received { .. }));
    }

    let got: Vec<DecodedBatch> = published.try_iter().collect();
    assert_eq!(got.len(), 3);
    for (round, d) in got.iter().enumerate() {
        assert_eq!(d.sequence, round as u32);
        assert_eq!(d.readings.len(), CAPACITY);
        for (i, r) in d.readings.iter().enumerate() {
            assert_eq!(*r, Reading::new(round as f32, i as f32));
        }
    }
    assert_eq!(rx_metrics.snapshot().sequence_gaps, 0);
}

#[test]
fn sequence_advances_even_when_every_send_fails() {
    let config = fast_config();
    let (tx_link, rx_link) = linked(
        &config,
        LoopbackConfig {
            send_failure_rate: 1.0,
            ..LoopbackConfig::default()
        },
    );
    let batch = shared_batch();
    let metrics = LinkMetrics::new_shared();
    let mut transmitter = Transmitter::new(
        tx_link,
        batch.clone(),
        &config,
        Arc::new(AtomicBool::new(true)),
        metrics.clone(),
        Arc::new(EventRecorder::new()),
    );

    batch.lock().append(Reading::new(20.0, 50.0));
    for expected in 0..4u32 {
        let outcome = transmitter.tick();
        assert!(matches!(outcome, TxOutcome::Failed { .. }));
        assert_eq!(outcome.sequence(), expected);
        assert!(batch.lock().is_empty());
    }
    assert_eq!(batch.lock().sequence(), 4);

    let snap = metrics.snapshot();
    assert_eq!(snap.send_failures, 4);
    assert_eq!(snap.frames_sent, 0);
    assert!(!rx_link.available());
}

#[test]
fn threaded_nodes_deliver_consecutive_sequences() {
    let config = fast_config();
    let (publisher, published) = ChannelPublisher::new(64);

    let report = run_loopback(
        &config,
        LoopbackConfig::default(),
        SimulatedSensor::new(),
        publisher,
        Duration::from_millis(1_100),
    );

    let tx = report.tx();
    let rx = report.rx();
    assert!(tx.frames_sent >= 2, "{:?}", tx);
    assert_eq!(tx.send_failures, 0);
    assert!(rx.frames_received <= tx.frames_sent);
    assert_eq!(rx.sequence_gaps, 0);

    let got: Vec<DecodedBatch> = published.try_iter().collect();
    assert_eq!(got.len() as u64, rx.frames_received);
    for (i, d) in got.iter().enumerate() {
        assert_eq!(d.sequence, i as u32);
        assert!(d.readings.len() <= CAPACITY);
    }
}

#[test]
fn oversampling_saturates_and_counts_drops() {
    let mut config = fast_config();
    config.sample_period /= 4;
    assert!(!config.validate().is_empty());

    let (publisher, published) = ChannelPublisher::new(64);
    let report = run_loopback(
        &config,
        LoopbackConfig::default(),
        SimulatedSensor::new(),
        publisher,
        Duration::from_millis(700),
    );

    let tx = report.tx();
    assert!(tx.saturation_drops > 0, "{:?}", tx);
    assert!(tx.samples_appended >= CAPACITY as u64);

    let got: Vec<DecodedBatch> = published.try_iter().collect();
    assert!(!got.is_empty());
    assert!(got.iter().all(|d| d.readings.len() == CAPACITY));
}

#[test]
fn unavailable_sensor_sends_empty_frames() {
    let config = fast_config();
    let (publisher, published) = ChannelPublisher::new(64);

    let report = run_loopback(
        &config,
        LoopbackConfig::default(),
        || Err::<Reading, _>(SensorError::Unavailable("bus fault".into())),
        publisher,
        Duration::from_millis(700),
    );

    let tx = report.tx();
    assert_eq!(tx.samples_appended, 0);
    assert!(tx.sensor_unavailable > 0);
    assert!(published.try_iter().all(|d| d.readings.is_empty()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_node_feeds_threaded_receiver() {
    let mut config = NodeConfig::with_tx_period(Duration::from_millis(200));
    config.link_timeout = Duration::from_millis(50);
    let (tx_link, rx_link) = linked(&config, LoopbackConfig::default());

    let running = Arc::new(AtomicBool::new(true));
    let metrics = LinkMetrics::new_shared();
    let (sampler, transmitter) = spawn_async_node(
        &config,
        SimulatedSensor::new(),
        tx_link,
        shared_batch(),
        running.clone(),
        metrics.clone(),
        Arc::new(EventRecorder::new()),
    );

    tokio::time::sleep(Duration::from_millis(700)).await;
    running.store(false, Ordering::Relaxed);
    sampler.await.expect("sampler task");
    transmitter.await.expect("transmitter task");

    let (publisher, published) = ChannelPublisher::new(16);
    let mut receiver = FrameReceiver::new(
        rx_link,
        publisher,
        config.rx_poll_period,
        running,
        LinkMetrics::new_shared(),
        Arc::new(EventRecorder::new()),
    );
    while let RxOutcome::Received { .. } = receiver.poll() {}

    let sent = metrics.snapshot().frames_sent;
    assert!(sent >= 2, "sent {}", sent);
    let got: Vec<DecodedBatch> = published.try_iter().collect();
    assert_eq!(got.len() as u64, sent);
    for (i, d) in got.iter().enumerate() {
        assert_eq!(d.sequence, i as u32);
        assert!(!d.readings.is_empty());
    }
}
