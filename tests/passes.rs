use core::cell::{Cell, RefCell};

use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};

use smartglove::codec::{decode_scalar, decode_vec3};
use smartglove::config::{GloveConfig, IMU_CHECK_KEY};
use smartglove::gatt::{uuids, GloveTable};
use smartglove::ipc::SystemChannel;
use smartglove::signal::{Signal, SIGNAL_COUNT};
use smartglove::tasks::{Glove, SystemAlert, SystemMessage};
use smartglove::{SensorError, SensorSource};

/// Sensor source whose values and faults the test changes between passes.
struct Script {
    values: RefCell<[f32; SIGNAL_COUNT]>,
    failing: Cell<u16>,
    stalled: Cell<Option<Signal>>,
    identity: Cell<u16>,
    reads: RefCell<[u32; SIGNAL_COUNT]>,
    identity_reads: Cell<u32>,
}

impl Script {
    fn new(values: [f32; SIGNAL_COUNT]) -> Self {
        Self {
            values: RefCell::new(values),
            failing: Cell::new(0),
            stalled: Cell::new(None),
            identity: Cell::new(IMU_CHECK_KEY),
            reads: RefCell::new([0; SIGNAL_COUNT]),
            identity_reads: Cell::new(0),
        }
    }

    fn set(&self, signal: Signal, value: f32) {
        self.values.borrow_mut()[signal.index()] = value;
    }

    fn fail(&self, signal: Signal) {
        self.failing.set(self.failing.get() | 1 << signal.index());
    }

    fn heal(&self) {
        self.failing.set(0);
    }

    fn reads_of(&self, signal: Signal) -> u32 {
        self.reads.borrow()[signal.index()]
    }
}

impl SensorSource for &Script {
    async fn read(&mut self, signal: Signal) -> Result<f32, SensorError> {
        self.reads.borrow_mut()[signal.index()] += 1;
        if self.stalled.get() == Some(signal) {
            core::future::pending::<()>().await;
        }
        if self.failing.get() & (1 << signal.index()) != 0 {
            return Err(SensorError::Bus);
        }
        Ok(self.values.borrow()[signal.index()])
    }

    async fn identity(&mut self) -> Result<u16, SensorError> {
        self.identity_reads.set(self.identity_reads.get() + 1);
        Ok(self.identity.get())
    }
}

fn scenario_values() -> [f32; SIGNAL_COUNT] {
    // accel=(1,2,3), gyro=0, mag=0, fingers 10..50
    [
        1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 10.0, 20.0, 30.0, 40.0, 50.0,
    ]
}

fn test_config() -> GloveConfig {
    GloveConfig::new()
        .with_refresh_period(Duration::from_millis(20))
        .with_read_timeout(Duration::from_millis(10))
}

fn vec3(table: &GloveTable, uuid: u16) -> [f32; 3] {
    decode_vec3(&table.read(uuid).unwrap()).unwrap()
}

fn scalar(table: &GloveTable, uuid: u16) -> f32 {
    decode_scalar(&table.read(uuid).unwrap()).unwrap()
}

fn alerts(ch: &SystemChannel) -> Vec<SystemAlert> {
    let mut out = Vec::new();
    while let Ok(msg) = ch.try_receive() {
        if let SystemMessage::SystemAlert(a) = msg {
            out.push(a);
        }
    }
    out
}

#[test]
fn one_pass_publishes_every_field_and_sets_ready() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(false).await;
    });

    assert_eq!(vec3(&table, uuids::ACCEL_CHAR), [1.0, 2.0, 3.0]);
    assert_eq!(vec3(&table, uuids::GYRO_CHAR), [0.0, 0.0, 0.0]);
    assert_eq!(vec3(&table, uuids::MAG_CHAR), [0.0, 0.0, 0.0]);
    assert_eq!(scalar(&table, uuids::THUMB_CHAR), 10.0);
    assert_eq!(scalar(&table, uuids::INDEX_CHAR), 20.0);
    assert_eq!(scalar(&table, uuids::MIDDLE_CHAR), 30.0);
    assert_eq!(scalar(&table, uuids::RING_CHAR), 40.0);
    assert_eq!(scalar(&table, uuids::PINKY_CHAR), 50.0);
    assert_eq!(table.read(uuids::DATA_READY_CHAR).unwrap().as_slice(), &[1]);

    let status = table.status();
    assert!(status.imu_trusted);
    assert!(status.degraded.is_empty());
    assert!(!status.overrun);
}

#[test]
fn failed_gyro_y_keeps_previous_value() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    script.set(Signal::GyroY, 5.0);
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(false).await;

        // second pass: every value moves, gyro-y read fails
        for (i, s) in Signal::ALL.iter().enumerate() {
            script.set(*s, 100.0 + i as f32);
        }
        script.fail(Signal::GyroY);
        let report = glove.run_pass(false).await;
        assert_eq!(report.generation, 2);
        assert!(report.degraded.contains(Signal::GyroY));
        assert_eq!(report.degraded.count(), 1);
    });

    assert!(table.data_ready());
    assert_eq!(vec3(&table, uuids::ACCEL_CHAR), [100.0, 101.0, 102.0]);
    assert_eq!(vec3(&table, uuids::GYRO_CHAR), [103.0, 5.0, 105.0]);
    assert_eq!(vec3(&table, uuids::MAG_CHAR), [106.0, 107.0, 108.0]);
    assert_eq!(scalar(&table, uuids::PINKY_CHAR), 113.0);

    let published = table.read_snapshot().unwrap();
    assert_eq!(published.generation, 2);
    assert!(published.status.degraded.contains(Signal::GyroY));
    assert_eq!(
        table.read(uuids::STATUS_CHAR).unwrap().as_slice(),
        &[0b011, 1 << 4, 0]
    );
}

#[test]
fn wrong_identity_suppresses_imu_group() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    script.identity.set(0x1234);
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(false).await;
    });

    assert!(!glove.guard().trust().is_trusted());
    assert_eq!(script.reads_of(Signal::AccelX), 0);
    assert_eq!(vec3(&table, uuids::ACCEL_CHAR), [0.0, 0.0, 0.0]);
    assert_eq!(scalar(&table, uuids::THUMB_CHAR), 10.0);

    // Data Ready covers the flex group; the IMU group is flagged untrusted.
    assert!(table.data_ready());
    assert!(!table.status().imu_trusted);
    assert_eq!(
        alerts(&system),
        vec![SystemAlert::ImuUntrusted {
            observed: Some(0x1234)
        }]
    );
}

#[test]
fn untrusted_imu_is_retried_and_recovers() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    script.identity.set(0x0000);
    let mut config = test_config();
    config.identity_retry_passes = 2;
    let mut glove = Glove::new(&script, &table, &system, config).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(false).await;
        assert!(!table.status().imu_trusted);

        script.identity.set(IMU_CHECK_KEY);
        glove.run_pass(false).await;
    });

    assert_eq!(script.identity_reads.get(), 2);
    assert!(glove.guard().trust().is_trusted());
    assert!(table.status().imu_trusted);
    assert_eq!(vec3(&table, uuids::ACCEL_CHAR), [1.0, 2.0, 3.0]);
}

#[test]
fn stalled_read_times_out_and_pass_completes() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(false).await;
        script.set(Signal::Thumb, 99.0);
        script.set(Signal::Index, 21.0);
        script.stalled.set(Some(Signal::Thumb));
        let report = glove.run_pass(false).await;
        assert!(report.degraded.contains(Signal::Thumb));
    });

    assert!(table.data_ready());
    assert_eq!(table.generation(), 2);
    assert_eq!(scalar(&table, uuids::THUMB_CHAR), 10.0);
    assert_eq!(scalar(&table, uuids::INDEX_CHAR), 21.0);
}

#[test]
fn imu_blackout_triggers_new_bring_up() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut config = test_config();
    config.imu_failure_threshold = 3;
    let mut glove = Glove::new(&script, &table, &system, config).unwrap();

    block_on(async {
        glove.bring_up().await;
        for s in Signal::IMU {
            script.fail(s);
        }
        for _ in 0..3 {
            glove.run_pass(false).await;
        }
        assert!(!glove.guard().trust().is_trusted());

        script.heal();
        glove.run_pass(false).await;
    });

    assert_eq!(script.identity_reads.get(), 2);
    assert!(glove.guard().trust().is_trusted());
    assert!(alerts(&system).contains(&SystemAlert::ImuReset));
}

#[test]
fn each_pass_notifies_the_next_generation() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut ready = table.subscribe().unwrap();
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        for expected in 1..=4u32 {
            script.set(Signal::Ring, expected as f32);
            glove.run_pass(false).await;
            assert_eq!(ready.try_changed(), Some(expected));
            let published = table.read_snapshot().unwrap();
            assert_eq!(published.generation, expected);
            assert_eq!(published.snapshot.get(Signal::Ring), expected as f32);
        }
    });
}

#[test]
fn overrun_is_reported_in_status() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    block_on(async {
        glove.bring_up().await;
        glove.run_pass(true).await;
    });
    assert!(table.status().overrun);
    assert_eq!(table.read(uuids::STATUS_CHAR).unwrap()[0], 0b101);
}

#[test]
fn second_glove_cannot_share_a_table() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let _first = Glove::new(&script, &table, &system, test_config()).unwrap();
    assert!(Glove::new(&script, &table, &system, test_config()).is_err());
}

#[test]
fn run_loop_samples_at_the_refresh_period() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let glove = Glove::new(&script, &table, &system, test_config()).unwrap();

    let outcome = block_on(select(glove.run(), Timer::after(Duration::from_millis(150))));
    assert!(matches!(outcome, Either::Second(())));

    // 150 ms at a 20 ms period: passes never burst past the tick rate.
    let passes = table.generation();
    assert!((2..=9).contains(&passes), "passes={}", passes);
    assert!(table.data_ready());
    assert_eq!(vec3(&table, uuids::ACCEL_CHAR), [1.0, 2.0, 3.0]);
}

#[test]
fn slow_passes_raise_overrun_and_drop_overdue_ticks() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    script.stalled.set(Some(Signal::Thumb));
    // every pass waits out a 30 ms read against a 20 ms period
    let config = GloveConfig::new()
        .with_refresh_period(Duration::from_millis(20))
        .with_read_timeout(Duration::from_millis(30));
    let glove = Glove::new(&script, &table, &system, config).unwrap();

    block_on(select(glove.run(), Timer::after(Duration::from_millis(200))));

    // Replaying the missed ticks would run passes back to back (6 or more).
    let passes = table.generation();
    assert!((2..=5).contains(&passes), "passes={}", passes);

    let status = table.status();
    assert!(status.overrun);
    assert!(status.degraded.contains(Signal::Thumb));
    assert_eq!(table.read(uuids::STATUS_CHAR).unwrap()[0] & 0b100, 0b100);

    let overruns: Vec<u32> = alerts(&system)
        .into_iter()
        .filter_map(|a| match a {
            SystemAlert::Overrun { missed_ticks } => Some(missed_ticks),
            _ => None,
        })
        .collect();
    assert!(!overruns.is_empty());
    assert!(overruns.iter().all(|&m| m >= 1));
}

#[test]
fn sensor_fault_is_raised_once_across_an_imu_outage() {
    let table = GloveTable::new();
    let system: SystemChannel = Channel::new();
    let script = Script::new(scenario_values());
    let mut config = test_config();
    config.degraded_alert_threshold = 2;
    config.imu_failure_threshold = 3;
    config.identity_retry_passes = 2;
    let mut glove = Glove::new(&script, &table, &system, config).unwrap();

    block_on(async {
        glove.bring_up().await;
        for s in Signal::IMU {
            script.fail(s);
        }
        for _ in 0..3 {
            glove.run_pass(false).await;
        }

        // IMU gone: the re-bring-up fails and the IMU stays unsampled
        script.identity.set(0x0000);
        glove.run_pass(false).await;
        glove.run_pass(false).await;
        assert!(!glove.guard().trust().is_trusted());

        // back on the bus, still returning errors
        script.identity.set(IMU_CHECK_KEY);
        glove.run_pass(false).await;
        glove.run_pass(false).await;
        assert!(glove.guard().trust().is_trusted());
    });

    let alerts = alerts(&system);
    let accel_faults = alerts
        .iter()
        .filter(|a| **a == SystemAlert::SensorFault { signal: Signal::AccelX })
        .count();
    assert_eq!(accel_faults, 1);
    assert!(alerts.contains(&SystemAlert::ImuReset));
    assert!(alerts.contains(&SystemAlert::ImuUntrusted {
        observed: Some(0x0000)
    }));
}
