use embassy_time::{with_timeout, Instant};

use crate::buffer::SampleBuffer;
use crate::config::GloveConfig;
use crate::drivers::SensorSource;
use crate::error::{GloveError, SensorError};
use crate::gatt::{GloveStatus, GloveTable};
use crate::guard::{BringUpError, IdentityGuard};
use crate::ipc::{PassChannel, SystemChannel};
use crate::publisher::{PublishError, SnapshotPublisher};
use crate::scheduler::RefreshScheduler;
use crate::signal::{Signal, SignalGroup, SIGNAL_COUNT};

use super::{PassReport, SystemAlert, SystemMessage};

/// The sampling side of the glove: owns the sensor source, the staging
/// buffer, the identity guard and the only publisher of the table.
pub struct Glove<'a, S> {
    source: S,
    config: GloveConfig,
    buffer: SampleBuffer,
    guard: IdentityGuard,
    publisher: SnapshotPublisher<'a>,
    system_tx: &'a SystemChannel,
    pass_tx: Option<&'a PassChannel>,

    identity_due: bool,
    untrusted_passes: u32,
    imu_blackout_passes: u32,
    degraded_streak: [u32; SIGNAL_COUNT],
    read_errors: u32,
}

impl<'a, S: SensorSource> Glove<'a, S> {
    pub fn new(
        source: S,
        table: &'a GloveTable,
        system_tx: &'a SystemChannel,
        config: GloveConfig,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            source,
            config,
            buffer: SampleBuffer::new(),
            guard: IdentityGuard::new(),
            publisher: SnapshotPublisher::new(table)?,
            system_tx,
            pass_tx: None,
            identity_due: true,
            untrusted_passes: 0,
            imu_blackout_passes: 0,
            degraded_streak: [0; SIGNAL_COUNT],
            read_errors: 0,
        })
    }

    /// Also forward a [`PassReport`] per pass, for the stats task.
    pub fn with_reports(mut self, pass_tx: &'a PassChannel) -> Self {
        self.pass_tx = Some(pass_tx);
        self
    }

    pub fn guard(&self) -> &IdentityGuard {
        &self.guard
    }

    pub fn table(&self) -> &'a GloveTable {
        self.publisher.table()
    }

    /// Runs the identity check against the IMU.
    pub async fn bring_up(&mut self) {
        self.identity_due = false;
        self.untrusted_passes = 0;
        match self
            .guard
            .bring_up(&mut self.source, self.config.read_timeout)
            .await
        {
            Ok(()) => info!("IMU trusted, publishing IMU service"),
            Err(e) => {
                let observed = match e {
                    BringUpError::Mismatch(GloveError::IdentityMismatch { observed }) => {
                        Some(observed)
                    }
                    _ => None,
                };
                error!("IMU untrusted ({:?}), IMU service suppressed", e);
                self.alert(SystemAlert::ImuUntrusted { observed });
            }
        }
    }

    /// Samples every signal once and commits the result.
    ///
    /// `overran` is reported in the status of this pass; it tells the
    /// central that the previous pass missed its period.
    pub async fn run_pass(&mut self, overran: bool) -> PassReport {
        let started = Instant::now();
        self.maintain_identity().await;

        let trusted = self.guard.trust().is_trusted();
        self.buffer.begin_pass();
        if trusted {
            self.sample_group(SignalGroup::Imu).await;
        }
        self.sample_group(SignalGroup::Flex).await;

        let degraded = self.buffer.degraded();
        let status = GloveStatus {
            imu_trusted: trusted,
            degraded,
            overrun: overran,
        };
        let generation = self.publisher.commit(self.buffer.staged(), status);
        let snapshot = *self.buffer.staged();

        debug!(
            "Pass {}:\n\
             Accel: x={} y={} z={}\n\
             Gyro:  x={} y={} z={}\n\
             Mag:   x={} y={} z={}\n\
             Flex:  thumb={} index={} middle={} ring={} pinky={}",
            generation,
            snapshot.accel.x,
            snapshot.accel.y,
            snapshot.accel.z,
            snapshot.gyro.x,
            snapshot.gyro.y,
            snapshot.gyro.z,
            snapshot.mag.x,
            snapshot.mag.y,
            snapshot.mag.z,
            snapshot.fingers.thumb,
            snapshot.fingers.index,
            snapshot.fingers.middle,
            snapshot.fingers.ring,
            snapshot.fingers.pinky
        );

        self.track_degraded(trusted);
        let timestamp = Instant::now();
        self.system_tx
            .try_send(SystemMessage::PassCompleted {
                timestamp,
                generation,
            })
            .ok();

        PassReport {
            generation,
            timestamp,
            duration: started.elapsed(),
            imu_trusted: trusted,
            degraded,
            snapshot,
        }
    }

    /// Brings the IMU up, then samples and publishes every refresh period forever.
    pub async fn run(mut self) {
        info!(
            "Glove task started - sampling at {}ms intervals",
            self.config.refresh_period.as_millis()
        );
        self.bring_up().await;

        let mut scheduler = RefreshScheduler::new(self.config.refresh_period);
        let mut overran = false;
        loop {
            let started = scheduler.next_tick().await;
            let report = self.run_pass(overran).await;

            overran = match scheduler.finish_pass(started) {
                Ok(_) => false,
                Err(e) => {
                    warn!(
                        "{:?} (pass {}, overrun #{}, {} ticks dropped so far)",
                        e,
                        report.generation,
                        scheduler.overruns(),
                        scheduler.dropped_ticks()
                    );
                    if let GloveError::Overrun { missed_ticks } = e {
                        self.alert(SystemAlert::Overrun { missed_ticks });
                    }
                    true
                }
            };

            if let Some(tx) = self.pass_tx {
                tx.try_send(report).ok();
            }
        }
    }

    async fn maintain_identity(&mut self) {
        if self.identity_due {
            self.bring_up().await;
        } else if !self.guard.trust().is_trusted() {
            self.untrusted_passes += 1;
            if self.untrusted_passes >= self.config.identity_retry_passes {
                info!("Retrying IMU bring-up");
                self.bring_up().await;
            }
        }
    }

    async fn sample_group(&mut self, group: SignalGroup) {
        for &signal in group.signals() {
            let reading = match with_timeout(self.config.read_timeout, self.source.read(signal)).await
            {
                Ok(reading) => reading,
                Err(timeout) => Err(SensorError::from(timeout)),
            };
            if let Err(e) = self.buffer.record(signal, reading) {
                self.read_errors = self.read_errors.wrapping_add(1);
                if self.read_errors % 100 == 1 {
                    warn!(
                        "Sensor read error #{}: {:?}, keeping last value",
                        self.read_errors,
                        e
                    );
                } else {
                    trace!("{:?}", e);
                }
            }
        }
    }

    fn track_degraded(&mut self, trusted: bool) {
        let degraded = self.buffer.degraded();
        for signal in Signal::ALL {
            // IMU signals are not sampled while untrusted; hold their streaks.
            if !trusted && signal.group() == SignalGroup::Imu {
                continue;
            }
            let streak = &mut self.degraded_streak[signal.index()];
            if degraded.contains(signal) {
                *streak += 1;
                if *streak == self.config.degraded_alert_threshold {
                    warn!("{:?} has not updated for {} passes", signal, *streak);
                    self.system_tx
                        .try_send(SystemMessage::SystemAlert(SystemAlert::SensorFault { signal }))
                        .ok();
                }
            } else {
                if *streak >= self.config.degraded_alert_threshold {
                    info!("{:?} recovered after {} degraded passes", signal, *streak);
                }
                *streak = 0;
            }
        }

        if !trusted {
            return;
        }
        if degraded.covers(SignalGroup::Imu) {
            self.imu_blackout_passes += 1;
            if self.imu_blackout_passes >= self.config.imu_failure_threshold {
                error!(
                    "No IMU reading for {} passes, re-running bring-up",
                    self.imu_blackout_passes
                );
                self.imu_blackout_passes = 0;
                self.guard.invalidate();
                self.identity_due = true;
                self.alert(SystemAlert::ImuReset);
            }
        } else {
            self.imu_blackout_passes = 0;
        }
    }

    fn alert(&self, alert: SystemAlert) {
        self.system_tx
            .try_send(SystemMessage::SystemAlert(alert))
            .ok();
    }
}
