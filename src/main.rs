//! Host bench for the SmartGlove peripheral core.
//!
//! Runs the glove task against simulated sensors on the std executor, with a
//! stand-in central that waits for Data Ready notifications and reads the
//! characteristic table the way a BLE client would.

use embassy_executor::Spawner;
use log::{debug, error, info, warn};
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use smartglove::{
    config::{GloveConfig, DEVICE_NAME},
    drivers::SimulatedGlove,
    gatt::{uuid128, SERVICES},
    ipc::{GLOVE_TABLE, PASS_CH, SYSTEM_CH},
    signal::Signal,
    tasks::{run_pass_stats, Glove, SystemMessage},
};

#[embassy_executor::task]
async fn glove_task(glove: Glove<'static, SimulatedGlove>) {
    glove.run().await
}

#[embassy_executor::task]
async fn pass_stats_task() {
    run_pass_stats(&PASS_CH).await
}

#[embassy_executor::task]
async fn alert_task() {
    loop {
        if let SystemMessage::SystemAlert(alert) = SYSTEM_CH.receive().await {
            warn!("Alert: {:?}", alert);
        }
    }
}

#[embassy_executor::task]
async fn central_task() {
    let Some(mut ready) = GLOVE_TABLE.subscribe() else {
        error!("No Data Ready subscriber slot left");
        return;
    };
    loop {
        let generation = ready.changed().await;
        match GLOVE_TABLE.read_snapshot() {
            Some(p) => {
                let s = p.snapshot;
                info!(
                    "Snapshot {}: accel=({:.2}, {:.2}, {:.2}) fingers=({:.1}, {:.1}, {:.1}, {:.1}, {:.1}) imu_trusted={} degraded=0x{:04X}",
                    p.generation,
                    s.accel.x,
                    s.accel.y,
                    s.accel.z,
                    s.fingers.thumb,
                    s.fingers.index,
                    s.fingers.middle,
                    s.fingers.ring,
                    s.fingers.pinky,
                    p.status.imu_trusted,
                    p.status.degraded.bits()
                );
            }
            None => debug!("Pass {} superseded before it could be read", generation),
        }
    }
}

fn log_level() -> LevelFilter {
    std::env::var("SMARTGLOVE_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let _ = TermLogger::init(
        log_level(),
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
    info!("Starting {} peripheral core with simulated sensors", DEVICE_NAME);
    for service in SERVICES {
        info!("Service {}", uuid128(service.uuid));
        for c in service.characteristics {
            info!(
                "  {:?} {} ({} bytes, props 0x{:02X})",
                c,
                uuid128(c.uuid()),
                c.payload_len(),
                c.properties()
            );
        }
    }

    // Every 7th gyro-y read fails, to show carried-over values in the status.
    let source = SimulatedGlove::new().with_fault(Signal::GyroY, 7);
    let glove = match Glove::new(source, &GLOVE_TABLE, &SYSTEM_CH, GloveConfig::default()) {
        Ok(glove) => glove.with_reports(&PASS_CH),
        Err(e) => {
            error!("Glove table already has a writer: {:?}", e);
            return;
        }
    };

    spawner.spawn(glove_task(glove)).unwrap();
    spawner.spawn(pass_stats_task()).unwrap();
    spawner.spawn(alert_task()).unwrap();
    spawner.spawn(central_task()).unwrap();
    info!("Glove, stats, alert and central tasks spawned");
}
