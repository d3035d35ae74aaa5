//! Host monitor for the MPL3115A2 precision altimeter.
//!
//! Opens the sensor over Linux I2C (or the built-in simulator), configures it
//! for barometer mode and prints pressure, altitude and temperature at a fixed
//! interval until the optional run time elapses.
//!
//! Settings come from the environment; see [`settings`] for the variables.
//! Set `RUST_LOG` to adjust log verbosity (default `info`).

mod app_state;
mod display;
mod hardware;
mod settings;
mod simulator;

use core::future::pending;

use alti_core::bus::BusController;
use alti_core::{Mpl3115a2, SampleResult, Sampler, SamplerControl};
use embassy_executor::Spawner;
use embassy_futures::join::join;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use log::{error, info};

use app_state::{AppError, AppRunState};
use hardware::LinuxBusController;
use settings::Settings;
use simulator::{SIM_CONTROLLER, SimulatedController};

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting alti-rs monitor");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let result = if settings.bus == SIM_CONTROLLER {
        run(SimulatedController::new(), &settings).await
    } else {
        run(LinuxBusController::new(), &settings).await
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    info!("Monitor exiting");
}

/// Bring the sensor up on `controller` and sample until stopped.
async fn run<C: BusController>(mut controller: C, settings: &Settings) -> Result<(), AppError> {
    let mut state = AppRunState::Uninitialized;
    state.advance(AppRunState::Initializing);

    let connection = settings.connection();
    let sensor =
        match Mpl3115a2::initialize_with(&mut controller, &connection, &settings.device).await {
            Ok(sensor) => sensor,
            Err(e) => {
                state.advance(AppRunState::Error);
                return Err(e.into());
            }
        };

    println!(
        "I2C Address of the Precision Altimeter MPL3115A2: {:#04x}",
        sensor.address()
    );

    let control = SamplerControl::<CriticalSectionRawMutex>::new();
    let sampler = Sampler::new(sensor, settings.sampler, &control);
    let mut consumer = |result: SampleResult| println!("{}\n", display::render(&result));

    let stop_after = async {
        match settings.run_for {
            Some(duration) => {
                Timer::after(duration).await;
                info!("Run time elapsed, stopping sampler");
                control.stop();
            }
            None => pending::<()>().await,
        }
    };

    state.advance(AppRunState::SensorsRunning);
    let (sensor, ()) = join(sampler.run(&mut consumer), stop_after).await;
    state.advance(AppRunState::Stopped);

    drop(sensor.release());
    info!("Released I2C bus");
    Ok(())
}
