use core::time::Duration;
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    vec::Vec,
    };
use packbytes::{FromBytes, ToBytes};
use log::*;

use crate::{
    image::{ProcessImage, SharedImage},
    registers::{head, Leds, Offset, Register, Status},
    };
use super::{
    Error,
    adjust::{adjust, ConfigError},
    defaults::apply_defaults,
    devices::{Configuration, DetectedModule, DeviceList},
    discovery::{Phase, Sequencer},
    firmware::{FirmwareSession, FirmwareStep},
    hardware::{Direction, Level, Mode, ModuleFamily, Platform, Transport},
    settings::{ErrorBudget, Parameters, Verdict},
    };


/// wait before starting data exchange, once discovery is over
const EXCHANGE_DELAY: Duration = Duration::from_millis(100);
/// wait after starting data exchange, before initializing modules
const EXCHANGE_SETTLE: Duration = Duration::from_millis(110);
/// period of telemetry refresh in the head unit record
const TELEMETRY_PERIOD: Duration = Duration::from_secs(1);


/// top level state of the bridge, as requested by its users
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BridgeState {
    /// no discovery nor data exchange, firmware updates are allowed
    Stopped,
    /// discovery in progress
    Initializing,
    /// data exchange confirmed at least once
    Running,
}

/**
    bridge master controller

    [Self::tick] advances the bridge by one step and must be called periodically, from a single caller.
    Every other method can be called from any thread, the firmware methods block until the next tick
    executed the request.
*/
pub struct Bridge<P, T> {
    control: Mutex<Control<P, T>>,
    /// notified after every tick and request, for the firmware requesters waiting on `control`
    handoff: Condvar,
    image: Arc<SharedImage>,
}

/// everything owned by the run loop
struct Control<P, T> {
    state: BridgeState,
    platform: P,
    transport: T,
    parameters: Parameters,
    configuration: Option<Configuration>,
    sequencer: Sequencer,
    devices: DeviceList,
    /// image copied in the live image when data exchange starts
    defaults: ProcessImage,
    status: Status,
    /// start of the head unit record in the image, once reconciled
    head: Option<Offset>,
    config_error: Option<ConfigError>,
    /// the device list was reconciled in this session, so it can be resumed
    reconciled: bool,
    /// the transport is in cyclic data exchange rather than in discovery protocol
    exchanging: bool,
    firmware: FirmwareSession,
    /// state at previous tick, to detect changes
    last_state: BridgeState,
    last_leds: Option<Leds>,
    last_telemetry: Option<Duration>,
}


impl<P: Platform, T: Transport> Bridge<P, T> {
    /// create a bridge that will start discovery on its first tick
    pub fn new(platform: P, transport: T, parameters: Parameters) -> Self {
        Self {
            control: Mutex::new(Control {
                state: BridgeState::Initializing,
                platform,
                transport,
                devices: DeviceList::new(parameters.head),
                parameters,
                configuration: None,
                sequencer: Sequencer::new(),
                defaults: ProcessImage::new(),
                status: Status::default(),
                head: None,
                config_error: None,
                reconciled: false,
                exchanging: false,
                firmware: FirmwareSession::new(),
                last_state: BridgeState::Stopped,
                last_leds: None,
                last_telemetry: None,
            }),
            handoff: Condvar::new(),
            image: Arc::new(SharedImage::from(ProcessImage::new())),
        }
    }
    /// same bridge, with the expected configuration already installed
    pub fn with_configuration(self, configuration: Configuration) -> Self {
        self.set_configuration(Some(configuration));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Control<P, T>> {
        // the control state stays consistent between steps, a panicking tick leaves nothing half written
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// live process image, shared with the transport and the applications
    pub fn image(&self) -> &Arc<SharedImage> {&self.image}
    /// expected configuration, used at next reconciliation
    pub fn set_configuration(&self, configuration: Option<Configuration>) {
        self.lock().configuration = configuration;
    }
    pub fn state(&self) -> BridgeState {self.lock().state}
    pub fn phase(&self) -> Phase {self.lock().sequencer.phase()}
    pub fn status(&self) -> Status {self.lock().status}
    /// modules of the current session, head unit first
    pub fn modules(&self) -> Vec<DetectedModule> {self.lock().devices.as_slice().to_vec()}
    /// result of the last reconciliation
    pub fn config_error(&self) -> Option<ConfigError> {self.lock().config_error}

    /**
        advance the bridge by one step

        returns true when a data exchange cycle succeeded during this step
    */
    pub fn tick(&self) -> bool {
        let exchanged = {
            let mut control = self.lock();
            let exchanged = control.step(&self.image);
            control.indicate(&self.image);
            exchanged
        };
        self.handoff.notify_all();
        exchanged
    }

    /// stop data exchange, taking effect at next tick
    pub fn request_stop(&self) {
        let mut control = self.lock();
        info!("stop requested");
        control.state = BridgeState::Stopped;
        drop(control);
        self.handoff.notify_all();
    }
    /// restart data exchange with the modules of the previous session, without discovery
    pub fn request_continue(&self) {
        let mut control = self.lock();
        info!("continue requested");
        control.state = BridgeState::Running;
        control.sequencer.resume();
        drop(control);
        self.handoff.notify_all();
    }
    /// drop the current session and discover the chain again
    pub fn request_reset(&self) {
        let mut control = self.lock();
        info!("reset requested");
        control.state = BridgeState::Initializing;
        control.sequencer = Sequencer::new();
        control.status = Status::default();
        control.devices = DeviceList::new(control.parameters.head);
        control.head = None;
        control.config_error = None;
        control.reconciled = false;
        control.last_leds = None;
        control.last_telemetry = None;
        drop(control);
        self.handoff.notify_all();
    }

    /**
        put a module in firmware update mode

        `scanned` tells whether `address` comes from a discovery, otherwise the legacy address is used.
        The following firmware requests go to the same module.
    */
    pub fn enter_firmware_mode(&self, address: u8, scanned: bool) -> Result<(), Error> {
        self.firmware(FirmwareStep::EnterMode, |session| {
            session.address = address;
            session.scanned = scanned;
        })
    }
    pub fn set_serial_number(&self, serial: u32) -> Result<(), Error> {
        self.firmware(FirmwareStep::SetSerial, |session| session.serial = serial)
    }
    pub fn erase_flash(&self) -> Result<(), Error> {
        self.firmware(FirmwareStep::EraseFlash, |_| {})
    }
    /// write `data` at `flash_offset`, in as many transport exchanges as needed
    pub fn write_flash(&self, flash_offset: u32, data: &[u8]) -> Result<(), Error> {
        self.firmware(FirmwareStep::WriteFlash, |session| {
            session.flash_offset = flash_offset;
            session.data = data.to_vec();
        })
    }
    pub fn reset_firmware_target(&self) -> Result<(), Error> {
        self.firmware(FirmwareStep::ResetTarget, |_| {})
    }

    /// hand a firmware step over to the run loop and wait until it is executed
    fn firmware(&self, step: FirmwareStep, setup: impl FnOnce(&mut FirmwareSession)) -> Result<(), Error> {
        let mut control = self.lock();
        if control.state != BridgeState::Stopped {
            return Err(Error::NotStopped);
        }
        setup(&mut control.firmware);
        control.sequencer.goto(Phase::Firmware(step));

        let control = self.handoff
            .wait_while(control, |control|
                control.sequencer.phase() == Phase::Firmware(step)
                && control.sequencer.entering())
            .unwrap_or_else(PoisonError::into_inner);
        if control.sequencer.phase() != Phase::Firmware(step) {
            return Err(Error::Interrupted);
        }
        control.firmware.result.map_err(Error::from)
    }
}

impl<P: Platform + 'static, T: Transport + 'static> Bridge<P, T> {
    /**
        coroutine ticking the bridge every `period`

        ticks may block (discovery pulses, data exchange start), so they run on the blocking thread pool
    */
    pub async fn run(self: Arc<Self>, period: Duration) -> Result<(), Error> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let bridge = self.clone();
            tokio::task::spawn_blocking(move || bridge.tick()).await
                .map_err(|_| Error::Master("bridge tick panicked"))?;
        }
    }
}


impl<P: Platform, T: Transport> Control<P, T> {
    fn step(&mut self, image: &SharedImage) -> bool {
        let mut exchanged = false;
        if self.state != BridgeState::Stopped {
            match self.sequencer.phase() {
                Phase::ApplyConfigAndStart => self.apply_and_start(image),
                Phase::Running => exchanged = self.exchange(image),
                Phase::Firmware(_) => {
                    debug!("firmware mode left without reset, discovering again");
                    self.sequencer.goto(Phase::Init);
                },
                _ => {
                    // a reset while exchanging restarts discovery
                    if self.exchanging {
                        self.leave_exchange();
                    }
                    self.sequencer.step(
                        &mut self.platform,
                        &mut self.transport,
                        &mut self.devices,
                        self.parameters.pulse)
                },
            }
            if exchanged && self.state != BridgeState::Running {
                info!("bridge running");
                self.state = BridgeState::Running;
            }
        }
        else {
            let phase = self.sequencer.phase();
            // a firmware request may have replaced the phase before this tick saw the stop
            if self.exchanging || matches!(phase, Phase::ApplyConfigAndStart | Phase::Running) {
                self.leave_exchange();
            }
            match phase {
                Phase::ApplyConfigAndStart | Phase::Running => self.sequencer.goto(Phase::Init),
                Phase::Firmware(step) => {
                    if self.sequencer.enter() {
                        let last_right = self.devices.next_address(Direction::Right).wrapping_sub(1);
                        self.firmware.execute(step, &mut self.transport, last_right);
                    }
                },
                _ => {},
            }
        }
        exchanged
    }

    /// return the transport to the discovery protocol
    fn leave_exchange(&mut self) {
        info!("stop data exchange");
        let result = self.transport.goto_discovery_protocol();
        info!("back to discovery protocol: {:?}", result);
        self.exchanging = false;
    }

    /// reconcile the detected modules, lay out the image and start data exchange
    fn apply_and_start(&mut self, image: &SharedImage) {
        if !self.sequencer.enter() {
            self.sequencer.goto(Phase::Running);
            return;
        }
        // a session stopped during discovery was never reconciled, it cannot be resumed as is
        let resume = self.sequencer.take_resume() && self.reconciled;
        if !resume {
            for direction in [Direction::Right, Direction::Left] {
                self.platform.set_line(direction.control(), Level::Low, Mode::Input);
            }
            log_modules("detected", self.devices.as_slice());

            self.config_error = adjust(&mut self.devices, self.configuration.as_ref(), &mut self.status).err();
            self.reconciled = true;
            if let Some(error) = self.config_error {
                warn!("configuration does not match the bus: {}", error);
            }
            log_modules("reconciled", self.devices.as_slice());
            debug_assert!(self.devices.overlapping().is_none(),
                "modules {:?} share process image bytes", self.devices.overlapping());

            // the head unit is first, its record is only usable once its offsets are known
            self.head = self.devices.as_slice().first()
                .filter(|module| module.configured)
                .map(|module| module.input_offset);

            let entries = self.configuration.as_ref().map_or(&[][..], |configuration| configuration.entries.as_slice());
            apply_defaults(entries, &mut self.defaults);
            image.lock().copy_from(&self.defaults);
        }

        self.platform.sleep(EXCHANGE_DELAY);
        info!("start data exchange");
        self.transport.start_data_exchange();
        self.exchanging = true;
        self.platform.sleep(EXCHANGE_SETTLE);

        self.init_modules();
        self.sequencer.goto(Phase::Running);
    }

    /// initialize the io modules needing it, deactivating those failing
    fn init_modules(&mut self) {
        for (index, module) in self.devices.as_mut_slice().iter_mut().enumerate() {
            if !module.active
                {continue}
            let Some(family) = ModuleFamily::of(module.identity.module_type)
                else {continue};
            match self.transport.init_module(family, index, module) {
                Ok(()) => info!("{:?} module at address {} initialized", family, module.address),
                Err(error) => {
                    error!("{:?} module at address {} failed to initialize ({}), deactivated", family, module.address, error);
                    module.active = false;
                },
            }
        }
    }

    /// one cycle of data exchange, watched by the error budget
    fn exchange(&mut self, image: &SharedImage) -> bool {
        let exchanged = match self.transport.run_cycle(self.devices.as_slice(), image) {
            Ok(()) => true,
            Err(error) => {
                let errors = self.transport.error_count();
                match self.error_budget(image).check(errors) {
                    Verdict::Exceeded => {
                        error!("too many communication errors ({}), stopping bridge", errors);
                        self.state = BridgeState::Stopped;
                    },
                    Verdict::Degraded => warn!("too many communication errors ({}), inputs are unreliable", errors),
                    Verdict::Nominal => debug!("io cycle failed: {}", error),
                }
                false
            },
        };
        publish(self.head, image, head::ERROR_COUNT, self.transport.error_count());
        exchanged
    }

    /// thresholds set in the head unit record, or the configured ones if it is not mapped
    fn error_budget(&self, image: &SharedImage) -> ErrorBudget {
        if self.head.is_none()
            {return self.parameters.error_budget}
        ErrorBudget::new(
            inspect(self.head, image, head::ERROR_LIMIT_SOFT).unwrap_or(0),
            inspect(self.head, image, head::ERROR_LIMIT_HARD).unwrap_or(0),
            )
    }

    /// update power fault, leds, status and telemetry
    fn indicate(&mut self, image: &SharedImage) {
        if self.last_state != self.state {
            let running = self.state == BridgeState::Running;
            self.status.set_running(running);
            self.platform.set_power_fault(!running);
            self.last_state = self.state;
        }
        if self.head.is_none()
            {return}

        publish(self.head, image, head::STATUS, self.status);

        if let Some(leds) = inspect(self.head, image, head::LED) {
            if self.last_leds != Some(leds) {
                self.platform.set_leds(leds);
                self.last_leds = Some(leds);
            }
        }

        let now = self.platform.now();
        if self.last_telemetry.is_none_or(|last| now.saturating_sub(last) >= TELEMETRY_PERIOD) {
            match self.platform.cpu_temperature() {
                Some(celsius) => publish(self.head, image, head::CPU_TEMPERATURE, celsius.clamp(0, 255) as u8),
                None => error!("could not read cpu temperature"),
            }
            match self.platform.clock_frequency() {
                Some(mhz) => publish(self.head, image, head::CPU_FREQUENCY, (mhz / 10).min(255) as u8),
                None => error!("could not read cpu clock"),
            }
            self.last_telemetry = Some(now);
        }
    }
}

/// write a register of the head unit record, if the record is mapped
fn publish<V: ToBytes>(head: Option<Offset>, image: &SharedImage, register: Register<V>, value: V) {
    let Some(register) = head.and_then(|base| register.at(base))
        else {return};
    if let Err(error) = image.lock().set(register, value) {
        trace!("head unit record not updated: {}", error);
    }
}
/// read a register of the head unit record, if the record is mapped
fn inspect<V: FromBytes>(head: Option<Offset>, image: &SharedImage, register: Register<V>) -> Option<V> {
    let register = head.and_then(|base| register.at(base))?;
    image.lock().get(register).ok()
}

fn log_modules(label: &str, modules: &[DetectedModule]) {
    if !log_enabled!(log::Level::Debug)
        {return}
    debug!("{} modules:", label);
    for (index, module) in modules.iter().enumerate() {
        debug!("{:2}: address {:2}  type {:#06x}  active {}  in {:4}+{:<3} out {:4}+{:<3} serial {}",
            index, module.address, module.identity.module_type, module.active,
            module.input_offset, module.identity.input_length,
            module.output_offset, module.identity.output_length,
            module.identity.serial);
    }
}
