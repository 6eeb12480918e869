/*!
    simulated head unit and field bus, to exercise the bridge without hardware

    [Bench] plays both the platform and the transport of a [Bridge]. Its clones share the same state, so a
    test can keep one to inspect and tamper with what the bridge sees.
    Every reading of the bench clock advances it by one millisecond, so ticking the bridge is enough to
    make its timers expire.
*/

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, atomic::{AtomicBool, Ordering}},
    time::Duration,
    };
use pibridge::{
    image::SharedImage,
    registers::{head, module_type, Leds, Register},
    master::*,
    };


/// time taken by every reading of the bench clock
pub const CLOCK_STEP: Duration = Duration::from_millis(1);
/// io cycle duration reported in the head unit record, in milliseconds
pub const CYCLE_TIME: u8 = 1;

/// what the bridge did to the bench, and what the bench will answer
#[derive(Debug, Default)]
pub struct BenchState {
    pub now: Duration,
    /// modules physically chained on each side, nearest first
    pub right: Vec<ModuleIdentity>,
    pub left: Vec<ModuleIdentity>,
    /// modules of each side already configured by discovery
    pub configured_right: usize,
    pub configured_left: usize,
    /// next configuration dialogues to fail, even with a module waiting
    pub failing_dialogues: usize,
    /// addresses handed out by successful configuration dialogues, in order
    pub dialogues: Vec<u8>,
    pub attempts: usize,
    pub lines: HashMap<Line, (Level, Mode)>,

    pub exchange_starts: usize,
    pub discovery_fallbacks: usize,
    /// addresses of modules whose initialization fails
    pub failing_inits: Vec<u8>,
    pub inits: Vec<(ModuleFamily, usize, u8)>,
    /// io cycles fail and count errors
    pub failing_cycles: bool,
    pub cycles: usize,
    pub errors: u16,

    pub power_fault: Option<bool>,
    pub leds: Vec<Leds>,
    pub temperature: Option<i32>,
    pub frequency: Option<u32>,

    /// firmware calls with the address they targeted
    pub firmware: Vec<(FirmwareStep, u8)>,
    pub flash_writes: Vec<(u32, usize)>,
    pub serial: Option<u32>,
    /// firmware calls fail with this code
    pub firmware_failure: Option<i32>,
    /// write flash fails on this call, counted from 0
    pub failing_flash_write: Option<usize>,
}

/// shared handle on a simulated head unit and its chains
#[derive(Clone, Debug, Default)]
pub struct Bench {
    state: Arc<Mutex<BenchState>>,
}
impl Bench {
    /// bench with the given modules chained on the right and left ports
    pub fn new(right: &[ModuleIdentity], left: &[ModuleIdentity]) -> Self {
        let bench = Self::default();
        {
            let mut state = bench.state();
            state.right = right.to_vec();
            state.left = left.to_vec();
            state.temperature = Some(47);
            state.frequency = Some(1500);
        }
        bench
    }
    pub fn state(&self) -> MutexGuard<'_, BenchState> {
        self.state.lock().expect("bench state poisoned")
    }
}

impl BenchState {
    fn chain(&mut self, direction: Direction) -> (&Vec<ModuleIdentity>, &mut usize) {
        match direction {
            Direction::Right => (&self.right, &mut self.configured_right),
            Direction::Left => (&self.left, &mut self.configured_left),
        }
    }
    fn waiting(&self, direction: Direction) -> bool {
        match direction {
            Direction::Right => self.configured_right < self.right.len(),
            Direction::Left => self.configured_left < self.left.len(),
        }
    }
    fn firmware_call(&mut self, step: FirmwareStep, address: u8) -> Result<(), TransportError> {
        self.firmware.push((step, address));
        match self.firmware_failure {
            Some(code) => Err(TransportError::new(code)),
            None => Ok(()),
        }
    }
}

impl SignalLines for Bench {
    fn set_line(&mut self, line: Line, level: Level, mode: Mode) {
        self.state().lines.insert(line, (level, mode));
    }
    fn read_line(&mut self, line: Line) -> Level {
        let state = self.state();
        match line {
            Line::Sense(direction) if state.waiting(direction) => Level::High,
            _ => Level::Low,
        }
    }
}
impl Clock for Bench {
    fn now(&self) -> Duration {
        let mut state = self.state();
        state.now += CLOCK_STEP;
        state.now
    }
    fn sleep(&mut self, duration: Duration) {
        self.state().now += duration;
    }
}
impl Indicators for Bench {
    fn set_power_fault(&mut self, fault: bool) {
        self.state().power_fault = Some(fault);
    }
    fn set_leds(&mut self, leds: Leds) {
        self.state().leds.push(leds);
    }
}
impl Sensors for Bench {
    fn cpu_temperature(&mut self) -> Option<i32> {self.state().temperature}
    fn clock_frequency(&mut self) -> Option<u32> {self.state().frequency}
}

impl Transport for Bench {
    fn write_next_config(&mut self, direction: Direction, address: u8) -> Result<ModuleIdentity, TransportError> {
        let mut state = self.state();
        state.attempts += 1;
        if state.failing_dialogues > 0 {
            state.failing_dialogues -= 1;
            return Err(TransportError::new(-2));
        }
        let (chain, configured) = state.chain(direction);
        let Some(&identity) = chain.get(*configured)
            else {return Err(TransportError::new(-1))};
        *configured += 1;
        state.dialogues.push(address);
        Ok(identity)
    }
    fn start_data_exchange(&mut self) {
        self.state().exchange_starts += 1;
    }
    fn init_module(&mut self, family: ModuleFamily, index: usize, module: &DetectedModule) -> Result<(), TransportError> {
        let mut state = self.state();
        state.inits.push((family, index, module.address));
        if state.failing_inits.contains(&module.address) {
            return Err(TransportError::new(-3));
        }
        Ok(())
    }
    fn run_cycle(&mut self, modules: &[DetectedModule], image: &SharedImage) -> Result<(), TransportError> {
        let mut state = self.state();
        state.cycles += 1;
        if state.failing_cycles {
            state.errors = state.errors.saturating_add(1);
            return Err(TransportError::new(-4));
        }
        // every physical module reports its address as first input byte
        let mut image = image.lock();
        if let Some(register) = modules.first()
                .filter(|unit| unit.configured)
                .and_then(|unit| head::IO_CYCLE.at(unit.input_offset)) {
            image.set(register, CYCLE_TIME).ok();
        }
        for module in modules.iter().filter(|m| m.active && m.scanned && m.identity.module_type != module_type::CORE) {
            if module.identity.input_length > 0 {
                if let Ok(inputs) = image.bytes_mut(usize::from(module.input_offset), 1) {
                    inputs[0] = module.address;
                }
            }
        }
        Ok(())
    }
    fn error_count(&self) -> u16 {self.state().errors}
    fn goto_discovery_protocol(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.discovery_fallbacks += 1;
        state.configured_right = 0;
        state.configured_left = 0;
        Ok(())
    }

    fn enter_firmware_mode(&mut self, address: u8) -> Result<(), TransportError> {
        self.state().firmware_call(FirmwareStep::EnterMode, address)
    }
    fn set_serial(&mut self, address: u8, serial: u32) -> Result<(), TransportError> {
        let mut state = self.state();
        state.serial = Some(serial);
        state.firmware_call(FirmwareStep::SetSerial, address)
    }
    fn erase_flash(&mut self, address: u8) -> Result<(), TransportError> {
        self.state().firmware_call(FirmwareStep::EraseFlash, address)
    }
    fn write_flash(&mut self, address: u8, offset: u32, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        let call = state.flash_writes.len();
        state.flash_writes.push((offset, data.len()));
        if state.failing_flash_write == Some(call) {
            return Err(TransportError::new(-6));
        }
        state.firmware_call(FirmwareStep::WriteFlash, address)
    }
    fn reset_firmware_target(&mut self, address: u8) -> Result<(), TransportError> {
        self.state().firmware_call(FirmwareStep::ResetTarget, address)
    }
}


pub type BenchBridge = Bridge<Bench, Bench>;

/// bridge driving the given bench
pub fn bridge(bench: &Bench, configuration: Option<Configuration>) -> BenchBridge {
    let bridge = Bridge::new(bench.clone(), bench.clone(), Parameters::default());
    bridge.set_configuration(configuration);
    bridge
}

/// tick the bridge until `condition` holds, false if it never did in `limit` ticks
pub fn tick_until(bridge: &BenchBridge, limit: usize, mut condition: impl FnMut(&BenchBridge) -> bool) -> bool {
    for _ in 0 .. limit {
        if condition(bridge)
            {return true}
        bridge.tick();
    }
    condition(bridge)
}

/// tick the bridge until it exchanges data
pub fn bring_up(bridge: &BenchBridge) {
    assert!(tick_until(bridge, 10_000, |bridge| bridge.state() == BridgeState::Running),
        "bridge never started, stuck in {:?}", bridge.phase());
}

/// run `task` while another thread keeps ticking the bridge, for the blocking entry points
pub fn with_ticker<R>(bridge: &BenchBridge, task: impl FnOnce() -> R) -> R {
    let done = AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                bridge.tick();
                std::thread::sleep(Duration::from_micros(200));
            }
        });
        // stop ticking even if the task panics, or the scope would never end
        let _stop = Stop(&done);
        task()
    })
}
struct Stop<'a>(&'a AtomicBool);
impl Drop for Stop<'_> {
    fn drop(&mut self) {self.0.store(true, Ordering::Relaxed)}
}

/// show the bridge logs of failing tests
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}


/// digital io module
pub fn dio(serial: u32) -> ModuleIdentity {
    ModuleIdentity {
        serial,
        module_type: module_type::DIO_14,
        input_length: 20,
        output_length: 18,
        .. Default::default()
    }
}
/// analog io module
pub fn aio(serial: u32) -> ModuleIdentity {
    ModuleIdentity {
        serial,
        module_type: module_type::AIO,
        input_length: 28,
        output_length: 18,
        .. Default::default()
    }
}
/// module handled by software only, never detected
pub fn virtual_module(serial: u32) -> ModuleIdentity {
    ModuleIdentity {
        serial,
        module_type: module_type::SOFTWARE_OFFSET + 1,
        input_length: 4,
        output_length: 4,
        .. Default::default()
    }
}

/**
    configuration laying out the head unit then the given chains, as discovery addresses them

    the head unit record starts at offset 0, the other modules follow with inputs then outputs
*/
pub fn layout(right: &[ModuleIdentity], left: &[ModuleIdentity]) -> Configuration {
    let addressed = core::iter::once((0, ModuleIdentity::head()))
        .chain(right.iter().enumerate().map(|(i, &m)| (FIRST_RIGHT_ADDRESS + i as u8, m)))
        .chain(left.iter().enumerate().map(|(i, &m)| (FIRST_LEFT_ADDRESS - i as u8, m)));
    let mut offset = 0;
    let mut configuration = Configuration::default();
    for (address, identity) in addressed {
        let input_offset = offset;
        let output_offset = input_offset + identity.input_length;
        offset = output_offset + identity.output_length;
        configuration.modules.push(ExpectedModule {
            address,
            identity,
            input_offset,
            output_offset,
            .. Default::default()
        });
    }
    configuration
}

/// default entry setting a register of the head unit record, which `layout` puts at offset 0
pub fn head_default<T>(register: Register<T>, bit_length: u16, default: u32) -> DefaultEntry {
    DefaultEntry {
        address: 0,
        offset: register.offset(),
        bit_position: 0,
        bit_length,
        default,
    }
}
