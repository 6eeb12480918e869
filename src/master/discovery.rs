/*!
    discovery of the modules chained on both ports of the head unit

    The head unit first pulses both sense lines to announce itself, then walks the right chain and the
    left chain. On each side it pulls the control line to select the first module, and configures
    modules one by one as long as the sense line reports another module waiting. A side is considered
    exhausted when the sense line goes low, or after more than [MAX_FAILURES] consecutive failed
    configurations.

    ```text
    Init -> PresentSignalling -> Detect(Right) -> ConfigStart(Right) -> ConfigDialogue(Right) <-> DetectionPending(Right)
                                      |                                         |                          |
                                      +-------------> Detect(Left) <------------+--------------------------+
                                                           |   (same sequence on the left side)
                                                           +-------> ApplyConfigAndStart -> Running
    ```
*/

use core::time::Duration;
use log::*;

use super::{
    hardware::{Clock, Direction, Level, Line, Mode, SignalLines, Transport},
    devices::DeviceList,
    firmware::FirmwareStep,
    timer::Timer,
    };


/// time left to modules to answer the presence pulse
pub const PRESENT_TIMEOUT: Duration = Duration::from_millis(30);
/// time for a module to notice its control line was pulled
pub const SELECT_SETTLE: Duration = Duration::from_millis(10);
/// time for the next module to raise its sense line after its predecessor was configured
pub const DETECTION_DELAY: Duration = Duration::from_millis(10);
/// consecutive configuration failures tolerated before a chain is considered finished
pub const MAX_FAILURES: u8 = 5;


/// phase of the bridge sequencer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// release all discovery lines
    Init,
    /// pulse the sense lines to announce the master
    PresentSignalling,
    /// check whether a module waits on this side
    Detect(Direction),
    /// select the first module of the chain
    ConfigStart(Direction),
    /// configure the module currently selected
    ConfigDialogue(Direction),
    /// wait for the next module of the chain to show up
    DetectionPending(Direction),
    /// reconcile, lay out the process image and start data exchange
    ApplyConfigAndStart,
    /// cyclic data exchange
    Running,
    /// firmware update of a module, only while the bridge is stopped
    Firmware(FirmwareStep),
}
impl Phase {
    /// phase following the end of a chain
    const fn after_chain(direction: Direction) -> Self {
        match direction {
            Direction::Right => Phase::Detect(Direction::Left),
            Direction::Left => Phase::ApplyConfigAndStart,
        }
    }
}


/**
    state of the discovery sequencer

    transitions are edge triggered: [Sequencer::goto] raises the entering flag, and the entry action
    of the new phase runs exactly once, on the next step, when [Sequencer::enter] consumes it.
*/
#[derive(Clone, Debug)]
pub struct Sequencer {
    phase: Phase,
    entering: bool,
    timer: Timer,
    /// consecutive failed configurations on the current side
    failures: u8,
    /// next [Phase::ApplyConfigAndStart] keeps the previous configuration
    resume: bool,
}
impl Sequencer {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Init,
            entering: true,
            timer: Timer::new(),
            failures: 0,
            resume: false,
        }
    }
    pub fn phase(&self) -> Phase {self.phase}
    /// entry action of the current phase is still to be executed
    pub fn entering(&self) -> bool {self.entering}

    pub fn goto(&mut self, phase: Phase) {
        self.phase = phase;
        self.entering = true;
        // a deadline never carries over to another phase
        self.timer.stop();
    }
    /// restart data exchange with the current device list, without discovery
    pub fn resume(&mut self) {
        self.goto(Phase::ApplyConfigAndStart);
        self.resume = true;
    }
    /// consume the entering flag, true if the entry action must run now
    pub fn enter(&mut self) -> bool {
        let entering = core::mem::replace(&mut self.entering, false);
        if entering {
            debug!("enter {:?} phase", self.phase);
        }
        entering
    }
    /// whether the current [Phase::ApplyConfigAndStart] resumes a previous session, consumed on read
    pub fn take_resume(&mut self) -> bool {
        core::mem::replace(&mut self.resume, false)
    }

    /**
        advance the chain walk by one step

        only the discovery phases are handled here, others are left to the bridge
    */
    pub fn step<P, T>(&mut self, platform: &mut P, transport: &mut T, devices: &mut DeviceList, pulse: Duration)
    where
        P: SignalLines + Clock,
        T: Transport,
    {
        match self.phase {
            Phase::Init => {
                if self.enter() {
                    for direction in [Direction::Right, Direction::Left] {
                        platform.set_line(direction.control(), Level::Low, Mode::Input);
                        platform.set_line(direction.sense(), Level::Low, Mode::Input);
                    }
                }
                self.goto(Phase::PresentSignalling);
            },

            Phase::PresentSignalling => {
                if self.enter() {
                    for direction in [Direction::Left, Direction::Right] {
                        platform.set_line(direction.sense(), Level::High, Mode::Output);
                    }
                    platform.sleep(pulse);
                    for direction in [Direction::Left, Direction::Right] {
                        platform.set_line(direction.sense(), Level::Low, Mode::Input);
                    }
                    self.timer.start(&*platform, PRESENT_TIMEOUT);
                }
                if self.timer.expired(&*platform) {
                    self.goto(Phase::Detect(Direction::Right));
                }
            },

            Phase::Detect(direction) => {
                if self.enter() {
                    match direction {
                        Direction::Right => {
                            let left = platform.read_line(Line::Control(Direction::Left));
                            let right = platform.read_line(Line::Control(Direction::Right));
                            trace!("control lines before discovery: left {:?} right {:?}", left, right);
                        },
                        // the right chain is done, stop selecting it
                        Direction::Left => platform.set_line(Direction::Right.control(), Level::Low, Mode::Input),
                    }
                }
                if platform.read_line(direction.sense()) == Level::High {
                    self.goto(Phase::ConfigStart(direction));
                }
                else {
                    debug!("no module on the {:?} side", direction);
                    self.goto(Phase::after_chain(direction));
                }
            },

            Phase::ConfigStart(direction) => {
                if self.enter() {
                    platform.set_line(direction.control(), Level::Low, Mode::Output);
                    self.timer.start(&*platform, SELECT_SETTLE);
                }
                if self.timer.expired(&*platform) {
                    self.goto(Phase::ConfigDialogue(direction));
                }
            },

            Phase::ConfigDialogue(direction) => {
                if self.enter() {
                    self.failures = 0;
                }
                let address = devices.next_address(direction);
                match transport.write_next_config(direction, address) {
                    Ok(identity) => {
                        info!("{:?} module at address {}: type {} in {} out {}",
                            direction, address, identity.module_type, identity.input_length, identity.output_length);
                        devices.push_scanned(direction, identity);
                        self.goto(Phase::DetectionPending(direction));
                    },
                    Err(error) => {
                        self.failures += 1;
                        debug!("configuring address {} failed ({}), attempt {}", address, error, self.failures);
                        if self.failures > MAX_FAILURES {
                            // no more modules on this side
                            self.goto(Phase::after_chain(direction));
                        }
                    },
                }
            },

            Phase::DetectionPending(direction) => {
                if self.enter() {
                    self.timer.start(&*platform, DETECTION_DELAY);
                }
                if self.timer.expired(&*platform) {
                    if platform.read_line(direction.sense()) == Level::High {
                        self.goto(Phase::ConfigDialogue(direction));
                    }
                    else {
                        self.goto(Phase::after_chain(direction));
                    }
                }
            },

            Phase::ApplyConfigAndStart | Phase::Running | Phase::Firmware(_) => {},
        }
    }
}
impl Default for Sequencer {
    fn default() -> Self {Self::new()}
}
