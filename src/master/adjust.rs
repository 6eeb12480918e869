use std::vec;
use thiserror::Error;
use log::*;

use crate::registers::{Status, module_type};
use super::devices::{Configuration, DetectedModule, DeviceList};


/// mismatch between the detected modules and the configuration
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no configuration loaded")]
    NoConfiguration,
    #[error("module at address {address} has type {detected}, configured {expected}")]
    WrongModuleType {address: u8, detected: u16, expected: u16},
    #[error("module at address {address} has {detected} input bytes, configured {expected}")]
    WrongInputLength {address: u8, detected: u16, expected: u16},
    #[error("module at address {address} has {detected} output bytes, configured {expected}")]
    WrongOutputLength {address: u8, detected: u16, expected: u16},
}
impl ConfigError {
    pub const fn code(&self) -> i32 {
        match self {
            Self::NoConfiguration => -1,
            Self::WrongModuleType {..} => -10,
            Self::WrongInputLength {..} => -11,
            Self::WrongOutputLength {..} => -12,
        }
    }
}

/**
    match the detected modules against the configuration and take their process image offsets from it

    - a detected module absent from the configuration is deactivated
    - a detected module differing from its configuration is deactivated without offsets, and its configuration entry is left unused
    - every configuration entry left unused is appended as a synthesized module, active only for software modules

    all modules are processed even after a mismatch, the last mismatch is returned. Flags are added to `status`, never removed.
    Running it again on the same inputs gives the same result.
*/
pub fn adjust(devices: &mut DeviceList, configuration: Option<&Configuration>, status: &mut Status) -> Result<(), ConfigError> {
    let Some(configuration) = configuration
        else {return Err(ConfigError::NoConfiguration)};

    devices.drop_synthesized();
    let mut result = Ok(());
    let mut consumed = vec![false; configuration.modules.len()];

    for detected in devices.as_mut_slice() {
        let Some(index) = configuration.modules.iter()
                .position(|expected| expected.address == detected.address)
            else {
                debug!("address {}: module type {} not configured, deactivated", detected.address, detected.identity.module_type);
                detected.active = false;
                status.set_extra_module(true);
                continue
            };
        let expected = &configuration.modules[index];

        let mismatch = if detected.identity.module_type != expected.identity.module_type {
            Some(ConfigError::WrongModuleType {
                address: detected.address,
                detected: detected.identity.module_type,
                expected: expected.identity.module_type,
            })
        }
        else if detected.identity.input_length != expected.identity.input_length {
            Some(ConfigError::WrongInputLength {
                address: detected.address,
                detected: detected.identity.input_length,
                expected: expected.identity.input_length,
            })
        }
        else if detected.identity.output_length != expected.identity.output_length {
            Some(ConfigError::WrongOutputLength {
                address: detected.address,
                detected: detected.identity.output_length,
                expected: expected.identity.output_length,
            })
        }
        else {None};

        if let Some(error) = mismatch {
            warn!("{}, deactivated", error);
            // without offsets its data would land on the head unit record
            detected.active = false;
            status.set_size_mismatch(true);
            result = Err(error);
            continue
        }

        debug!("address {}: in {} out {} conf {}",
            detected.address, expected.input_offset, expected.output_offset, expected.config_offset);
        detected.input_offset = expected.input_offset;
        detected.output_offset = expected.output_offset;
        detected.config_offset = expected.config_offset;
        detected.config_length = expected.config_length;
        detected.configured = true;
        consumed[index] = true;
    }

    // complete with the modules only present in the configuration
    for (expected, _) in configuration.modules.iter().zip(&consumed).filter(|(_, used)| !**used) {
        status.set_missing_module(true);
        let software = module_type::is_software(expected.identity.module_type);
        let mut identity = expected.identity;
        if !software {
            identity.module_type |= module_type::NOT_CONNECTED;
        }
        identity.feature_descriptor = 0;
        debug!("address {}: configured module type {} not detected", expected.address, expected.identity.module_type);
        devices.push_synthesized(DetectedModule {
            address: expected.address,
            identity,
            active: software,
            scanned: false,
            configured: true,
            input_offset: expected.input_offset,
            output_offset: expected.output_offset,
            config_offset: expected.config_offset,
            config_length: expected.config_length,
        });
    }

    result
}
