use pibridge::{
    registers::{module_type, Status},
    master::*,
    };
use master_suite::*;


/// device list as discovery would leave it
fn detected(right: &[ModuleIdentity], left: &[ModuleIdentity]) -> DeviceList {
    let mut devices = DeviceList::new(ModuleIdentity::head());
    for &module in right {
        devices.push_scanned(Direction::Right, module);
    }
    for &module in left {
        devices.push_scanned(Direction::Left, module);
    }
    devices
}

fn expected(configuration: &Configuration, address: u8) -> &ExpectedModule {
    configuration.modules.iter()
        .find(|m| m.address == address)
        .expect("address not configured")
}
fn module(devices: &DeviceList, address: u8) -> &DetectedModule {
    devices.as_slice().iter()
        .find(|m| m.address == address)
        .expect("address not detected")
}


#[test]
fn matching_configuration() {
    let (right, left) = ([dio(1), aio(2)], [dio(3)]);
    let configuration = layout(&right, &left);
    let mut devices = detected(&right, &left);
    let mut status = Status::default();

    assert_eq!(adjust(&mut devices, Some(&configuration), &mut status), Ok(()));
    assert_eq!(status, Status::default());
    assert_eq!(devices.len(), 4);
    for detected in devices.as_slice() {
        let expected = expected(&configuration, detected.address);
        assert!(detected.active && detected.configured);
        assert_eq!(detected.input_offset, expected.input_offset);
        assert_eq!(detected.output_offset, expected.output_offset);
    }
    assert_eq!(devices.overlapping(), None);
}

#[test]
fn no_configuration() {
    let mut devices = detected(&[dio(1)], &[]);
    let before = devices.as_slice().to_vec();
    let mut status = Status::default();

    let result = adjust(&mut devices, None, &mut status);
    assert_eq!(result, Err(ConfigError::NoConfiguration));
    assert_eq!(result.map_err(|e| e.code()), Err(-1));
    assert_eq!(devices.as_slice(), before);
}

#[test]
fn extra_module() {
    let configuration = layout(&[dio(1)], &[]);
    let mut devices = detected(&[dio(1), dio(2)], &[]);
    let mut status = Status::default();

    assert_eq!(adjust(&mut devices, Some(&configuration), &mut status), Ok(()));
    assert!(status.extra_module());
    assert!(!status.missing_module());
    let extra = module(&devices, 33);
    assert!(!extra.active);
    assert!(!extra.configured);
    assert!(module(&devices, 32).active);
}

#[test]
fn wrong_module_type() {
    let configuration = layout(&[dio(1)], &[]);
    let mut devices = detected(&[aio(1)], &[]);
    let mut status = Status::default();

    let result = adjust(&mut devices, Some(&configuration), &mut status);
    assert_eq!(result, Err(ConfigError::WrongModuleType {
        address: 32,
        detected: module_type::AIO,
        expected: module_type::DIO_14,
    }));
    assert_eq!(result.map_err(|e| e.code()), Err(-10));
    assert!(status.size_mismatch());

    // the detected module keeps no offsets and is left out of data exchange, the configured one is synthesized
    let found = &devices.as_slice()[1];
    assert!(found.scanned && !found.configured && !found.active);
    assert_eq!((found.input_offset, found.output_offset), (0, 0));
    assert!(status.missing_module());
    let synthesized = devices.as_slice().last().unwrap();
    assert_eq!(synthesized.address, 32);
    assert!(!synthesized.scanned && !synthesized.active);
    assert_eq!(synthesized.identity.module_type, module_type::DIO_14 | module_type::NOT_CONNECTED);
    assert_eq!(synthesized.input_offset, expected(&configuration, 32).input_offset);
}

#[test]
fn wrong_lengths() {
    let mut longer = dio(1);
    longer.input_length = 8;
    let mut shorter = dio(1);
    shorter.input_length = 4;
    let configuration = layout(&[longer], &[]);
    let mut devices = detected(&[shorter], &[]);
    let mut status = Status::default();

    let result = adjust(&mut devices, Some(&configuration), &mut status);
    assert_eq!(result, Err(ConfigError::WrongInputLength {address: 32, detected: 4, expected: 8}));
    assert_eq!(result.map_err(|e| e.code()), Err(-11));
    assert!(status.size_mismatch());
    assert_eq!(devices.as_slice()[1].input_offset, 0);
    assert!(!devices.as_slice()[1].active);
    // nothing active overlays the head unit record
    assert_eq!(devices.overlapping(), None);
    let head = devices.as_slice()[0].inputs();
    assert!(devices.as_slice().iter().skip(1)
        .filter(|m| m.active)
        .all(|m| m.inputs().start >= head.end));

    let mut wider = dio(1);
    wider.output_length = 2;
    let configuration = layout(&[wider], &[]);
    let mut devices = detected(&[dio(1)], &[]);
    let result = adjust(&mut devices, Some(&configuration), &mut Status::default());
    assert_eq!(result.map_err(|e| e.code()), Err(-12));
}

#[test]
fn last_mismatch_reported() {
    let configuration = layout(&[dio(1), dio(2)], &[]);
    let mut devices = detected(&[aio(1), aio(2)], &[]);

    let result = adjust(&mut devices, Some(&configuration), &mut Status::default());
    assert!(matches!(result, Err(ConfigError::WrongModuleType {address: 33, ..})));
    // both configured modules are synthesized
    assert_eq!(devices.len(), 5);
}

#[test]
fn missing_modules() {
    let configuration = layout(&[dio(1), virtual_module(2)], &[aio(3)]);
    let mut devices = detected(&[dio(1)], &[]);
    let mut status = Status::default();

    assert_eq!(adjust(&mut devices, Some(&configuration), &mut status), Ok(()));
    assert!(status.missing_module());
    assert!(!status.extra_module());
    assert_eq!(devices.len(), 4);
    assert_eq!(devices.scanned_count(), 2);

    let software = module(&devices, 33);
    assert!(software.active && software.configured && !software.scanned);
    assert_eq!(software.identity.module_type, virtual_module(2).module_type);
    assert_eq!(software.output_offset, expected(&configuration, 33).output_offset);

    let hardware = module(&devices, 31);
    assert!(!hardware.active && hardware.configured && !hardware.scanned);
    assert_eq!(hardware.identity.module_type & module_type::NOT_CONNECTED_MASK, module_type::AIO);
    assert_ne!(hardware.identity.module_type & module_type::NOT_CONNECTED, 0);
    assert_eq!(hardware.input_offset, expected(&configuration, 31).input_offset);
}

#[test]
fn idempotent() {
    let configuration = layout(&[dio(1), virtual_module(2)], &[aio(3)]);
    let mut devices = detected(&[dio(1), dio(9)], &[]);
    let mut status = Status::default();

    let first = adjust(&mut devices, Some(&configuration), &mut status);
    let (once, status_once) = (devices.as_slice().to_vec(), status);
    let second = adjust(&mut devices, Some(&configuration), &mut status);

    assert_eq!(first, second);
    assert_eq!(devices.as_slice(), once);
    assert_eq!(status, status_once);
}

#[test]
fn overlapping_layout() {
    let (right, left) = ([dio(1)], [dio(2)]);
    let mut configuration = layout(&right, &left);
    configuration.modules[2].input_offset = configuration.modules[1].input_offset + 4;
    let mut devices = detected(&right, &left);

    assert_eq!(adjust(&mut devices, Some(&configuration), &mut Status::default()), Ok(()));
    assert_eq!(devices.overlapping(), Some((32, 31)));
}
