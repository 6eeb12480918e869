use std::{
    sync::Arc,
    time::Duration,
    };
use futures_concurrency::future::Race;
use serial_test::serial;

use pibridge::master::*;
use master_suite::*;


fn test<T, F>(bench: &Bench, configuration: Option<Configuration>, test: T)
where
    T: FnOnce(Arc<BenchBridge>) -> F,
    F: Future,
{
    init_logging();
    let bridge = Arc::new(bridge(bench, configuration));
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async move {
        (
            async {
                tokio::time::timeout(Duration::from_secs(10), test(bridge.clone()))
                .await.expect("aborted test because took too long");
            },
            async {
                bridge.clone().run(Duration::from_millis(1))
                .await.expect("bridge run loop failed");
            },
        ).race().await;
    });
}

async fn wait_for(bridge: &BenchBridge, state: BridgeState) {
    while bridge.state() != state {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}


#[test]
#[serial]
fn runs_periodically() {
    let bench = Bench::new(&[dio(1)], &[aio(2)]);
    let sim = bench.clone();
    test(&bench, Some(layout(&[dio(1)], &[aio(2)])), |bridge| async move {
        wait_for(&bridge, BridgeState::Running).await;
        assert_eq!(bridge.modules().len(), 3);

        let cycles = sim.state().cycles;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sim.state().cycles > cycles);
    });
}

#[test]
#[serial]
fn firmware_while_running() {
    let bench = Bench::new(&[dio(1)], &[]);
    let sim = bench.clone();
    test(&bench, Some(layout(&[dio(1)], &[])), |bridge| async move {
        wait_for(&bridge, BridgeState::Running).await;

        let request = bridge.clone();
        let result = tokio::task::spawn_blocking(move || request.enter_firmware_mode(32, true))
            .await.unwrap();
        assert_eq!(result, Err(Error::NotStopped));

        bridge.request_stop();
        let request = bridge.clone();
        tokio::task::spawn_blocking(move || {
            request.enter_firmware_mode(32, true)?;
            request.write_flash(0, &[0; 300])?;
            request.reset_firmware_target()
        }).await.unwrap().unwrap();

        assert_eq!(sim.state().flash_writes, [(0, 250), (250, 50)]);
        // data exchange was left before the module was flashed
        assert_eq!(sim.state().discovery_fallbacks, 1);
        assert_eq!(bridge.state(), BridgeState::Stopped);

        // back to data exchange with the same modules
        bridge.request_continue();
        let cycles = sim.state().cycles;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sim.state().cycles > cycles);
        assert_eq!(sim.state().dialogues, [32]);
    });
}
