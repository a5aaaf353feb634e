//! Integration tests for restoring displays on every way out.

mod common;

use common::*;
use nox::lifecycle::{restore_all, RestoreReport};
use nox::{GammaBackend, MonitorRegistry, NameResolver, OverlayDimmer, TopologySource};
use std::panic::{self, AssertUnwindSafe};

fn dimmed_session(hw: &Shared) -> (MonitorRegistry, OverlayDimmer) {
    let mut registry = MonitorRegistry::new();
    let topology: &dyn TopologySource = &FakeTopology(hw.clone());
    let names: &dyn NameResolver = &FakeNames(hw.clone());
    let gamma: &dyn GammaBackend = &FakeGamma(hw.clone());
    registry.enumerate(topology, names, gamma);

    let mut overlays = OverlayDimmer::new(Box::new(FakeOverlays(hw.clone())));
    overlays.activate(registry.monitors(), 0.5);
    (registry, overlays)
}

// ============================================================================
// restore_all Tests
// ============================================================================

/// Test that restore_all puts back every ramp and removes every overlay.
#[test]
fn test_restore_all_restores_everything() {
    let hw = hardware(2);
    let (mut registry, mut overlays) = dimmed_session(&hw);
    assert_eq!(hw.borrow().overlays.len(), 2);

    let report = restore_all(&mut registry, &mut overlays);

    assert_eq!(
        report,
        RestoreReport {
            displays_restored: 2,
            overlays_destroyed: 2,
        }
    );
    assert!(hw.borrow().overlays.is_empty());
    assert_eq!(hw.borrow().open_devices, 0);
    assert_eq!(hw.borrow().ramp(&system_id(1)), calibrated_ramp(0));
    assert_eq!(hw.borrow().ramp(&system_id(2)), calibrated_ramp(1));
}

/// Test that a second restore_all is a no-op.
#[test]
fn test_restore_all_twice() {
    let hw = hardware(2);
    let (mut registry, mut overlays) = dimmed_session(&hw);

    restore_all(&mut registry, &mut overlays);
    hw.borrow_mut().reset_writes();

    let second = restore_all(&mut registry, &mut overlays);

    assert!(second.is_noop());
    assert_eq!(hw.borrow().total_writes(), 0);
    assert!(hw.borrow().overlays.is_empty());
}

/// Test that restore_all with nothing enumerated does nothing.
#[test]
fn test_restore_all_on_empty_session() {
    let hw = hardware(0);
    let (mut registry, mut overlays) = dimmed_session(&hw);

    assert!(restore_all(&mut registry, &mut overlays).is_noop());
}

// ============================================================================
// Round-Trip Tests
// ============================================================================

/// Test that any dim level followed by shutdown leaves the ramp bit-for-bit original.
#[test]
fn test_apply_then_restore_round_trip() {
    for percent in [0, 1, 30, 50, 99, 100] {
        let hw = hardware(2);
        let originals = [hw.borrow().ramp(&system_id(1)), hw.borrow().ramp(&system_id(2))];
        let mut dimmer = coordinator(&hw);

        dimmer.set_master(percent);
        dimmer.set_individual(1, 100 - percent);
        dimmer.shutdown();

        assert_eq!(hw.borrow().ramp(&system_id(1)), originals[0], "{}%", percent);
        assert_eq!(hw.borrow().ramp(&system_id(2)), originals[1], "{}%", percent);
    }
}

// ============================================================================
// Scoped Release Tests
// ============================================================================

/// Test that dropping the coordinator restores displays without an explicit shutdown.
#[test]
fn test_drop_restores_displays() {
    let hw = hardware(2);
    {
        let mut dimmer = coordinator(&hw);
        dimmer.set_master(60);
        dimmer.toggle_mode();
        assert_eq!(hw.borrow().open_devices, 2);
    }

    assert_eq!(hw.borrow().open_devices, 0);
    assert!(hw.borrow().overlays.is_empty());
    assert_eq!(hw.borrow().ramp(&system_id(1)), calibrated_ramp(0));
}

/// Test that a panic while dimmed still restores the displays during unwinding.
#[test]
fn test_panic_restores_displays() {
    let hw = hardware(2);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut dimmer = coordinator(&hw);
        dimmer.set_master(80);
        dimmer.toggle_mode();
        panic!("control panel crashed");
    }));

    assert!(result.is_err());
    assert_eq!(hw.borrow().open_devices, 0);
    assert!(hw.borrow().overlays.is_empty());
    assert_eq!(hw.borrow().ramp(&system_id(2)), calibrated_ramp(1));
}

/// Test that shutdown followed by drop does not write the ramps twice.
#[test]
fn test_shutdown_then_drop_writes_once() {
    let hw = hardware(1);
    let mut dimmer = coordinator(&hw);
    dimmer.set_master(20);
    hw.borrow_mut().reset_writes();

    dimmer.shutdown();
    drop(dimmer);

    assert_eq!(hw.borrow().writes_to(&system_id(1)), 1);
}

/// Test that a display failing to take back its ramp does not block the others.
#[test]
fn test_failed_restore_does_not_stop_other_displays() {
    let hw = hardware(2);
    let mut dimmer = coordinator(&hw);
    dimmer.set_master(70);
    hw.borrow_mut().unwritable.insert(system_id(1));

    let report = dimmer.shutdown();

    assert_eq!(report.displays_restored, 2);
    assert_eq!(hw.borrow().open_devices, 0);
    assert_eq!(hw.borrow().ramp(&system_id(2)), calibrated_ramp(1));
    assert_ne!(hw.borrow().ramp(&system_id(1)), calibrated_ramp(0));
}
