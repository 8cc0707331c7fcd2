//! Randomized-schedule check of exclusive starts.
//!
//! Two processor drivers share one exclusive slot and are started from
//! concurrent threads. Under every explored schedule exactly one wins and
//! the other ends up failed with `AlreadyClaimed`.
//!
//! The slot and the lifecycle use `core` atomics, which shuttle does not
//! instrument. Threads are only switched at the explicit `yield_now` in the
//! start hook, so this explores the orderings of whole claims, not the
//! interleavings inside the compare-and-swap. The loom model in
//! `lantern-core` covers those.

use lantern_driver_api::exclusive::ExclusiveSlot;
use lantern_driver_api::identity::PROCESSOR;
use lantern_driver_api::{Driver, DriverContext, DriverError, DriverState, DriverType};
use lantern_drivers::{Registry, RegistryConfig};

struct Cpu {
    name: &'static str,
    slot: &'static ExclusiveSlot,
}

impl Driver for Cpu {
    fn driver_type(&self) -> &DriverType {
        &PROCESSOR
    }

    fn name(&self) -> &str {
        self.name
    }

    fn on_start(&self, cx: &DriverContext<'_>) -> Result<(), DriverError> {
        shuttle::thread::yield_now();
        self.slot.claim(cx)
    }
}

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

#[test]
fn concurrent_exclusive_starts_have_one_winner() {
    shuttle::check_random(
        || {
            let slot = leak(ExclusiveSlot::new(&PROCESSOR, "A CPU driver is already active"));
            let registry = leak(Registry::new(RegistryConfig {
                autostart_builtin: false,
            }));
            let a = registry.install(leak(Cpu { name: "a", slot }), true).unwrap();
            let b = registry.install(leak(Cpu { name: "b", slot }), true).unwrap();

            let threads: Vec<_> = [a.clone(), b.clone()]
                .into_iter()
                .map(|handle| shuttle::thread::spawn(move || registry.start(&handle)))
                .collect();
            let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.contains(&Err(DriverError::AlreadyClaimed(
                "A CPU driver is already active"
            ))));

            let states = [a.state(), b.state()];
            assert!(states.contains(&DriverState::Running));
            assert!(states.contains(&DriverState::Failed));
            let winner = if a.is_running() { &a } else { &b };
            assert!(slot.is_claimed_by(winner.instance()));
        },
        200,
    );
}
