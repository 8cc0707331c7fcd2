//! Boot-time driver summary.

use core::fmt;

use lantern_core::kinfo;
use lantern_driver_api::DriverState;

use crate::registry::{DriverHandle, Registry};

/// Status marker shown in front of each driver.
pub fn marker(state: DriverState) -> &'static str {
    match state {
        DriverState::Running => "[+]",
        DriverState::Failed => "[!]",
        DriverState::Disabled => "[x]",
        DriverState::Stopped => "[.]",
        DriverState::Starting | DriverState::Stopping => "[~]",
    }
}

/// One summary line: marker, name, description, type chain and address.
///
/// `[+] bcm2835-timer: BCM2835 system timer <timer < hardware < driver> @ 0x3f003000`
pub struct SummaryLine<'a>(pub &'a DriverHandle);

impl fmt::Display for SummaryLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle = self.0;
        let driver = handle.driver();
        write!(
            f,
            "{} {}: {} <{}>",
            marker(handle.state()),
            handle.name(),
            driver.description(),
            handle.driver_type()
        )?;
        if driver.address() != 0 {
            write!(f, " @ {:#x}", driver.address())?;
        }
        if let (DriverState::Failed, Some(error)) = (handle.state(), handle.last_failure()) {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

impl Registry {
    /// Logs one line per installed driver, in install order.
    pub fn log_summary(&self) {
        kinfo!("drivers: {} installed", self.len());
        for handle in self.iter(lantern_driver_api::identity::DRIVER.id) {
            kinfo!("  {}", SummaryLine(&handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_driver_api::identity::CLOCK;
    use lantern_driver_api::{Driver, DriverContext, DriverError, DriverType};

    use crate::registry::RegistryConfig;

    struct Rtc {
        fail: bool,
    }

    impl Driver for Rtc {
        fn driver_type(&self) -> &DriverType {
            &CLOCK
        }

        fn name(&self) -> &str {
            "pl031"
        }

        fn description(&self) -> &str {
            "PrimeCell real-time clock"
        }

        fn address(&self) -> u64 {
            0x0901_0000
        }

        fn on_start(&self, _cx: &DriverContext<'_>) -> Result<(), DriverError> {
            if self.fail {
                Err(DriverError::HookFailure("no response"))
            } else {
                Ok(())
            }
        }
    }

    static GOOD: Rtc = Rtc { fail: false };
    static BAD: Rtc = Rtc { fail: true };

    #[test]
    fn markers() {
        assert_eq!(marker(DriverState::Running), "[+]");
        assert_eq!(marker(DriverState::Failed), "[!]");
        assert_eq!(marker(DriverState::Disabled), "[x]");
        assert_eq!(marker(DriverState::Stopped), "[.]");
        assert_eq!(marker(DriverState::Starting), "[~]");
    }

    #[test]
    fn line_shows_chain_and_address() {
        let r = Registry::new(RegistryConfig::default());
        let h = r.install(&GOOD, false).unwrap();
        r.start(&h).unwrap();
        assert_eq!(
            format!("{}", SummaryLine(&h)),
            "[+] pl031: PrimeCell real-time clock <clock < hardware < driver> @ 0x9010000"
        );
    }

    #[test]
    fn failed_line_shows_reason() {
        let r = Registry::new(RegistryConfig::default());
        let h = r.install(&BAD, false).unwrap();
        r.start(&h).unwrap_err();
        assert!(format!("{}", SummaryLine(&h)).ends_with("@ 0x9010000 (no response)"));
        assert!(format!("{}", SummaryLine(&h)).starts_with("[!] "));
    }
}
