//! Driver type identity.
//!
//! Every driver class is described by a [`DriverType`] record. Records link
//! to their parent, forming a single-parent chain that ends at [`DRIVER`].
//! "Is this driver a timer?" is answered by walking that chain with
//! [`is_a`], without any help from the language's runtime type info.
//!
//! Identity comparisons use only [`DriverTypeId`]. Two records with the same
//! id are the same type, even if they live at different addresses (const
//! records are duplicated at each use site).

use core::fmt;

/// Numeric identity of a driver type.
///
/// Uniqueness across the kernel image is a build-time contract: each new
/// type picks a fresh 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverTypeId(pub u32);

impl fmt::Display for DriverTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Broad category of a driver type. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCategory {
    /// The root of every chain.
    Root,
    /// Drives a piece of hardware.
    Hardware,
    /// A kernel service with no device behind it.
    Software,
}

/// Metadata describing a driver class.
#[derive(Debug, Clone, Copy)]
pub struct DriverType {
    /// Unique identity.
    pub id: DriverTypeId,
    /// Short name, e.g. `"timer"`.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Broad category.
    pub category: DriverCategory,
    /// The type this one refines, or `None` for the root.
    pub parent: Option<&'static DriverType>,
}

impl DriverType {
    /// Creates a type record.
    pub const fn new(
        id: DriverTypeId,
        name: &'static str,
        description: &'static str,
        category: DriverCategory,
        parent: Option<&'static DriverType>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            category,
            parent,
        }
    }

    /// Creates a record refining `parent`, inheriting its category.
    pub const fn child_of(
        parent: &'static DriverType,
        id: DriverTypeId,
        name: &'static str,
        description: &'static str,
    ) -> Self {
        Self::new(id, name, description, parent.category, Some(parent))
    }

    /// Returns `true` if this type is `wanted` or refines it.
    pub fn is_a(&self, wanted: DriverTypeId) -> bool {
        is_a(self, wanted)
    }

    /// Iterates over this type and its ancestors, most derived first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Number of links between this type and the root.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }
}

impl PartialEq for DriverType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DriverType {}

impl fmt::Display for DriverType {
    /// Formats the chain as `timer < hardware < driver`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ty) in self.ancestors().enumerate() {
            if i > 0 {
                f.write_str(" < ")?;
            }
            f.write_str(ty.name)?;
        }
        Ok(())
    }
}

/// Iterator over a type chain. See [`DriverType::ancestors`].
pub struct Ancestors<'a> {
    next: Option<&'a DriverType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a DriverType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// Returns `true` if `candidate` is `wanted` or has it as an ancestor.
///
/// Terminates when the chain is exhausted. Allocates nothing.
pub fn is_a(candidate: &DriverType, wanted: DriverTypeId) -> bool {
    candidate.ancestors().any(|ty| ty.id == wanted)
}

/// Associates a concrete driver type with its static type record.
///
/// Needed wherever a chain has to be built at compile time on top of a
/// driver's own type, e.g. [`ResidentService`](crate::ResidentService).
pub trait TypedDriver: crate::Driver {
    /// The type record every instance of this driver reports.
    const TYPE: &'static DriverType;
}

// ---------------------------------------------------------------------------
// Built-in types
// ---------------------------------------------------------------------------

/// Root of every type chain.
pub const DRIVER: DriverType = DriverType::new(
    DriverTypeId(0x0000_0001),
    "driver",
    "Driver",
    DriverCategory::Root,
    None,
);

/// Any hardware driver.
pub const HARDWARE: DriverType = DriverType::new(
    DriverTypeId(0x6821_6bb2),
    "hardware",
    "Hardware Driver",
    DriverCategory::Hardware,
    Some(&DRIVER),
);

/// Any software service.
pub const SOFTWARE: DriverType = DriverType::new(
    DriverTypeId(0x2f7c_9d1e),
    "software",
    "Software Service",
    DriverCategory::Software,
    Some(&DRIVER),
);

/// CPU drivers.
pub const PROCESSOR: DriverType = DriverType::child_of(
    &HARDWARE,
    DriverTypeId(0xc783_4a3f),
    "processor",
    "Processor Driver",
);

/// Real-time clocks.
pub const CLOCK: DriverType =
    DriverType::child_of(&HARDWARE, DriverTypeId(0x637d_b4b6), "clock", "Clock Driver");

/// Monotonic timers.
pub const TIMER: DriverType =
    DriverType::child_of(&HARDWARE, DriverTypeId(0x4a1b_0c7e), "timer", "Timer Driver");

/// Interrupt controllers.
pub const INTERRUPT: DriverType = DriverType::child_of(
    &HARDWARE,
    DriverTypeId(0x91e0_55d2),
    "interrupt",
    "Interrupt Driver",
);

/// Id of the resident-service node inserted above a wrapped driver's type.
pub const RESIDENT_ID: DriverTypeId = DriverTypeId(0xdc28_cbbc);

/// Stand-alone resident record, used to look up resident services.
///
/// Real resident services carry their own node whose parent is the wrapped
/// driver's type; this one only provides the id for lookups.
pub const RESIDENT: DriverType = DriverType::new(
    RESIDENT_ID,
    "resident",
    "Resident Service",
    DriverCategory::Software,
    Some(&DRIVER),
);

/// Declares a driver type record, optionally binding it to a driver type.
///
/// ```ignore
/// driver_type! {
///     /// Mini UART on the Raspberry Pi.
///     pub const MINI_UART: Hardware {
///         id: 0x5a17_0c01,
///         name: "mini-uart",
///         description: "BCM2835 Mini UART",
///         parent: lantern_driver_api::identity::HARDWARE,
///     } for MiniUart;
/// }
/// ```
#[macro_export]
macro_rules! driver_type {
    (
        $(#[$meta:meta])*
        $vis:vis const $name:ident: $category:ident {
            id: $id:expr,
            name: $type_name:expr,
            description: $description:expr,
            parent: $parent:expr $(,)?
        } $(for $driver:ty)?;
    ) => {
        $(#[$meta])*
        $vis const $name: $crate::identity::DriverType = $crate::identity::DriverType::new(
            $crate::identity::DriverTypeId($id),
            $type_name,
            $description,
            $crate::identity::DriverCategory::$category,
            Some(&$parent),
        );

        $(
            impl $crate::identity::TypedDriver for $driver {
                const TYPE: &'static $crate::identity::DriverType = &$name;
            }
        )?
    };
}
