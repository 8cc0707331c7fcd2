//! Hardware resources held by a driver while it is active.
//!
//! A driver subscribes to physical memory ranges and IRQ lines from its
//! start hook through its [`DriverContext`](crate::DriverContext). The
//! registry drops every subscription when the driver stops or fails to
//! start, so [`Resources`] of an idle driver are always empty.

use alloc::vec::Vec;
use core::fmt;

use lantern_core::sync::SpinLock;

/// A half-open physical address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    /// First address in the range.
    pub start: usize,
    /// One past the last address.
    pub end: usize,
}

impl MemoryRange {
    /// The range of `len` bytes starting at `start`. Saturates at the top of
    /// the address space.
    pub const fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start.saturating_add(len),
        }
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the range covers no address.
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns `true` if the two ranges share at least one address.
    pub const fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.start, self.end)
    }
}

/// A set of IRQ lines, one bit per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqSet([u64; 4]);

impl IrqSet {
    /// No lines.
    pub const EMPTY: Self = Self([0; 4]);

    const fn slot(irq: u8) -> (usize, u64) {
        ((irq / 64) as usize, 1 << (irq % 64))
    }

    /// Returns `true` if `irq` is in the set.
    pub const fn contains(&self, irq: u8) -> bool {
        let (word, bit) = Self::slot(irq);
        self.0[word] & bit != 0
    }

    /// Adds `irq`. Returns `true` if it was not already present.
    pub fn insert(&mut self, irq: u8) -> bool {
        let (word, bit) = Self::slot(irq);
        let added = self.0[word] & bit == 0;
        self.0[word] |= bit;
        added
    }

    /// Removes `irq`. Returns `true` if it was present.
    pub fn remove(&mut self, irq: u8) -> bool {
        let (word, bit) = Self::slot(irq);
        let present = self.0[word] & bit != 0;
        self.0[word] &= !bit;
        present
    }

    /// Returns `true` if no line is set.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// The lines in the set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |irq| self.contains(*irq))
    }
}

#[derive(Default)]
struct Held {
    /// Sorted, non-overlapping, non-adjacent.
    memory: Vec<MemoryRange>,
    irqs: IrqSet,
}

/// The resources one driver instance currently holds.
pub struct Resources {
    held: SpinLock<Held>,
}

impl Resources {
    /// An empty record.
    pub const fn new() -> Self {
        Self {
            held: SpinLock::new(Held {
                memory: Vec::new(),
                irqs: IrqSet::EMPTY,
            }),
        }
    }

    /// Adds `range`, merging it with any range it touches.
    pub fn add_memory(&self, range: MemoryRange) {
        if range.is_empty() {
            return;
        }
        let mut held = self.held.lock();
        let mut merged = range;
        held.memory.retain(|r| {
            if r.start <= merged.end && merged.start <= r.end {
                merged.start = merged.start.min(r.start);
                merged.end = merged.end.max(r.end);
                false
            } else {
                true
            }
        });
        let at = held.memory.partition_point(|r| r.start < merged.start);
        held.memory.insert(at, merged);
    }

    /// Removes `range`, splitting any held range it cuts through.
    pub fn remove_memory(&self, range: MemoryRange) {
        let mut held = self.held.lock();
        let mut kept = Vec::with_capacity(held.memory.len() + 1);
        for r in held.memory.drain(..) {
            if !r.overlaps(&range) {
                kept.push(r);
                continue;
            }
            if r.start < range.start {
                kept.push(MemoryRange {
                    start: r.start,
                    end: range.start,
                });
            }
            if range.end < r.end {
                kept.push(MemoryRange {
                    start: range.end,
                    end: r.end,
                });
            }
        }
        held.memory = kept;
    }

    /// Returns `true` if any held range overlaps `range`.
    pub fn holds_memory(&self, range: MemoryRange) -> bool {
        self.held.lock().memory.iter().any(|r| r.overlaps(&range))
    }

    /// Snapshot of the held memory ranges, in address order.
    pub fn memory(&self) -> Vec<MemoryRange> {
        self.held.lock().memory.clone()
    }

    /// Adds `irq` to the subscribed lines.
    pub fn subscribe_irq(&self, irq: u8) -> bool {
        self.held.lock().irqs.insert(irq)
    }

    /// Removes `irq` from the subscribed lines.
    pub fn unsubscribe_irq(&self, irq: u8) -> bool {
        self.held.lock().irqs.remove(irq)
    }

    /// The subscribed IRQ lines.
    pub fn irqs(&self) -> IrqSet {
        self.held.lock().irqs
    }

    /// Returns `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        let held = self.held.lock();
        held.memory.is_empty() && held.irqs.is_empty()
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        *self.held.lock() = Held::default();
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}
