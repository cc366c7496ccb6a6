//! `poll(2)` 事件掩码。

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use globalfifo::Readiness;

/// 与 `<poll.h>` 取值一致的事件位集合。
///
/// 由核心的 [`Readiness`] 转换而来：可读映射为 `POLLIN | POLLRDNORM`，
/// 可写映射为 `POLLOUT | POLLWRNORM`。
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct PollMask(u16);

impl PollMask {
    pub const EMPTY: PollMask = PollMask(0);
    pub const POLLIN: PollMask = PollMask(0x0001);
    pub const POLLOUT: PollMask = PollMask(0x0004);
    pub const POLLRDNORM: PollMask = PollMask(0x0040);
    pub const POLLWRNORM: PollMask = PollMask(0x0100);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: PollMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Readiness> for PollMask {
    fn from(readiness: Readiness) -> Self {
        let mut mask = PollMask::EMPTY;
        if readiness.is_readable() {
            mask |= PollMask::POLLIN | PollMask::POLLRDNORM;
        }
        if readiness.is_writable() {
            mask |= PollMask::POLLOUT | PollMask::POLLWRNORM;
        }
        mask
    }
}

impl BitOr for PollMask {
    type Output = PollMask;

    fn bitor(self, rhs: PollMask) -> PollMask {
        PollMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for PollMask {
    fn bitor_assign(&mut self, rhs: PollMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PollMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PollMask, &str); 4] = [
            (PollMask::POLLIN, "POLLIN"),
            (PollMask::POLLOUT, "POLLOUT"),
            (PollMask::POLLRDNORM, "POLLRDNORM"),
            (PollMask::POLLWRNORM, "POLLWRNORM"),
        ];
        let mut set = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_maps_to_normal_data_bits() {
        let mask = PollMask::from(Readiness::READABLE | Readiness::WRITABLE);
        assert_eq!(mask.bits(), 0x0001 | 0x0004 | 0x0040 | 0x0100);

        let mask = PollMask::from(Readiness::WRITABLE);
        assert!(!mask.contains(PollMask::POLLIN));
        assert!(mask.contains(PollMask::POLLOUT | PollMask::POLLWRNORM));

        assert!(PollMask::from(Readiness::EMPTY).is_empty());
    }

    #[test]
    fn debug_lists_flag_names() {
        let mask = PollMask::POLLIN | PollMask::POLLRDNORM;
        assert_eq!(format!("{mask:?}"), "{POLLIN, POLLRDNORM}");
    }
}
