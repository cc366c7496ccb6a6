//! 就绪掩码。

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};

/// 描述“此刻非阻塞读/写能否成功”的位掩码。
///
/// 由 [`BoundedBuffer::poll_readiness`](crate::BoundedBuffer::poll_readiness) 在持锁期间一次性计算，
/// 两个位反映的是同一时刻的 `length`，不会出现“读位来自旧值、写位来自新值”的撕裂。
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Readiness(u8);

impl Readiness {
    pub const EMPTY: Readiness = Readiness(0);
    /// `length > 0`：非阻塞读至少能取到一个字节。
    pub const READABLE: Readiness = Readiness(0b01);
    /// `length < capacity`：非阻塞写至少能写入一个字节。
    pub const WRITABLE: Readiness = Readiness(0b10);

    pub(crate) fn of(length: usize, capacity: usize) -> Self {
        let mut mask = Readiness::EMPTY;
        if length > 0 {
            mask |= Readiness::READABLE;
        }
        if length < capacity {
            mask |= Readiness::WRITABLE;
        }
        mask
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// 丢弃未定义的位。
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Readiness(bits & 0b11)
    }

    pub const fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_readable(self) -> bool {
        self.contains(Readiness::READABLE)
    }

    pub const fn is_writable(self) -> bool {
        self.contains(Readiness::WRITABLE)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Readiness {
    type Output = Readiness;

    fn bitand(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 & rhs.0)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => f.write_str("Readiness(READABLE | WRITABLE)"),
            (true, false) => f.write_str("Readiness(READABLE)"),
            (false, true) => f.write_str("Readiness(WRITABLE)"),
            (false, false) => f.write_str("Readiness(EMPTY)"),
        }
    }
}
