//! 控制命令。

use globalfifo::FifoError;

/// 清空缓冲区的 ioctl 命令号。
pub const FIFO_CLEAR: u32 = 0x1;

/// 已识别的控制命令。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum FifoCommand {
    Clear,
}

impl FifoCommand {
    pub fn raw(self) -> u32 {
        match self {
            FifoCommand::Clear => FIFO_CLEAR,
        }
    }
}

impl TryFrom<u32> for FifoCommand {
    type Error = FifoError;

    /// 未知命令号返回 `InvalidArgument`，对应驱动的 `-EINVAL`。
    fn try_from(cmd: u32) -> Result<Self, Self::Error> {
        match cmd {
            FIFO_CLEAR => Ok(FifoCommand::Clear),
            other => Err(FifoError::invalid_argument(format!(
                "unsupported ioctl command {other:#x}"
            ))),
        }
    }
}
