//! 平台驱动：负责设备实例的 attach 与 detach。

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FifoConfig;
use crate::device::FifoDevice;
use crate::error::DeviceError;

/// 单实例平台驱动。
///
/// # 教案式说明
/// - **意图 (Why)**：内核版 globalfifo 驱动在 probe 时分配设备结构并注册杂项设备，在 remove 时注销；
///   这里把“当前挂载的实例”收拢到一个槽位中，不再依赖进程级全局变量；
/// - **契约 (What)**：
///   - 同一时刻至多挂载一个实例，重复 `probe` 返回 [`DeviceError::AlreadyAttached`]；
///   - `remove` 关闭缓冲区并清空槽位，唤醒仍阻塞在该实例上的调用使其以 `Closed` 退出；
///   - 槽位为空时 `remove` 返回 [`DeviceError::NotAttached`]；
/// - **风险提示 (Trade-offs)**：`remove` 不等待已打开的文件释放；这些文件之后的调用都返回 `Closed`，
///   析构时的注销依旧安全。
#[derive(Debug, Default)]
pub struct FifoDriver {
    slot: Mutex<Option<Arc<FifoDevice>>>,
}

impl FifoDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置创建并挂载设备实例。
    pub fn probe(&self, config: FifoConfig) -> Result<Arc<FifoDevice>, DeviceError> {
        let mut slot = self.slot.lock();
        if let Some(existing) = slot.as_ref() {
            tracing::warn!(
                device = existing.name(),
                requested = %config.name,
                "fifo probe rejected: device already attached"
            );
            return Err(DeviceError::AlreadyAttached {
                name: existing.name().to_owned(),
            });
        }

        let device = Arc::new(FifoDevice::attach(&config)?);
        *slot = Some(Arc::clone(&device));
        tracing::info!(
            device = %config.name,
            capacity = config.capacity,
            policy = ?config.wake_policy,
            "fifo driver probed"
        );
        Ok(device)
    }

    /// 卸载当前实例。
    pub fn remove(&self) -> Result<(), DeviceError> {
        let device = self.slot.lock().take().ok_or(DeviceError::NotAttached)?;
        device.detach();
        tracing::info!(device = device.name(), "fifo driver removed");
        Ok(())
    }

    /// 当前挂载的实例。
    pub fn device(&self) -> Option<Arc<FifoDevice>> {
        self.slot.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_remove_cycle() {
        let driver = FifoDriver::new();
        assert!(!driver.is_attached());
        let device = driver.probe(FifoConfig::default()).expect("probe");
        assert_eq!(device.name(), "globalfifo");
        assert!(driver.is_attached());

        let err = driver
            .probe(FifoConfig::default())
            .expect_err("重复 probe");
        assert!(matches!(err, DeviceError::AlreadyAttached { ref name } if name == "globalfifo"));

        driver.remove().expect("remove");
        assert!(device.buffer().is_closed());
        assert!(driver.device().is_none());
        assert!(matches!(driver.remove(), Err(DeviceError::NotAttached)));

        driver.probe(FifoConfig::default()).expect("卸载后可再次 probe");
    }

    #[test]
    fn invalid_config_leaves_slot_empty() {
        let driver = FifoDriver::new();
        let err = driver
            .probe(FifoConfig::default().with_capacity(0))
            .expect_err("容量为 0");
        assert!(matches!(err, DeviceError::Config(_)));
        assert!(!driver.is_attached());
    }
}
