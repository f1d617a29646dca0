//! 单实例锁
//!
//! Linux 上绑定一个抽象命名空间的 Unix 套接字：同名绑定失败即说明已有实例在运行。
//! 进程退出时内核自动释放，不留下文件。其他平台上为空操作。

use std::io;

/// 持有期间锁有效
#[derive(Debug)]
pub struct InstanceLock {
    #[cfg(target_os = "linux")]
    _socket: std::os::unix::net::UnixDatagram,
}

impl InstanceLock {
    /// 尝试获取锁
    ///
    /// # 返回
    /// - `Ok(Some(lock))`: 获取成功
    /// - `Ok(None)`: 已有实例持有同名锁
    #[cfg(target_os = "linux")]
    pub fn acquire(name: &str) -> io::Result<Option<Self>> {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::net::{SocketAddr, UnixDatagram};

        let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
        match UnixDatagram::bind_addr(&addr) {
            Ok(socket) => Ok(Some(Self { _socket: socket })),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn acquire(name: &str) -> io::Result<Option<Self>> {
        tracing::warn!("⚠️ 当前平台不支持单实例锁，跳过 {}", name);
        Ok(Some(Self {}))
    }

    /// 主动释放锁
    pub fn release(self) {}
}

/// 获取名为 `name` 的锁
pub fn lock(name: &str) -> io::Result<Option<InstanceLock>> {
    InstanceLock::acquire(name)
}

/// 释放锁
pub fn unlock(lock: InstanceLock) {
    lock.release();
}
