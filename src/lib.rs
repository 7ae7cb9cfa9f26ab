//! 字符液晶屏状态显示库
//!
//! 周期性读取主机 CPU 温度、CPU 使用率与内存统计，依次显示在小尺寸字符屏上，
//! 每轮结束后倒计时等待下一轮。

pub mod config;
pub mod display;
pub mod error;
#[cfg(feature = "lcd")]
pub mod lcd;
pub mod panel;
pub mod scheduler;
pub mod stats;

// 重新导出主要的公共类型
pub use config::{Config, DisplayGeometry, TemperatureSource, TemperatureUnit};
pub use display::{DisplayAdapter, SimulatedDisplay};
pub use error::{MonitorError, Result};
pub use panel::{Countdown, Panel};
pub use scheduler::{CycleScheduler, Sleeper, State, TokioSleeper};
pub use stats::{CpuUtilization, MemoryStats, MetricSource, SystemMetrics};
