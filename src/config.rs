use crate::error::{MonitorError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// 默认的 sysfs 温度文件，数值单位为千分之一摄氏度
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// 温度显示单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// 把摄氏度换算为当前单位
    #[inline]
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// 屏幕上显示的单位后缀
    #[inline]
    pub fn suffix(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }
}

/// CPU 温度的来源
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemperatureSource {
    /// 树莓派固件工具 `vcgencmd measure_temp`
    #[default]
    Vcgencmd,
    /// sysfs 温度文件
    ThermalZone(PathBuf),
}

/// 字符屏尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGeometry {
    pub columns: usize,
    pub rows: usize,
}

impl Default for DisplayGeometry {
    #[inline]
    fn default() -> Self {
        Self {
            columns: 16,
            rows: 2,
        }
    }
}

impl DisplayGeometry {
    /// 整屏可容纳的字符数
    #[inline]
    pub fn capacity(&self) -> usize {
        self.columns * self.rows
    }
}

/// 启动时确定、运行期间不再变化的配置
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 两轮状态之间的间隔（分钟）
    pub poll_interval_minutes: u64,
    /// 每条消息的停留时间（秒）
    pub message_delay_seconds: u64,
    pub temperature_unit: TemperatureUnit,
    /// 是否逐核显示 CPU 使用率
    pub per_core_usage: bool,
    pub geometry: DisplayGeometry,
    pub temperature_source: TemperatureSource,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            poll_interval_minutes: 1,
            message_delay_seconds: 3,
            temperature_unit: TemperatureUnit::Fahrenheit,
            per_core_usage: true,
            geometry: DisplayGeometry::default(),
            temperature_source: TemperatureSource::Vcgencmd,
        }
    }
}

impl Config {
    /// 校验配置取值范围
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_minutes < 1 {
            return Err(MonitorError::InvalidConfig(
                "轮询间隔至少为 1 分钟".to_string(),
            ));
        }
        if self.poll_interval_minutes > u64::MAX / 60 {
            return Err(MonitorError::InvalidConfig(format!(
                "轮询间隔过大: {} 分钟",
                self.poll_interval_minutes
            )));
        }
        if self.geometry.columns < 1 || self.geometry.rows < 1 {
            return Err(MonitorError::InvalidConfig(format!(
                "显示尺寸不合法: {}x{}",
                self.geometry.columns, self.geometry.rows
            )));
        }
        Ok(())
    }

    /// 倒计时总秒数
    #[inline]
    pub fn wait_seconds(&self) -> u64 {
        self.poll_interval_minutes.saturating_mul(60)
    }

    /// 每条消息之间的停顿
    #[inline]
    pub fn message_delay(&self) -> Duration {
        Duration::from_secs(self.message_delay_seconds)
    }
}
