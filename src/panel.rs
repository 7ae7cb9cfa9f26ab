use crate::config::TemperatureUnit;
use crate::stats::MemoryStats;
use std::time::Duration;

/// 屏幕上显示的一条指标
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub label: String,
    pub value: f64,
    /// 小数位数
    pub precision: usize,
    /// 单位后缀，显示在括号中
    pub unit: &'static str,
    /// 显示后停留的时间
    pub hold: Duration,
}

impl Panel {
    #[inline]
    pub fn new(
        label: impl Into<String>,
        value: f64,
        precision: usize,
        unit: &'static str,
        hold: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            value,
            precision,
            unit,
            hold,
        }
    }

    /// CPU 温度，两种单位都保留两位小数
    pub fn temperature(celsius: f64, unit: TemperatureUnit, hold: Duration) -> Self {
        Self::new("CPU Temperature", unit.from_celsius(celsius), 2, unit.suffix(), hold)
    }

    pub fn cpu_usage(percent: f32, hold: Duration) -> Self {
        Self::new("CPU Usage", f64::from(percent), 1, "%", hold)
    }

    /// 单核使用率，`index` 从 0 开始，显示时从 1 开始编号
    pub fn core_usage(index: usize, percent: f32, hold: Duration) -> Self {
        Self::new(format!("CPU {} Usage", index + 1), f64::from(percent), 1, "%", hold)
    }

    pub fn memory_total(stats: &MemoryStats, hold: Duration) -> Self {
        Self::new("Memory Total", stats.total, 2, "MB", hold)
    }

    pub fn memory_available(stats: &MemoryStats, hold: Duration) -> Self {
        Self::new("Memory Avail", stats.available, 2, "MB", hold)
    }

    pub fn memory_used(stats: &MemoryStats, hold: Duration) -> Self {
        Self::new("Memory Used", stats.used_percent, 2, "%", hold)
    }

    pub fn memory_free(stats: &MemoryStats, hold: Duration) -> Self {
        Self::new("Memory Free", stats.free, 2, "MB", hold)
    }

    /// 两行消息：标签一行，数值与单位一行
    pub fn message(&self) -> String {
        format!(
            "{}:\n{:.*} ({})",
            self.label, self.precision, self.value, self.unit
        )
    }
}

/// 两轮状态之间的倒计时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    #[inline]
    pub fn new(seconds: u64) -> Self {
        Self { remaining: seconds }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// 剩余时间，格式 `MM:SS`
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }

    pub fn message(&self) -> String {
        format!("Next status in: {}", self.clock())
    }

    /// 过去一秒
    #[inline]
    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_secs(3);

    #[test]
    fn test_temperature_fahrenheit() {
        let panel = Panel::temperature(48.3, TemperatureUnit::Fahrenheit, HOLD);
        assert_eq!(panel.message(), "CPU Temperature:\n118.94 (F)");
        assert_eq!(panel.hold, HOLD);
    }

    #[test]
    fn test_temperature_celsius_two_decimals() {
        let panel = Panel::temperature(48.3, TemperatureUnit::Celsius, HOLD);
        assert_eq!(panel.message(), "CPU Temperature:\n48.30 (C)");
    }

    #[test]
    fn test_cpu_usage_messages() {
        assert_eq!(
            Panel::cpu_usage(12.5, HOLD).message(),
            "CPU Usage:\n12.5 (%)"
        );
        assert_eq!(
            Panel::core_usage(0, 99.9, HOLD).message(),
            "CPU 1 Usage:\n99.9 (%)"
        );
        assert_eq!(Panel::core_usage(3, 0.0, HOLD).label, "CPU 4 Usage");
    }

    #[test]
    fn test_memory_messages() {
        let stats = MemoryStats::from_bytes((1 << 20) * 512, (1 << 20) * 256, (1 << 20) * 64);
        assert_eq!(
            Panel::memory_total(&stats, HOLD).message(),
            "Memory Total:\n512.00 (MB)"
        );
        assert_eq!(
            Panel::memory_available(&stats, HOLD).message(),
            "Memory Avail:\n256.00 (MB)"
        );
        assert_eq!(
            Panel::memory_used(&stats, HOLD).message(),
            "Memory Used:\n50.00 (%)"
        );
        assert_eq!(
            Panel::memory_free(&stats, HOLD).message(),
            "Memory Free:\n64.00 (MB)"
        );
    }

    #[test]
    fn test_countdown_clock() {
        assert_eq!(Countdown::new(125).message(), "Next status in: 02:05");
        assert_eq!(Countdown::new(60).clock(), "01:00");
        assert_eq!(Countdown::new(0).clock(), "00:00");
        assert_eq!(Countdown::new(6000).clock(), "100:00");
    }

    #[test]
    fn test_countdown_ticks() {
        let mut countdown = Countdown::new(2);
        assert!(!countdown.is_finished());
        countdown.tick();
        assert_eq!(countdown.remaining(), 1);
        countdown.tick();
        assert!(countdown.is_finished());
        countdown.tick();
        assert_eq!(countdown.remaining(), 0);
    }
}
