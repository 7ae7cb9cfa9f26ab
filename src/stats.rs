use crate::config::TemperatureSource;
use crate::error::{MonitorError, Result};
use log::debug;
use std::future::Future;
use std::time::Duration;

/// 每 MiB 的字节数 (2^20)
pub const BYTES_PER_MIB: f64 = (1u64 << 20) as f64;

/// 首次计算 CPU 使用率时两次采样之间的间隔
pub const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// 单个 CPU（或全部 CPU 合计）的时间统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// 空闲时间（含 iowait）
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    /// 相对于上一次采样的使用率 (0-100)
    pub fn usage_since(&self, prev: &CpuTimes) -> f32 {
        let total_diff = self.total.saturating_sub(prev.total);
        let idle_diff = self.idle.saturating_sub(prev.idle);

        // 如果总时间差为 0，返回 0 使用率
        if total_diff == 0 {
            return 0.0;
        }

        let usage = 1.0 - (idle_diff as f32 / total_diff as f32);
        (usage * 100.0).clamp(0.0, 100.0)
    }
}

/// 一次 /proc/stat 采样
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub aggregate: CpuTimes,
    pub per_core: Vec<CpuTimes>,
}

/// CPU 使用率，合计或逐核
#[derive(Debug, Clone, PartialEq)]
pub enum CpuUtilization {
    Aggregate(f32),
    PerCore(Vec<f32>),
}

/// 内存统计，容量字段单位为 MiB，`used_percent` 为 0-100
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub total: f64,
    pub available: f64,
    pub used_percent: f64,
    pub free: f64,
}

impl MemoryStats {
    /// 由字节数构造；已用百分比按 (总量 - 可用) / 总量 计算
    pub fn from_bytes(total: u64, available: u64, free: u64) -> Self {
        let used_percent = if total == 0 {
            0.0
        } else {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        };

        Self {
            total: total as f64 / BYTES_PER_MIB,
            available: available as f64 / BYTES_PER_MIB,
            used_percent,
            free: free as f64 / BYTES_PER_MIB,
        }
    }
}

/// 主机指标来源
pub trait MetricSource {
    /// 当前 CPU 温度（摄氏度）
    fn cpu_temperature(&mut self) -> impl Future<Output = Result<f64>>;

    /// CPU 使用率；`per_core` 为真时逐核返回
    fn cpu_utilization(&mut self, per_core: bool) -> impl Future<Output = Result<CpuUtilization>>;

    fn memory_stats(&mut self) -> impl Future<Output = Result<MemoryStats>>;
}

/// 基于 Linux `/proc` 与树莓派固件工具的指标来源
#[derive(Debug)]
pub struct SystemMetrics {
    temperature_source: TemperatureSource,
    previous: Option<CpuSnapshot>,
    sample_interval: Duration,
}

impl SystemMetrics {
    #[inline]
    pub fn new(temperature_source: TemperatureSource) -> Self {
        Self {
            temperature_source,
            previous: None,
            sample_interval: CPU_SAMPLE_INTERVAL,
        }
    }

    /// 读取当前 CPU 采样，必要时补一次间隔采样作为基准
    async fn sample_cpu(&mut self) -> Result<(CpuSnapshot, CpuSnapshot)> {
        let mut current = read_cpu_snapshot().await?;

        let prev = match self.previous.take() {
            Some(prev) if prev.per_core.len() == current.per_core.len() => prev,
            _ => {
                debug!("没有可用的 CPU 基准采样，{:?} 后重新采样", self.sample_interval);
                let prev = current;
                tokio::time::sleep(self.sample_interval).await;
                current = read_cpu_snapshot().await?;
                prev
            }
        };

        self.previous = Some(current.clone());
        Ok((prev, current))
    }
}

impl MetricSource for SystemMetrics {
    async fn cpu_temperature(&mut self) -> Result<f64> {
        match &self.temperature_source {
            TemperatureSource::Vcgencmd => {
                let output = tokio::process::Command::new("vcgencmd")
                    .arg("measure_temp")
                    .kill_on_drop(true)
                    .output()
                    .await
                    .map_err(|e| MonitorError::UnavailableMetric(format!("无法执行 vcgencmd: {e}")))?;

                if !output.status.success() {
                    return Err(MonitorError::UnavailableMetric(format!(
                        "vcgencmd 退出状态异常: {}",
                        output.status
                    )));
                }

                parse_vcgencmd_temp(&String::from_utf8_lossy(&output.stdout))
            }
            TemperatureSource::ThermalZone(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    MonitorError::UnavailableMetric(format!("无法读取 {}: {e}", path.display()))
                })?;
                parse_thermal_zone(&content)
            }
        }
    }

    async fn cpu_utilization(&mut self, per_core: bool) -> Result<CpuUtilization> {
        let (prev, current) = self.sample_cpu().await?;

        if per_core {
            let usages = current
                .per_core
                .iter()
                .zip(prev.per_core.iter())
                .map(|(now, before)| now.usage_since(before))
                .collect();
            Ok(CpuUtilization::PerCore(usages))
        } else {
            Ok(CpuUtilization::Aggregate(
                current.aggregate.usage_since(&prev.aggregate),
            ))
        }
    }

    async fn memory_stats(&mut self) -> Result<MemoryStats> {
        let content = tokio::fs::read_to_string("/proc/meminfo")
            .await
            .map_err(|e| MonitorError::UnavailableMetric(format!("无法读取 /proc/meminfo: {e}")))?;
        parse_meminfo(&content)
    }
}

async fn read_cpu_snapshot() -> Result<CpuSnapshot> {
    let content = tokio::fs::read_to_string("/proc/stat")
        .await
        .map_err(|e| MonitorError::UnavailableMetric(format!("无法读取 /proc/stat: {e}")))?;
    parse_cpu_snapshot(&content)
}

/// 解析 `vcgencmd measure_temp` 的输出，例如 `temp=48.3'C`
pub fn parse_vcgencmd_temp(output: &str) -> Result<f64> {
    let malformed = || MonitorError::UnavailableMetric(format!("无法解析温度输出: {:?}", output.trim()));

    let start = output.find('=').ok_or_else(malformed)? + 1;
    let end = output.rfind('\'').ok_or_else(malformed)?;
    if end < start {
        return Err(malformed());
    }

    output[start..end].trim().parse::<f64>().map_err(|_| malformed())
}

/// 解析 sysfs 温度文件（千分之一摄氏度）
pub fn parse_thermal_zone(content: &str) -> Result<f64> {
    content
        .trim()
        .parse::<f64>()
        .map(|millidegrees| millidegrees / 1000.0)
        .map_err(|_| MonitorError::UnavailableMetric(format!("无法解析温度文件: {:?}", content.trim())))
}

/// 解析 /proc/stat 中以 `cpu` 开头的行
pub fn parse_cpu_snapshot(content: &str) -> Result<CpuSnapshot> {
    let mut aggregate = None;
    let mut per_core = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        if !key.starts_with("cpu") {
            continue;
        }

        let times = parse_cpu_times(key, parts)?;
        if key == "cpu" {
            aggregate = Some(times);
        } else {
            per_core.push(times);
        }
    }

    let aggregate = aggregate
        .ok_or_else(|| MonitorError::UnavailableMetric("/proc/stat 中没有 cpu 合计行".to_string()))?;

    Ok(CpuSnapshot {
        aggregate,
        per_core,
    })
}

/// 解析单行的 user nice system idle iowait irq softirq steal 字段
fn parse_cpu_times<'a>(key: &str, fields: impl Iterator<Item = &'a str>) -> Result<CpuTimes> {
    let mut values = [0u64; 8];
    let mut count = 0;

    // guest 与 guest_nice 已计入 user 与 nice，只取前 8 个字段
    for (slot, field) in values.iter_mut().zip(fields) {
        *slot = field.parse().map_err(|_| {
            MonitorError::UnavailableMetric(format!("{key} 行包含非法数值: {field:?}"))
        })?;
        count += 1;
    }

    if count < 4 {
        return Err(MonitorError::UnavailableMetric(format!("{key} 行字段不足")));
    }

    let overflow = || MonitorError::UnavailableMetric(format!("{key} 行数值溢出"));
    let idle = values[3].checked_add(values[4]).ok_or_else(overflow)?;
    let total = values
        .iter()
        .try_fold(0u64, |acc, &value| acc.checked_add(value))
        .ok_or_else(overflow)?;

    Ok(CpuTimes { idle, total })
}

/// 解析 /proc/meminfo
pub fn parse_meminfo(content: &str) -> Result<MemoryStats> {
    let mut total = None;
    let mut available = None;
    let mut free = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            let slot = match key {
                "MemTotal:" => &mut total,
                "MemAvailable:" => &mut available,
                "MemFree:" => &mut free,
                _ => continue,
            };
            let kib = value.parse::<u64>().map_err(|_| {
                MonitorError::UnavailableMetric(format!("{key} 数值非法: {value:?}"))
            })?;
            // 转换为字节
            let bytes = kib.checked_mul(1024).ok_or_else(|| {
                MonitorError::UnavailableMetric(format!("{key} 数值溢出: {value:?}"))
            })?;
            *slot = Some(bytes);
        }
    }

    match (total, available, free) {
        (Some(total), Some(available), Some(free)) if total > 0 => {
            Ok(MemoryStats::from_bytes(total, available, free))
        }
        _ => Err(MonitorError::UnavailableMetric(
            "/proc/meminfo 缺少 MemTotal、MemAvailable 或 MemFree".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT: &str = "cpu  1000 0 500 8000 500 0 0 0 0 0
cpu0 400 0 200 3900 100 0 0 0 0 0
cpu1 600 0 300 4100 400 0 0 0 0 0
intr 12345 0 0
ctxt 67890
";

    #[test]
    fn test_cpu_times_default() {
        let times = CpuTimes::default();
        assert_eq!(times.idle, 0);
        assert_eq!(times.total, 0);
    }

    #[test]
    fn test_parse_cpu_snapshot() {
        let snapshot = parse_cpu_snapshot(PROC_STAT).unwrap();
        assert_eq!(
            snapshot.aggregate,
            CpuTimes {
                idle: 8500,
                total: 10000
            }
        );
        assert_eq!(snapshot.per_core.len(), 2);
        assert_eq!(snapshot.per_core[0].idle, 4000);
        assert_eq!(snapshot.per_core[1].total, 5400);
    }

    #[test]
    fn test_parse_cpu_snapshot_short_line() {
        // 旧内核只有 4 个字段
        let snapshot = parse_cpu_snapshot("cpu 10 20 30 40\n").unwrap();
        assert_eq!(snapshot.aggregate.total, 100);
        assert_eq!(snapshot.aggregate.idle, 40);
        assert!(snapshot.per_core.is_empty());
    }

    #[test]
    fn test_parse_cpu_snapshot_invalid() {
        assert!(parse_cpu_snapshot("").is_err());
        assert!(parse_cpu_snapshot("invalid content").is_err());
        assert!(parse_cpu_snapshot("cpu 1 2 x 4\n").is_err());
        assert!(parse_cpu_snapshot("cpu 1 2\n").is_err());
    }

    #[test]
    fn test_usage_since() {
        let prev = CpuTimes {
            idle: 800,
            total: 1000,
        };
        let now = CpuTimes {
            idle: 1100,
            total: 2000,
        };
        assert!((now.usage_since(&prev) - 70.0).abs() < 1e-4);

        // 没有时间流逝
        assert_eq!(prev.usage_since(&prev), 0.0);

        // 计数器回绕不应产生负值
        assert!(prev.usage_since(&now) >= 0.0);
    }

    #[test]
    fn test_parse_vcgencmd_temp() {
        assert_eq!(parse_vcgencmd_temp("temp=48.3'C\n").unwrap(), 48.3);
        assert_eq!(parse_vcgencmd_temp("temp=100.0'C").unwrap(), 100.0);
    }

    #[test]
    fn test_parse_vcgencmd_temp_malformed() {
        assert!(parse_vcgencmd_temp("").is_err());
        assert!(parse_vcgencmd_temp("temp=48.3C").is_err());
        assert!(parse_vcgencmd_temp("'C temp=").is_err());
        assert!(matches!(
            parse_vcgencmd_temp("temp=abc'C"),
            Err(MonitorError::UnavailableMetric(_))
        ));
    }

    #[test]
    fn test_parse_cpu_snapshot_overflow() {
        let result = parse_cpu_snapshot("cpu 18446744073709551615 1 1 1\n");
        assert!(matches!(result, Err(MonitorError::UnavailableMetric(_))));

        // idle + iowait 溢出
        let result = parse_cpu_snapshot("cpu 0 0 0 18446744073709551615 1\n");
        assert!(matches!(result, Err(MonitorError::UnavailableMetric(_))));
    }

    #[test]
    fn test_parse_meminfo_overflow() {
        let content = "MemTotal: 18446744073709551615 kB
MemFree: 1 kB
MemAvailable: 1 kB
";
        assert!(matches!(
            parse_meminfo(content),
            Err(MonitorError::UnavailableMetric(_))
        ));
    }

    #[test]
    fn test_parse_thermal_zone() {
        assert_eq!(parse_thermal_zone("48312\n").unwrap(), 48.312);
        assert!(parse_thermal_zone("n/a").is_err());
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:        1048576 kB
MemFree:          131072 kB
MemAvailable:     524288 kB
Buffers:           10240 kB
Cached:           262144 kB
";
        let stats = parse_meminfo(content).unwrap();
        assert_eq!(stats.total, 1024.0);
        assert_eq!(stats.available, 512.0);
        assert_eq!(stats.free, 128.0);
        assert_eq!(stats.used_percent, 50.0);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo("").is_err());
        assert!(parse_meminfo("MemTotal: 1024 kB\nMemFree: 512 kB\n").is_err());
        assert!(parse_meminfo("MemTotal: x kB\nMemFree: 1 kB\nMemAvailable: 1 kB\n").is_err());
    }

    #[test]
    fn test_memory_stats_from_bytes() {
        let stats = MemoryStats::from_bytes((1 << 20) * 512, (1 << 20) * 128, 1 << 20);
        assert_eq!(format!("{:.2}", stats.total), "512.00");
        assert_eq!(format!("{:.2}", stats.available), "128.00");
        assert_eq!(format!("{:.2}", stats.free), "1.00");
        assert_eq!(stats.used_percent, 75.0);

        assert_eq!(MemoryStats::from_bytes(0, 0, 0).used_percent, 0.0);
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_system_memory_stats() {
        let mut metrics = SystemMetrics::new(TemperatureSource::Vcgencmd);
        match metrics.memory_stats().await {
            Ok(stats) => {
                assert!(stats.total > 0.0);
                assert!(stats.available <= stats.total);
                assert!((0.0..=100.0).contains(&stats.used_percent));
                println!("内存信息: {:?}", stats);
            }
            Err(e) => {
                // 在某些环境中可能失败
                println!("获取内存信息失败: {}", e);
            }
        }
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_system_cpu_utilization() {
        let mut metrics = SystemMetrics::new(TemperatureSource::Vcgencmd);
        match metrics.cpu_utilization(false).await {
            Ok(CpuUtilization::Aggregate(usage)) => {
                assert!((0.0..=100.0).contains(&usage));
            }
            Ok(other) => panic!("应该是合计使用率, 实际为 {other:?}"),
            Err(e) => println!("获取 CPU 使用率失败: {}", e),
        }

        // 紧接着的逐核调用复用上一次采样
        match metrics.cpu_utilization(true).await {
            Ok(CpuUtilization::PerCore(usages)) => {
                assert!(usages.iter().all(|u| (0.0..=100.0).contains(u)));
                println!("逐核使用率: {:?}", usages);
            }
            Ok(other) => panic!("应该是逐核使用率, 实际为 {other:?}"),
            Err(e) => println!("获取逐核使用率失败: {}", e),
        }
    }

    #[tokio::test]
    async fn test_missing_thermal_zone() {
        let mut metrics = SystemMetrics::new(TemperatureSource::ThermalZone(
            "/nonexistent/thermal_zone/temp".into(),
        ));
        assert!(matches!(
            metrics.cpu_temperature().await,
            Err(MonitorError::UnavailableMetric(_))
        ));
    }
}
