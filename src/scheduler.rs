use crate::config::Config;
use crate::display::DisplayAdapter;
use crate::error::{MonitorError, Result};
use crate::panel::{Countdown, Panel};
use crate::stats::{CpuUtilization, MemoryStats, MetricSource};
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::future::Future;
use std::io::{Stdout, Write};
use std::time::Duration;

const TICK: Duration = Duration::from_secs(1);

/// 定时等待，测试中可替换为不真正休眠的实现
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration) -> impl Future<Output = ()>;
}

/// 基于 tokio 定时器的等待
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    #[inline]
    fn sleep(&mut self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// 一轮显示中的各个状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ShowingTemperature,
    ShowingAggregateUsage,
    /// 从 0 开始的核心编号
    ShowingPerCoreUsage(usize),
    ShowingMemoryTotal,
    ShowingMemoryAvailable,
    ShowingMemoryUsed,
    ShowingMemoryFree,
    CountingDown,
}

impl State {
    /// 状态转移表
    pub fn next(self, per_core_usage: bool, core_count: usize) -> State {
        match self {
            State::ShowingTemperature => State::ShowingAggregateUsage,
            State::ShowingAggregateUsage if per_core_usage => State::ShowingPerCoreUsage(0),
            State::ShowingAggregateUsage => State::ShowingMemoryTotal,
            State::ShowingPerCoreUsage(index) if index + 1 < core_count => {
                State::ShowingPerCoreUsage(index + 1)
            }
            State::ShowingPerCoreUsage(_) => State::ShowingMemoryTotal,
            State::ShowingMemoryTotal => State::ShowingMemoryAvailable,
            State::ShowingMemoryAvailable => State::ShowingMemoryUsed,
            State::ShowingMemoryUsed => State::ShowingMemoryFree,
            State::ShowingMemoryFree => State::CountingDown,
            State::CountingDown => State::ShowingTemperature,
        }
    }
}

/// 循环调度器：依次显示各项指标，然后倒计时，再开始下一轮
///
/// 显示内容同时镜像输出到 `mirror`（默认为标准输出）。
pub struct CycleScheduler<M, D, S, W = Stdout> {
    config: Config,
    metrics: M,
    display: D,
    sleeper: S,
    mirror: W,
    state: State,
    /// 本轮进入逐核状态时的采样
    core_usage: Vec<f32>,
    /// 本轮进入内存总量状态时的采样
    memory: Option<MemoryStats>,
}

impl<M, D, S> CycleScheduler<M, D, S>
where
    M: MetricSource,
    D: DisplayAdapter,
    S: Sleeper,
{
    #[inline]
    pub fn new(config: Config, metrics: M, display: D, sleeper: S) -> Self {
        Self::with_mirror(config, metrics, display, sleeper, std::io::stdout())
    }
}

impl<M, D, S, W> CycleScheduler<M, D, S, W>
where
    M: MetricSource,
    D: DisplayAdapter,
    S: Sleeper,
    W: Write,
{
    pub fn with_mirror(config: Config, metrics: M, display: D, sleeper: S, mirror: W) -> Self {
        Self {
            config,
            metrics,
            display,
            sleeper,
            mirror,
            state: State::ShowingTemperature,
            core_usage: Vec::new(),
            memory: None,
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn display(&self) -> &D {
        &self.display
    }

    #[inline]
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    #[inline]
    pub fn mirror(&self) -> &W {
        &self.mirror
    }

    /// 执行当前状态并转移到下一个状态，返回新状态
    pub async fn step(&mut self) -> Result<State> {
        debug!("进入状态: {:?}", self.state);
        let delay = self.config.message_delay();

        self.display.clear()?;

        match self.state {
            State::ShowingTemperature => {
                let celsius = self.metrics.cpu_temperature().await?;
                let panel = Panel::temperature(celsius, self.config.temperature_unit, delay);
                self.show(&panel).await?;
            }
            State::ShowingAggregateUsage => {
                let usage = match self.metrics.cpu_utilization(false).await? {
                    CpuUtilization::Aggregate(usage) => usage,
                    CpuUtilization::PerCore(_) => {
                        return Err(MonitorError::UnavailableMetric(
                            "请求合计 CPU 使用率却得到逐核数据".to_string(),
                        ));
                    }
                };
                self.show(&Panel::cpu_usage(usage, delay)).await?;
                if !self.config.per_core_usage {
                    // 不逐核显示时合计使用率多停留一个间隔
                    self.sleeper.sleep(delay).await;
                }
            }
            State::ShowingPerCoreUsage(index) => {
                if index == 0 {
                    self.sample_cores().await?;
                }
                let usage = self.core_usage.get(index).copied();
                match usage {
                    Some(usage) => self.show(&Panel::core_usage(index, usage, delay)).await?,
                    None => {
                        self.print_line("INFO: No CPU Core Usage info available.")?;
                        self.sleeper.sleep(delay).await;
                    }
                }
            }
            State::ShowingMemoryTotal => {
                self.memory = None;
                let stats = self.memory_snapshot().await?;
                self.show(&Panel::memory_total(&stats, delay)).await?;
            }
            State::ShowingMemoryAvailable => {
                let stats = self.memory_snapshot().await?;
                self.show(&Panel::memory_available(&stats, delay)).await?;
            }
            State::ShowingMemoryUsed => {
                let stats = self.memory_snapshot().await?;
                self.show(&Panel::memory_used(&stats, delay)).await?;
            }
            State::ShowingMemoryFree => {
                let stats = self.memory_snapshot().await?;
                self.show(&Panel::memory_free(&stats, delay)).await?;
            }
            State::CountingDown => {
                self.count_down(Countdown::new(self.config.wait_seconds()))
                    .await?;
            }
        }

        self.state = self
            .state
            .next(self.config.per_core_usage, self.core_usage.len());
        Ok(self.state)
    }

    /// 执行状态直到回到第一个状态
    pub async fn run_cycle(&mut self) -> Result<()> {
        loop {
            if self.step().await? == State::ShowingTemperature {
                return Ok(());
            }
        }
    }

    /// 无限循环，只会以错误结束
    pub async fn run(&mut self) -> Result<Infallible> {
        loop {
            self.step().await?;
        }
    }

    /// 运行直到出错或 `shutdown` 完成，清屏后返回结束原因
    ///
    /// 结束原因为 [`MonitorError::UserInterrupt`] 时进程应以 0 退出。
    pub async fn run_until_shutdown<F>(&mut self, shutdown: F) -> MonitorError
    where
        F: Future<Output = ()>,
    {
        let reason = tokio::select! {
            result = self.run() => match result {
                Ok(never) => match never {},
                Err(e) => e,
            },
            _ = shutdown => MonitorError::UserInterrupt,
        };

        match &reason {
            MonitorError::UserInterrupt => {
                info!("收到中断信号，准备退出");
                if let Err(e) = self.print_line("Keyboard Interrupt detected. Exiting...") {
                    warn!("输出退出信息失败: {e}");
                }
            }
            other => {
                error!("调度中止: {other}");
                if let Err(e) = self.print_line(&format!("Following error occurred: {other}")) {
                    warn!("输出错误信息失败: {e}");
                }
            }
        }

        if let Err(e) = self.display.clear() {
            warn!("退出时清屏失败: {e}");
        }

        reason
    }

    /// 倒计时：每秒刷新一次剩余时间，不含 00:00
    pub async fn count_down(&mut self, mut countdown: Countdown) -> Result<()> {
        debug!("开始倒计时 {} 秒", countdown.remaining());

        while !countdown.is_finished() {
            let message = countdown.message();
            write!(self.mirror, "{message}\r")?;
            self.mirror.flush()?;
            self.display.set_message(&message)?;
            self.sleeper.sleep(TICK).await;
            countdown.tick();
        }

        Ok(())
    }

    async fn show(&mut self, panel: &Panel) -> Result<()> {
        let message = panel.message();
        self.print_line(&message)?;
        self.display.set_message(&message)?;
        self.sleeper.sleep(panel.hold).await;
        Ok(())
    }

    async fn sample_cores(&mut self) -> Result<()> {
        self.core_usage = match self.metrics.cpu_utilization(true).await? {
            CpuUtilization::PerCore(usages) => usages,
            CpuUtilization::Aggregate(_) => {
                return Err(MonitorError::UnavailableMetric(
                    "请求逐核 CPU 使用率却得到合计数据".to_string(),
                ));
            }
        };
        info!("CPU 核心数: {}", self.core_usage.len());
        self.print_line(&format!("Number of CPU Cores: {}", self.core_usage.len()))
    }

    async fn memory_snapshot(&mut self) -> Result<MemoryStats> {
        if let Some(stats) = self.memory {
            return Ok(stats);
        }
        let stats = self.metrics.memory_stats().await?;
        self.memory = Some(stats);
        Ok(stats)
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.mirror, "{line}")?;
        self.mirror.flush()?;
        Ok(())
    }
}
