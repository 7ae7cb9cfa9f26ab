use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use pi_lcd_status::config::DEFAULT_THERMAL_ZONE;
use pi_lcd_status::{
    Config, CycleScheduler, DisplayAdapter, DisplayGeometry, SimulatedDisplay, SystemMetrics,
    TemperatureSource, TemperatureUnit, TokioSleeper,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// 显示设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DisplayKind {
    /// 内存中的模拟屏，仅输出到终端
    Simulated,
    /// 通过 GPIO 驱动的 HD44780 字符液晶屏（需启用 lcd 功能）
    Lcd,
}

/// 字符液晶屏状态显示
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 两轮状态之间的间隔分钟数 (默认: 1)
    #[arg(short, long, default_value_t = 1)]
    interval: u64,

    /// 每条消息的停留秒数 (默认: 3)
    #[arg(short, long, default_value_t = 3)]
    delay: u64,

    /// 以摄氏度显示温度（默认华氏度）
    #[arg(long)]
    celsius: bool,

    /// 不逐核显示 CPU 使用率
    #[arg(long)]
    no_per_core: bool,

    /// 屏幕列数 (默认: 16)
    #[arg(long, default_value_t = 16)]
    columns: usize,

    /// 屏幕行数 (默认: 2)
    #[arg(long, default_value_t = 2)]
    rows: usize,

    /// 从 sysfs 温度文件读取温度，而不是调用 vcgencmd
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_THERMAL_ZONE)]
    thermal_zone: Option<PathBuf>,

    /// 显示设备
    #[arg(long, value_enum, default_value_t = DisplayKind::Simulated)]
    display: DisplayKind,

    /// 液晶屏所在的 GPIO 字符设备
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpiochip: String,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            poll_interval_minutes: self.interval,
            message_delay_seconds: self.delay,
            temperature_unit: if self.celsius {
                TemperatureUnit::Celsius
            } else {
                TemperatureUnit::Fahrenheit
            },
            per_core_usage: !self.no_per_core,
            geometry: DisplayGeometry {
                columns: self.columns,
                rows: self.rows,
            },
            temperature_source: match &self.thermal_zone {
                Some(path) => TemperatureSource::ThermalZone(path.clone()),
                None => TemperatureSource::Vcgencmd,
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // 初始化日志系统
    init_logger(&args.log_level);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            println!("Following error occurred: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    info!("状态显示程序启动中...");

    let config = args.config();
    config.validate().context("配置校验失败")?;

    info!(
        "配置信息 - 间隔: {} 分钟, 消息停留: {} 秒, 温度单位: {:?}, 逐核: {}, 屏幕: {}x{}, 温度来源: {:?}",
        config.poll_interval_minutes,
        config.message_delay_seconds,
        config.temperature_unit,
        config.per_core_usage,
        config.geometry.columns,
        config.geometry.rows,
        config.temperature_source
    );

    let metrics = SystemMetrics::new(config.temperature_source.clone());

    match args.display {
        DisplayKind::Simulated => {
            let display = SimulatedDisplay::new(config.geometry);
            Ok(drive(config, metrics, display).await)
        }
        DisplayKind::Lcd => open_lcd(config, metrics, &args.gpiochip).await,
    }
}

#[cfg(feature = "lcd")]
async fn open_lcd(config: Config, metrics: SystemMetrics, gpiochip: &str) -> Result<ExitCode> {
    use pi_lcd_status::lcd::{Hd44780, LcdPins};

    let display = Hd44780::open_gpiochip(gpiochip, LcdPins::default(), config.geometry)
        .context("液晶屏初始化失败")?;
    info!("液晶屏初始化完成");
    Ok(drive(config, metrics, display).await)
}

#[cfg(not(feature = "lcd"))]
async fn open_lcd(_config: Config, _metrics: SystemMetrics, gpiochip: &str) -> Result<ExitCode> {
    anyhow::bail!("未启用 lcd 功能，无法使用 {gpiochip} 上的液晶屏，请使用 --features lcd 重新编译")
}

/// 运行调度器直到中断或出错，返回进程退出码
async fn drive<D: DisplayAdapter>(config: Config, metrics: SystemMetrics, display: D) -> ExitCode {
    let mut scheduler = CycleScheduler::new(config, metrics, display, TokioSleeper);
    let reason = scheduler.run_until_shutdown(interrupt_signal()).await;

    info!("程序退出，原因: {reason}");
    ExitCode::from(reason.exit_code())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("无法监听 Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("无法监听 SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// 初始化日志系统
fn init_logger(level: &str) {
    match env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init()
    {
        Ok(_) => info!("日志系统初始化成功，级别: {level}"),
        Err(e) => {
            eprintln!("日志系统初始化失败: {e}，使用默认设置");
        }
    }
}
