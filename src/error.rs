/// 状态显示程序的错误类型
#[derive(Debug)]
pub enum MonitorError {
    /// 温度、CPU 或内存数据获取失败，或返回了无法解析的内容
    UnavailableMetric(String),
    /// 显示设备拒绝写入
    DisplayWriteFailure(String),
    /// 收到外部中断信号
    UserInterrupt,
    /// 启动配置不合法
    InvalidConfig(String),
    /// 输出镜像等读写失败
    IoError(std::io::Error),
}

impl MonitorError {
    /// 对应的进程退出码：中断视为正常退出，其余均为 1
    #[inline]
    pub fn exit_code(&self) -> u8 {
        match self {
            MonitorError::UserInterrupt => 0,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    #[inline]
    fn from(error: std::io::Error) -> Self {
        MonitorError::IoError(error)
    }
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::UnavailableMetric(s) => write!(f, "指标不可用: {s}"),
            MonitorError::DisplayWriteFailure(s) => write!(f, "显示写入失败: {s}"),
            MonitorError::UserInterrupt => write!(f, "用户中断"),
            MonitorError::InvalidConfig(s) => write!(f, "配置错误: {s}"),
            MonitorError::IoError(e) => write!(f, "IO 错误: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
