use crate::config::DisplayGeometry;
use crate::error::Result;
use log::debug;

/// 字符显示设备
///
/// 设备在整个进程生命周期内由调度器独占持有。
pub trait DisplayAdapter {
    /// 清空所有显示位置，任何时候（包括退出时）都可以调用
    fn clear(&mut self) -> Result<()>;

    /// 写入一条消息，`\n` 换行，超过列宽时在行边界处折行
    fn set_message(&mut self, text: &str) -> Result<()>;
}

/// 把消息按屏幕尺寸拆成若干行
///
/// 每个 `\n` 开始新的一行，单行超过列数时按字符硬折行，超出行数的部分被丢弃。
pub fn layout_rows(text: &str, geometry: DisplayGeometry) -> Vec<String> {
    let columns = geometry.columns.max(1);
    let mut rows = Vec::with_capacity(geometry.rows);

    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
        } else {
            rows.extend(chars.chunks(columns).map(|chunk| chunk.iter().collect::<String>()));
        }
    }

    rows.truncate(geometry.rows);
    rows
}

/// 内存中的模拟字符屏，没有硬件时使用
#[derive(Debug, Clone)]
pub struct SimulatedDisplay {
    geometry: DisplayGeometry,
    rows: Vec<String>,
}

impl SimulatedDisplay {
    #[inline]
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            rows: Vec::new(),
        }
    }

    /// 当前各行内容
    #[inline]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// 屏幕上是否没有任何字符
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|row| row.trim().is_empty())
    }
}

impl DisplayAdapter for SimulatedDisplay {
    fn clear(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn set_message(&mut self, text: &str) -> Result<()> {
        self.rows = layout_rows(text, self.geometry);
        debug!("模拟显示: {:?}", self.rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(columns: usize, rows: usize) -> DisplayGeometry {
        DisplayGeometry { columns, rows }
    }

    #[test]
    fn test_layout_two_line_message() {
        let rows = layout_rows("CPU Temperature:\n118.94 (F)", geometry(16, 2));
        assert_eq!(rows, vec!["CPU Temperature:", "118.94 (F)"]);
    }

    #[test]
    fn test_layout_wraps_at_row_boundary() {
        let rows = layout_rows("Next status in: 02:05", geometry(16, 2));
        assert_eq!(rows, vec!["Next status in: ", "02:05"]);
    }

    #[test]
    fn test_layout_drops_extra_rows() {
        let rows = layout_rows("aaaa\nbbbb\ncccc", geometry(4, 2));
        assert_eq!(rows, vec!["aaaa", "bbbb"]);

        let rows = layout_rows("abcdefghij", geometry(3, 2));
        assert_eq!(rows, vec!["abc", "def"]);
    }

    #[test]
    fn test_layout_keeps_empty_lines() {
        let rows = layout_rows("a\n\nb", geometry(16, 4));
        assert_eq!(rows, vec!["a", "", "b"]);
        assert_eq!(layout_rows("", geometry(16, 2)), vec![""]);
    }

    #[test]
    fn test_simulated_display() {
        let mut display = SimulatedDisplay::new(geometry(16, 2));
        assert!(display.is_blank());

        display.set_message("Memory Total:\n512.00 (MB)").unwrap();
        assert_eq!(display.rows(), ["Memory Total:", "512.00 (MB)"]);
        assert!(!display.is_blank());

        display.clear().unwrap();
        assert!(display.is_blank());

        // 清空操作可以重复调用
        display.clear().unwrap();
        assert!(display.is_blank());
    }
}
