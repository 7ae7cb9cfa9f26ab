//! HD44780 字符液晶屏驱动
//!
//! 4 位并行模式，只写不读，由 6 根 GPIO 输出线驱动（RS、EN、D4-D7）。

use crate::config::DisplayGeometry;
use crate::display::{DisplayAdapter, layout_rows};
use crate::error::{MonitorError, Result};
use embedded_hal::digital::OutputPin;
use linux_embedded_hal::CdevPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use log::info;
use std::thread::sleep;
use std::time::Duration;

// 指令
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x04;
const CMD_DISPLAY_CONTROL: u8 = 0x08;
const CMD_FUNCTION_SET: u8 = 0x20;
const CMD_SET_DDRAM_ADDR: u8 = 0x80;

// 参数
const ENTRY_LEFT: u8 = 0x02;
const DISPLAY_ON: u8 = 0x04;
const TWO_LINE: u8 = 0x08;

/// 各行起始的 DDRAM 地址
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// 树莓派 BCM 编号的默认接线
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdPins {
    pub rs: u32,
    pub en: u32,
    pub d4: u32,
    pub d5: u32,
    pub d6: u32,
    pub d7: u32,
}

impl Default for LcdPins {
    #[inline]
    fn default() -> Self {
        Self {
            rs: 25,
            en: 24,
            d4: 23,
            d5: 17,
            d6: 27,
            d7: 22,
        }
    }
}

/// HD44780 驱动，对任意实现了 `OutputPin` 的引脚通用
pub struct Hd44780<P> {
    rs: P,
    en: P,
    data: [P; 4],
    geometry: DisplayGeometry,
}

impl Hd44780<CdevPin> {
    /// 通过 GPIO 字符设备（如 `/dev/gpiochip0`）申请引脚并初始化屏幕
    pub fn open_gpiochip(chip_path: &str, pins: LcdPins, geometry: DisplayGeometry) -> Result<Self> {
        let mut chip = Chip::new(chip_path).map_err(|e| {
            MonitorError::DisplayWriteFailure(format!("无法打开 {chip_path}: {e}"))
        })?;

        let mut request = |offset: u32, name: &str| -> Result<CdevPin> {
            let handle = chip
                .get_line(offset)
                .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, name))
                .map_err(|e| {
                    MonitorError::DisplayWriteFailure(format!("无法申请 GPIO {offset}: {e}"))
                })?;
            CdevPin::new(handle).map_err(|e| {
                MonitorError::DisplayWriteFailure(format!("无法创建 GPIO {offset} 引脚: {e}"))
            })
        };

        let rs = request(pins.rs, "lcd-rs")?;
        let en = request(pins.en, "lcd-en")?;
        let data = [
            request(pins.d4, "lcd-d4")?,
            request(pins.d5, "lcd-d5")?,
            request(pins.d6, "lcd-d6")?,
            request(pins.d7, "lcd-d7")?,
        ];

        info!("已在 {chip_path} 上申请液晶屏引脚: {pins:?}");
        Self::new(rs, en, data, geometry)
    }
}

impl<P: OutputPin> Hd44780<P> {
    /// 创建驱动并执行上电初始化序列
    pub fn new(rs: P, en: P, data: [P; 4], geometry: DisplayGeometry) -> Result<Self> {
        let mut lcd = Self {
            rs,
            en,
            data,
            geometry,
        };
        lcd.init()?;
        Ok(lcd)
    }

    fn init(&mut self) -> Result<()> {
        sleep(Duration::from_millis(50));
        set_pin(&mut self.rs, false)?;
        set_pin(&mut self.en, false)?;

        // 从未知状态切换到 4 位模式
        self.write_nibble(0x03)?;
        sleep(Duration::from_micros(4500));
        self.write_nibble(0x03)?;
        sleep(Duration::from_micros(4500));
        self.write_nibble(0x03)?;
        sleep(Duration::from_micros(150));
        self.write_nibble(0x02)?;

        let lines = if self.geometry.rows > 1 { TWO_LINE } else { 0 };
        self.command(CMD_FUNCTION_SET | lines)?;
        self.command(CMD_DISPLAY_CONTROL | DISPLAY_ON)?;
        self.clear()?;
        self.command(CMD_ENTRY_MODE | ENTRY_LEFT)
    }

    fn command(&mut self, value: u8) -> Result<()> {
        self.send(value, false)
    }

    fn send(&mut self, value: u8, char_mode: bool) -> Result<()> {
        sleep(Duration::from_millis(1));
        set_pin(&mut self.rs, char_mode)?;
        self.write_nibble(value >> 4)?;
        self.write_nibble(value & 0x0F)
    }

    fn write_nibble(&mut self, nibble: u8) -> Result<()> {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            set_pin(pin, nibble & (1 << bit) != 0)?;
        }
        self.pulse_enable()
    }

    fn pulse_enable(&mut self) -> Result<()> {
        set_pin(&mut self.en, false)?;
        sleep(Duration::from_micros(1));
        set_pin(&mut self.en, true)?;
        sleep(Duration::from_micros(1));
        set_pin(&mut self.en, false)?;
        // 指令执行需要 >37us
        sleep(Duration::from_micros(100));
        Ok(())
    }
}

impl<P: OutputPin> DisplayAdapter for Hd44780<P> {
    fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR)?;
        sleep(Duration::from_millis(3));
        Ok(())
    }

    fn set_message(&mut self, text: &str) -> Result<()> {
        let rows = layout_rows(text, self.geometry);
        let columns = self.geometry.columns;

        for (row, &offset) in ROW_OFFSETS.iter().enumerate().take(self.geometry.rows) {
            self.command(CMD_SET_DDRAM_ADDR | offset)?;
            let content = rows.get(row).map(String::as_str).unwrap_or("");
            // 行尾补空格，覆盖上一条消息残留的字符
            let padded = content.chars().chain(std::iter::repeat(' ')).take(columns);
            for ch in padded {
                // 字库只覆盖 ASCII
                let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
                self.send(byte, true)?;
            }
        }
        Ok(())
    }
}

fn set_pin<P: OutputPin>(pin: &mut P, high: bool) -> Result<()> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|e| MonitorError::DisplayWriteFailure(format!("GPIO 写入失败: {e:?}")))
}
