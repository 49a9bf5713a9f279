use std::fmt::Write;
use std::io::stdout;
use std::time::Instant;
use crossterm::cursor::{MoveToColumn, MoveToPreviousLine};
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use turbo_downloader::DownloadState;

/// Two-line terminal rendering of `Progress` and `Merging` states.
pub struct ProgressBar {
    bar_buf: String,
    buf: String,
    start_instant: Instant,
    bar_width: usize,
}

impl ProgressBar {
    pub fn new(max_width: usize) -> Self {
        // 预留两行，之后每次刷新都回到这两行
        println!();
        Self {
            buf: String::new(),
            bar_buf: String::new(),
            start_instant: Instant::now(),
            bar_width: crossterm::terminal::size().ok()
                .map(|(cols, _rows)| usize::from(cols))
                .unwrap_or(max_width)
                .min(max_width)
                .max(12),
        }
    }

    fn render(&mut self, percent: u8, label: &str, detail: &str) -> Result<&str, std::fmt::Error> {
        let percent = usize::from(percent.min(100));

        self.bar_buf.clear();
        self.buf.clear();
        let duration = self.start_instant.elapsed();
        write!(self.bar_buf, "{label} - {percent} % - elapsed: {duration:.2?} ")?;
        write!(self.buf, "{detail}")?;
        let padding = self.bar_width.saturating_sub(self.bar_buf.chars().count() + self.buf.chars().count());
        self.bar_buf.extend(std::iter::repeat(' ').take(padding));
        writeln!(self.bar_buf, "{}", self.buf)?;

        let bar_p_width = self.bar_width - 2;
        let progress_width = percent * bar_p_width / 100;
        self.bar_buf.push('[');
        self.bar_buf.extend(std::iter::repeat('█').take(progress_width));
        self.bar_buf.extend(std::iter::repeat(' ').take(bar_p_width - progress_width));
        self.bar_buf.push(']');

        Ok(&self.bar_buf)
    }

    fn line_for(&mut self, state: &DownloadState) -> Result<Option<String>, std::fmt::Error> {
        let line = match state {
            DownloadState::Progress { percent, downloaded, total, bytes_per_second } => {
                let (speed_size, speed_unit) = Self::byte_unit(*bytes_per_second);
                let (done_size, done_unit) = Self::byte_unit(*downloaded);
                let detail = match total {
                    Some(total) => {
                        let (total_size, total_unit) = Self::byte_unit(*total);
                        format!("{done_size:.2} {done_unit} / {total_size:.2} {total_unit}")
                    }
                    None => format!("{done_size:.2} {done_unit}"),
                };
                self.render(*percent, &format!("{speed_size:.2} {speed_unit}/s"), &detail)?.to_string()
            }
            DownloadState::Merging { percent } => self.render(*percent, "merging", "")?.to_string(),
            _ => return Ok(None),
        };

        Ok(Some(line))
    }

    pub fn print(&mut self, state: &DownloadState) -> std::io::Result<()> {
        let line = self.line_for(state).map_err(std::io::Error::other)?;
        if let Some(line) = line {
            execute!(
                stdout(),
                Clear(ClearType::CurrentLine),
                MoveToPreviousLine(1),
                Clear(ClearType::CurrentLine),
                MoveToColumn(0),
                crossterm::style::Print(line),
            )?;
        }

        Ok(())
    }

    fn byte_unit(bytes_count: u64) -> (f32, &'static str) {
        const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

        let mut i = 0;
        let mut bytes_count = bytes_count as f32;
        while bytes_count >= 1024.0 && i < UNITS.len() - 1 {
            i += 1;
            bytes_count /= 1024.0;
        }
        (bytes_count, UNITS[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_scale_units() {
        assert_eq!(ProgressBar::byte_unit(512), (512.0, "B"));
        assert_eq!(ProgressBar::byte_unit(10 * 1024 * 1024), (10.0, "MB"));
    }

    #[test]
    fn should_fill_bar_by_percent() {
        let mut bar = ProgressBar { bar_buf: String::new(), buf: String::new(), start_instant: Instant::now(), bar_width: 22 };
        let rendered = bar.line_for(&DownloadState::Merging { percent: 50 }).unwrap().unwrap();
        let bar_line = rendered.lines().last().unwrap();

        assert_eq!(bar_line, format!("[{}{}]", "█".repeat(10), " ".repeat(10)));
        assert!(bar.line_for(&DownloadState::Error { message: "x".into() }).unwrap().is_none());
    }
}
