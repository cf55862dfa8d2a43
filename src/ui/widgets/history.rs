//! Daily history bar widget
//!
//! Each column is one day; bars grow from the bottom of the area in
//! eighth-cell steps.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

const EIGHTHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub struct HistoryBars<'a> {
    data: &'a [u64],
    bar_width: u16,
    style: Style,
}

impl<'a> HistoryBars<'a> {
    pub fn new(data: &'a [u64]) -> Self {
        Self {
            data,
            bar_width: 1,
            style: Style::default().fg(Color::Cyan),
        }
    }

    pub fn bar_width(mut self, width: u16) -> Self {
        self.bar_width = width.max(1);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

/// Height of each bar in eighths of a cell, scaled to `rows`
fn scaled_heights(data: &[u64], rows: u16) -> Vec<u32> {
    let max = data.iter().copied().max().unwrap_or(0).max(1);
    let full = rows as u64 * 8;
    data.iter()
        .map(|&value| {
            if value == 0 {
                0
            } else {
                // non-zero days always show at least a sliver
                ((value * full + max - 1) / max).max(1) as u32
            }
        })
        .collect()
}

impl<'a> Widget for HistoryBars<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.data.is_empty() {
            return;
        }

        // one column gap between bars; keep the newest days when space runs out
        let slot = self.bar_width + 1;
        let fits = (area.width / slot).max(1) as usize;
        let start = self.data.len().saturating_sub(fits);
        let visible = &self.data[start..];
        let heights = scaled_heights(visible, area.height);

        for (i, eighths) in heights.iter().enumerate() {
            let x0 = area.x + i as u16 * slot;
            for row in 0..area.height {
                let y = area.y + area.height - 1 - row;
                let below = row as u32 * 8;
                let ch = if *eighths >= below + 8 {
                    EIGHTHS[7]
                } else if *eighths > below {
                    EIGHTHS[(*eighths - below - 1) as usize]
                } else {
                    continue;
                };
                for dx in 0..self.bar_width {
                    let x = x0 + dx;
                    if x >= area.x + area.width {
                        break;
                    }
                    buf.get_mut(x, y).set_char(ch).set_style(self.style);
                }
            }
        }
    }
}

/// Single-line rendering of the last `width` days (for the status line)
pub fn history_text(data: &[u64], width: usize) -> String {
    let start = data.len().saturating_sub(width);
    scaled_heights(&data[start..], 1)
        .into_iter()
        .map(|eighths| match eighths {
            0 => ' ',
            n => EIGHTHS[(n as usize - 1).min(7)],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_heights() {
        assert_eq!(scaled_heights(&[0, 1, 2, 4], 2), vec![0, 4, 8, 16]);
        assert_eq!(scaled_heights(&[0, 0], 3), vec![0, 0]);
        assert_eq!(scaled_heights(&[1, 100], 1), vec![1, 8]);
    }

    #[test]
    fn test_history_text() {
        assert_eq!(history_text(&[0, 4, 8], 8), " ▄█");
        assert_eq!(history_text(&[8, 0, 8], 2), " █");
        assert!(history_text(&[], 4).is_empty());
    }

    #[test]
    fn test_render_fills_from_bottom() {
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        HistoryBars::new(&[1, 2]).render(area, &mut buf);

        assert_eq!(buf.get(0, 1).symbol(), "█");
        assert_eq!(buf.get(0, 0).symbol(), " ");
        assert_eq!(buf.get(2, 0).symbol(), "█");
        assert_eq!(buf.get(2, 1).symbol(), "█");
    }

    #[test]
    fn test_render_applies_style() {
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        HistoryBars::new(&[3])
            .style(Style::default().fg(Color::Green))
            .render(area, &mut buf);

        assert_eq!(buf.get(0, 0).fg, Color::Green);
    }
}
