use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Widget},
};

use iris_core::video::VideoFrame;

/// Shown in the video pane until the first frame arrives, and again whenever
/// the stream is stopped.
pub const VIDEO_PLACEHOLDER: &str = "Waiting for video stream...";

/// Render a video frame into `area` using Unicode half-block characters.
///
/// Each terminal cell shows two vertically stacked pixels via the upper
/// half-block (`▀`): foreground is the top pixel, background the bottom one.
/// The frame is scaled with nearest-neighbour sampling to the largest size
/// that fits the pane without distorting its aspect ratio, then centred.
///
/// `None`, or a frame whose buffer does not match its dimensions, draws the
/// placeholder text instead.
pub fn render_frame(buf: &mut Buffer, area: Rect, frame: Option<&VideoFrame>) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let block = Block::default().borders(Borders::ALL).title("VIDEO");
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let frame = match frame {
        Some(f) if f.width > 0 && f.height > 0 && f.is_consistent() => f,
        _ => {
            render_placeholder(buf, inner);
            return;
        }
    };

    let (cell_w, cell_h) = fit(frame.width, frame.height, inner.width as u32, inner.height as u32);
    if cell_w == 0 || cell_h == 0 {
        return;
    }
    let off_x = (inner.width as u32 - cell_w) / 2;
    let off_y = (inner.height as u32 - cell_h) / 2;
    let pixel_h = cell_h * 2;

    for cy in 0..cell_h {
        for cx in 0..cell_w {
            let px = (cx * frame.width) / cell_w;
            let top_py = (cy * 2 * frame.height) / pixel_h;
            let bot_py = ((cy * 2 + 1) * frame.height) / pixel_h;

            let (Some(top), Some(bot)) = (
                sample_pixel(&frame.rgba, frame.width, px, top_py),
                sample_pixel(&frame.rgba, frame.width, px, bot_py),
            ) else {
                continue;
            };

            let x = inner.x + (off_x + cx) as u16;
            let y = inner.y + (off_y + cy) as u16;
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char('▀');
                cell.set_fg(Color::Rgb(top.0, top.1, top.2));
                cell.set_bg(Color::Rgb(bot.0, bot.1, bot.2));
            }
        }
    }
}

/// Largest `(columns, rows)` that shows a `w × h` pixel image inside a
/// `cols × rows` pane at its native aspect, given two pixels per row.
fn fit(w: u32, h: u32, cols: u32, rows: u32) -> (u32, u32) {
    let px_rows = rows as u64 * 2;
    // Width-limited unless the scaled height overflows.
    let height_at_full_width = (h as u64 * cols as u64) / w as u64;
    if height_at_full_width <= px_rows {
        let cell_h = height_at_full_width.div_ceil(2).max(1).min(rows as u64);
        (cols, cell_h as u32)
    } else {
        let width_at_full_height = (w as u64 * px_rows) / h as u64;
        (width_at_full_height.max(1).min(cols as u64) as u32, rows)
    }
}

fn render_placeholder(buf: &mut Buffer, inner: Rect) {
    let text = VIDEO_PLACEHOLDER;
    let len = text.chars().count() as u16;
    let width = len.min(inner.width);
    let x = inner.x + (inner.width - width) / 2;
    let y = inner.y + inner.height / 2;
    buf.set_stringn(
        x,
        y,
        text,
        width as usize,
        Style::default().fg(Color::DarkGray),
    );
}

/// Read an RGBA pixel from row-major data.
///
/// Returns `None` if the computed index overflows or falls outside `data`.
fn sample_pixel(data: &[u8], width: u32, x: u32, y: u32) -> Option<(u8, u8, u8, u8)> {
    let idx = (y as usize)
        .checked_mul(width as usize)?
        .checked_add(x as usize)?
        .checked_mul(4)?;
    let px = data.get(idx..idx + 4)?;
    Some((px[0], px[1], px[2], px[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgb: (u8, u8, u8)) -> VideoFrame {
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..w * h {
            rgba.extend_from_slice(&[rgb.0, rgb.1, rgb.2, 255]);
        }
        VideoFrame {
            width: w,
            height: h,
            rgba,
        }
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (buf.area.x..buf.area.x + buf.area.width)
            .map(|x| buf.cell((x, y)).map_or(" ", |c| c.symbol()))
            .collect()
    }

    #[test]
    fn fills_pane_with_matching_aspect() {
        // 8x8 pixels into an 8x4 inner pane: exactly one pixel per half cell.
        let frame = solid(8, 8, (255, 0, 0));
        let area = Rect::new(0, 0, 10, 6);
        let mut buf = Buffer::empty(area);

        render_frame(&mut buf, area, Some(&frame));

        for (x, y) in [(1, 1), (8, 4)] {
            let cell = buf.cell((x, y)).unwrap();
            assert_eq!(cell.symbol(), "▀");
            assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
            assert_eq!(cell.bg, Color::Rgb(255, 0, 0));
        }
    }

    #[test]
    fn top_and_bottom_pixels_map_to_fg_and_bg() {
        // 1x2: red above blue, rendered into a single cell.
        let frame = VideoFrame {
            width: 1,
            height: 2,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        let area = Rect::new(0, 0, 3, 3);
        let mut buf = Buffer::empty(area);

        render_frame(&mut buf, area, Some(&frame));

        let cell = buf.cell((1, 1)).unwrap();
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn wide_frame_is_letterboxed() {
        // 16x4 pixels into a 16x8 pane: two rows tall, centred vertically.
        let frame = solid(16, 4, (0, 255, 0));
        let area = Rect::new(0, 0, 18, 10);
        let mut buf = Buffer::empty(area);

        render_frame(&mut buf, area, Some(&frame));

        assert_ne!(buf.cell((1, 1)).unwrap().symbol(), "▀");
        assert_eq!(buf.cell((1, 4)).unwrap().symbol(), "▀");
        assert_eq!(buf.cell((1, 5)).unwrap().symbol(), "▀");
        assert_ne!(buf.cell((1, 6)).unwrap().symbol(), "▀");
    }

    #[test]
    fn fit_keeps_aspect() {
        assert_eq!(fit(8, 8, 8, 4), (8, 4));
        assert_eq!(fit(16, 4, 16, 8), (16, 2));
        assert_eq!(fit(4, 16, 16, 4), (2, 4));
        assert_eq!(fit(1000, 1, 10, 10), (10, 1));
    }

    #[test]
    fn no_frame_shows_placeholder() {
        let area = Rect::new(0, 0, 40, 5);
        let mut buf = Buffer::empty(area);

        render_frame(&mut buf, area, None);

        assert!(row_text(&buf, 2).contains(VIDEO_PLACEHOLDER));
    }

    #[test]
    fn inconsistent_frame_shows_placeholder() {
        let frame = VideoFrame {
            width: 4,
            height: 4,
            rgba: vec![0; 8],
        };
        let area = Rect::new(0, 0, 40, 5);
        let mut buf = Buffer::empty(area);

        render_frame(&mut buf, area, Some(&frame));

        assert!(row_text(&buf, 2).contains(VIDEO_PLACEHOLDER));
    }

    #[test]
    fn tiny_area_does_not_panic() {
        let frame = solid(4, 4, (1, 2, 3));
        let mut buf = Buffer::empty(Rect::new(0, 0, 10, 10));
        render_frame(&mut buf, Rect::new(0, 0, 0, 0), Some(&frame));
        render_frame(&mut buf, Rect::new(0, 0, 2, 2), Some(&frame));
        render_frame(&mut buf, Rect::new(0, 0, 5, 3), None);
    }
}
