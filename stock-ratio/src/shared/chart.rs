//! Live ratio chart
//!
//! Provides:
//! - `RatioChartView`: everything one frame shows (ratio line, moving average,
//!   statistics, last-update stamp)
//! - `render_ratio_chart`: ratatui rendering of a view
//! - `RenderSurface` / `TerminalSurface`: where frames go, and whether the
//!   user has closed it
//! - `RatioChart`: Open/Closed state machine driven by the poll loop

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, BorderType, Borders, Chart, Clear, Dataset, GraphType, LegendPosition, Paragraph},
};
use tracing::{error, info};

use super::calc::{RatioStats, moving_average_window, trailing_sma};
use super::ratio::RatioSeries;

const C_RATIO: Color = Color::Rgb(100, 220, 100);
const C_MA: Color = Color::Rgb(220, 100, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

/// One frame of the ratio chart
#[derive(Debug, Clone, PartialEq)]
pub struct RatioChartView {
    /// "NVDA/TSM"
    pub label: String,
    /// (unix seconds, close ratio)
    pub ratio_points: Vec<(f64, f64)>,
    /// Trailing moving average, only where the window is full
    pub ma_points: Vec<(f64, f64)>,
    pub ma_window: usize,
    pub stats: Option<RatioStats>,
    pub first_time: Option<DateTime<Local>>,
    pub last_time: Option<DateTime<Local>>,
    pub updated_at: DateTime<Local>,
}

impl RatioChartView {
    pub fn from_series(series: &RatioSeries, max_ma_window: usize, updated_at: DateTime<Local>) -> Self {
        let ratios = series.close_ratios();
        let xs: Vec<f64> = series.rows.iter().map(|r| r.time.timestamp() as f64).collect();

        let ma_window = moving_average_window(ratios.len(), max_ma_window);
        let ma_points = trailing_sma(&ratios, ma_window)
            .into_iter()
            .zip(&xs)
            .filter_map(|(ma, &x)| ma.map(|y| (x, y)))
            .collect();

        Self {
            label: series.label(),
            ratio_points: xs.iter().copied().zip(ratios.iter().copied()).collect(),
            ma_points,
            ma_window,
            stats: RatioStats::from_values(&ratios),
            first_time: series.rows.first().map(|r| r.time.with_timezone(&Local)),
            last_time: series.last().map(|r| r.time.with_timezone(&Local)),
            updated_at,
        }
    }

    pub fn title(&self) -> String {
        format!(" {} Price Ratio (1-minute bars) ", self.label)
    }

    pub fn stats_lines(&self) -> Vec<String> {
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "--".to_string());
        vec![
            "Statistics:".to_string(),
            format!("Mean: {}", fmt(self.stats.map(|s| s.mean))),
            format!("Std: {}", fmt(self.stats.and_then(|s| s.std))),
            format!("Min: {}", fmt(self.stats.map(|s| s.min))),
            format!("Max: {}", fmt(self.stats.map(|s| s.max))),
        ]
    }

    pub fn last_update_line(&self) -> String {
        format!("Last Update: {}", self.updated_at.format("%Y-%m-%d %H:%M:%S %Z"))
    }

    /// Y bounds over finite values with 5% padding
    fn y_bounds(&self) -> [f64; 2] {
        let finite = self
            .ratio_points
            .iter()
            .chain(self.ma_points.iter())
            .map(|&(_, y)| y)
            .filter(|y| y.is_finite());
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });
        if !min.is_finite() || !max.is_finite() {
            return [0.0, 1.0];
        }
        let range = max - min;
        let pad = if range > 0.0 { range * 0.05 } else { min.abs().max(1.0) * 0.01 };
        [min - pad, max + pad]
    }

    fn x_bounds(&self) -> [f64; 2] {
        match (self.ratio_points.first(), self.ratio_points.last()) {
            (Some(&(first, _)), Some(&(last, _))) if last > first => [first, last],
            (Some(&(first, _)), _) => [first - 60.0, first + 60.0],
            _ => [0.0, 1.0],
        }
    }
}

/// Draw the whole chart into `area` (clear + redraw)
pub fn render_ratio_chart(f: &mut Frame, area: Rect, view: &RatioChartView) {
    f.render_widget(Clear, area);

    // Finite points only; the canvas cannot place inf/NaN
    let ratio_data: Vec<(f64, f64)> = view.ratio_points.iter().copied().filter(|p| p.1.is_finite()).collect();
    let ma_data: Vec<(f64, f64)> = view.ma_points.iter().copied().filter(|p| p.1.is_finite()).collect();

    let datasets = vec![
        Dataset::default()
            .name(format!("{} Ratio", view.label))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_RATIO))
            .data(&ratio_data),
        Dataset::default()
            .name(format!("MA({})", view.ma_window))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_MA))
            .data(&ma_data),
    ];

    let [y_lower, y_upper] = view.y_bounds();
    let y_labels = vec![
        Span::raw(format!("{:.4}", y_lower)),
        Span::raw(format!("{:.4}", (y_lower + y_upper) / 2.0)),
        Span::raw(format!("{:.4}", y_upper)),
    ];

    let time_label = |t: Option<DateTime<Local>>| {
        Span::raw(t.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "--".to_string()))
    };
    let x_labels = vec![time_label(view.first_time), time_label(view.last_time)];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    view.title(),
                    Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(C_ACCENT)),
        )
        .x_axis(
            Axis::default()
                .title(Span::styled("Time", Style::default().fg(C_DIM)))
                .style(Style::default().fg(C_DIM))
                .bounds(view.x_bounds())
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Ratio", Style::default().fg(C_DIM)))
                .style(Style::default().fg(C_DIM))
                .bounds([y_lower, y_upper])
                .labels(y_labels),
        )
        .legend_position(Some(LegendPosition::TopRight));

    f.render_widget(chart, area);

    // Statistics box, top-left of the plot (clear of the y labels)
    let stats_lines: Vec<Line> = view
        .stats_lines()
        .into_iter()
        .map(|l| Line::from(Span::styled(l, Style::default().fg(C_BRIGHT))))
        .collect();
    let stats_rect = overlay_rect(area, 12, 1, 20, stats_lines.len() as u16 + 2);
    f.render_widget(Clear, stats_rect);
    f.render_widget(
        Paragraph::new(stats_lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(C_DIM)),
        ),
        stats_rect,
    );

    // Last update stamp, bottom-right above the x labels
    let stamp = view.last_update_line();
    let stamp_width = stamp.chars().count() as u16 + 2;
    let stamp_x = area.width.saturating_sub(stamp_width + 2);
    let stamp_y = area.height.saturating_sub(6);
    let stamp_rect = overlay_rect(area, stamp_x, stamp_y, stamp_width, 3);
    f.render_widget(Clear, stamp_rect);
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(stamp, Style::default().fg(C_BRIGHT)))).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(C_DIM)),
        ),
        stamp_rect,
    );
}

/// Rect at offset (dx, dy) inside `area`, clipped to it
fn overlay_rect(area: Rect, dx: u16, dy: u16, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x.saturating_add(dx),
        y: area.y.saturating_add(dy),
        width,
        height,
    }
    .intersection(area)
}

/// Where chart frames are drawn
pub trait RenderSurface {
    fn draw(&mut self, view: &RatioChartView) -> io::Result<()>;

    /// Process user events for up to `wait`, returning early once closed
    fn pause(&mut self, wait: Duration) -> io::Result<()>;

    /// False once the user has closed the surface
    fn is_open(&self) -> bool;

    /// Release the surface; idempotent
    fn close(&mut self) -> io::Result<()>;
}

/// Full-screen terminal surface; `q`, `Esc` or `Ctrl+C` close it
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    last_view: Option<RatioChartView>,
    open: bool,
    restored: bool,
}

impl TerminalSurface {
    pub fn new(window_title: &str) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, SetTitle(window_title))?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            last_view: None,
            open: true,
            restored: false,
        })
    }

    fn redraw(&mut self) -> io::Result<()> {
        let Some(view) = self.last_view.as_ref() else {
            return Ok(());
        };
        self.terminal.draw(|f| render_ratio_chart(f, f.area(), view))?;
        Ok(())
    }
}

impl RenderSurface for TerminalSurface {
    fn draw(&mut self, view: &RatioChartView) -> io::Result<()> {
        self.last_view = Some(view.clone());
        self.redraw()
    }

    fn pause(&mut self, wait: Duration) -> io::Result<()> {
        let deadline = Instant::now() + wait;
        while self.open {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !event::poll(remaining)? {
                break;
            }
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
                    if ctrl_c || key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        self.open = false;
                    }
                }
                Event::Resize(_, _) => self.redraw()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Chart lifecycle state; Closed is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartState {
    Open,
    Closed,
}

/// Ratio chart bound to a surface
pub struct RatioChart<S: RenderSurface> {
    surface: S,
    state: ChartState,
    max_ma_window: usize,
}

impl<S: RenderSurface> RatioChart<S> {
    pub fn new(surface: S, max_ma_window: usize) -> Self {
        Self {
            surface,
            state: ChartState::Open,
            max_ma_window,
        }
    }

    pub fn state(&self) -> ChartState {
        self.state
    }

    /// Redraw from `series`; draw failures are logged and swallowed
    pub fn update(&mut self, series: &RatioSeries) {
        if !self.is_open() {
            return;
        }

        let view = RatioChartView::from_series(series, self.max_ma_window, Local::now());
        match self.surface.draw(&view) {
            Ok(()) => info!("Chart updated at {}", view.updated_at.format("%Y-%m-%d %H:%M:%S %Z")),
            Err(e) => error!("Error updating chart: {}", e),
        }
    }

    /// Poll the surface; moves to Closed once it reports closed
    pub fn is_open(&mut self) -> bool {
        if self.state == ChartState::Open && !self.surface.is_open() {
            self.state = ChartState::Closed;
        }
        self.state == ChartState::Open
    }

    /// Let the surface process events for `wait`
    pub fn pause(&mut self, wait: Duration) -> io::Result<()> {
        if self.state == ChartState::Closed {
            return Ok(());
        }
        self.surface.pause(wait)
    }

    /// Close the surface and enter Closed
    pub fn close(&mut self) -> io::Result<()> {
        self.state = ChartState::Closed;
        self.surface.close()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
