use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

pub mod layout;
pub mod widgets;

use crate::app::{App, DataMode, NonceDisplay, StatusLevel};
use crate::config;
use crate::ui::widgets::{history_text, HistoryBars};

pub fn draw(f: &mut Frame, app: &App) {
    let areas = layout::areas(f.size());

    draw_header(f, areas.header, app);
    draw_account(f, areas.account, app);
    draw_nonce(f, areas.nonce, app);
    draw_history(f, areas.history, app);
    draw_calculator(f, areas.calculator, app);
    draw_status_line(f, areas.status_line, app);
    draw_key_line(f, areas.key_line);

    if app.help_open {
        draw_help_popup(f, areas.size, app);
    }
}

fn label(text: &str) -> Span<'static> {
    Span::styled(text.to_string(), Style::default().fg(Color::DarkGray))
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let pill = if app.is_connected() {
        Span::styled("● Connected", Style::default().fg(Color::Green))
    } else {
        Span::styled("● Not Connected", Style::default().fg(Color::Red))
    };
    let mode = match app.data_mode {
        DataMode::Mock => "mock",
        DataMode::Rpc => "rpc",
    };
    let chain = app
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "--".to_string());

    let line = Line::from(vec![
        Span::styled("tally ", Style::default().add_modifier(Modifier::BOLD)),
        pill,
        Span::raw("  "),
        label("Endpoint "),
        Span::raw(format!("{}  ", app.endpoint)),
        label("Chain "),
        Span::raw(format!("{}  ", chain)),
        label("Mode "),
        Span::raw(mode),
    ]);

    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn draw_account(f: &mut Frame, area: Rect, app: &App) {
    let address = app.address.clone().unwrap_or_else(|| "—".to_string());
    let balance = app.balance.clone().unwrap_or_else(|| "—".to_string());

    let mut lines = vec![
        Line::from(vec![label("Address  "), Span::raw(address)]),
        Line::from(vec![label("Balance  "), Span::raw(balance)]),
    ];
    match app.signed.as_ref() {
        Some(signed) => {
            lines.push(Line::from(vec![
                label("Signed   "),
                Span::raw(signed.message.clone()),
            ]));
            lines.push(Line::from(vec![
                label("Sig      "),
                Span::styled(
                    config::short_addr(&signed.signature),
                    Style::default().fg(Color::Green),
                ),
            ]));
        }
        None => lines.push(Line::from(label("press s to sign a message"))),
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Account").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_nonce(f: &mut Frame, area: Rect, app: &App) {
    let (nonce, today, delta, style) = match &app.nonce {
        NonceDisplay::Unknown => ("—".to_string(), "—".to_string(), "—".to_string(), Style::default()),
        NonceDisplay::Loaded(refresh) => (
            refresh.current_nonce.to_string(),
            refresh.today_count.to_string(),
            format!("+{}", refresh.delta),
            Style::default().fg(Color::White),
        ),
        NonceDisplay::Error(_) => (
            "Error".to_string(),
            "Error".to_string(),
            "—".to_string(),
            Style::default().fg(Color::Red),
        ),
    };

    let next = match app.next_refresh_in() {
        Some(left) => format!("in {}s", left.as_secs()),
        None => "—".to_string(),
    };

    let mut lines = vec![
        Line::from(vec![label("Nonce        "), Span::styled(nonce, style)]),
        Line::from(vec![label("Txs today    "), Span::styled(today, style)]),
        Line::from(vec![label("Last delta   "), Span::raw(delta)]),
        Line::from(vec![label("Auto refresh "), Span::raw(next)]),
    ];
    if let NonceDisplay::Error(message) = &app.nonce {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Nonce").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_history(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Daily transactions").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let NonceDisplay::Loaded(refresh) = &app.nonce else {
        f.render_widget(
            Paragraph::new("No history yet").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let counts = app.history_counts();
    // green once today has transactions
    let bar_color = if refresh.today_count > 0 {
        Color::Green
    } else {
        Color::Cyan
    };
    f.render_widget(
        HistoryBars::new(&counts)
            .bar_width(2)
            .style(Style::default().fg(bar_color)),
        chunks[0],
    );

    let first = refresh.history.first().map(|(day, _)| day.as_str()).unwrap_or("");
    let last = refresh.history.last().map(|(day, _)| day.as_str()).unwrap_or("");
    let axis = Line::from(vec![
        label(first),
        Span::raw("  →  "),
        label(last),
        Span::raw(format!("   max {}", counts.iter().max().copied().unwrap_or(0))),
    ]);
    f.render_widget(Paragraph::new(axis), chunks[1]);
}

fn draw_calculator(f: &mut Frame, area: Rect, app: &App) {
    let calc = &app.calculator;
    let gas_limit = calc
        .gas_limit
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "21000 (default)".to_string());

    let mut lines = vec![
        Line::from(vec![label("Chain      "), Span::raw(calc.chain.title())]),
        Line::from(vec![label("Gas limit  "), Span::raw(gas_limit)]),
        Line::from(vec![label("Amount     "), Span::raw(format!("{:.6}", calc.amount))]),
    ];
    match calc.quote.as_ref() {
        Some(quote) => {
            lines.extend(quote.lines().into_iter().map(Line::from));
        }
        None => lines.push(Line::from(label("press g to fetch the gas price"))),
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Fee calculator").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let line = match app.status_text() {
        Some((text, level)) => {
            let color = match level {
                StatusLevel::Info => Color::Cyan,
                StatusLevel::Warn => Color::Yellow,
                StatusLevel::Error => Color::Red,
            };
            Line::from(Span::styled(text.to_string(), Style::default().fg(color)))
        }
        None => {
            let counts = app.history_counts();
            Line::from(vec![
                label("Recent "),
                Span::raw(history_text(&counts, 14)),
            ])
        }
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Left), area);
}

fn draw_key_line(f: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "c connect  d disconnect  r refresh  b balance  s sign  g gas  n chain  p endpoint  e/E export  ? help  q quit",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help_popup(f: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(64, 60, area);
    f.render_widget(Clear, popup_area);

    let config_path = config::config_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unknown)".to_string());
    let db_path = config::state_db_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(in memory)".to_string());

    let lines = vec![
        Line::from("Account"),
        Line::from("  c          Connect account"),
        Line::from("  d          Disconnect"),
        Line::from("  r          Refresh nonce now"),
        Line::from("  b          Fetch balance"),
        Line::from("  s          Sign a message"),
        Line::from(""),
        Line::from("Calculator"),
        Line::from("  g          Fetch gas price / recompute"),
        Line::from("  n          Next chain"),
        Line::from(""),
        Line::from("Node"),
        Line::from("  p          Next endpoint"),
        Line::from(""),
        Line::from("Export"),
        Line::from("  e          Daily counts → CSV"),
        Line::from("  E          Full state → JSON"),
        Line::from(""),
        Line::from("  ?          Toggle help"),
        Line::from("  q          Quit"),
        Line::from(""),
        Line::from(format!(
            "Auto refresh every {}s",
            app.refresh_interval.as_secs()
        )),
        Line::from(format!("Config: {}", config_path)),
        Line::from(format!("State:  {}", db_path)),
    ];

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Help").borders(Borders::ALL))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
