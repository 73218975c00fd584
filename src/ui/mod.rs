use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, FormField, Popup};
use crate::config::ThemeConfig;
use crate::money::Money;
use crate::plan::{CEILING, GRANULARITY_CENTS};
use crate::theme::Theme;

// Palette is fixed once at startup
static THEME: OnceLock<Theme> = OnceLock::new();

pub fn init_theme(config: &ThemeConfig) {
    if THEME.set(Theme::from_config(config)).is_err() {
        tracing::debug!("Theme already initialized");
    }
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn inactive() -> Color { theme().inactive }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),               // Info line
            Constraint::Min(6),                  // Cards + plan
            Constraint::Length(1),               // Footer
        ])
        .split(area);

    // Narrow terminals give the plan table more room
    let list_width = if chunks[1].width < 90 { 35 } else { 40 };
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(list_width),
            Constraint::Percentage(100 - list_width),
        ])
        .split(chunks[1]);

    draw_info_line(f, app, chunks[0]);
    draw_cards_box(f, app, body[0]);
    draw_card_detail(f, app, body[1]);
    draw_footer(f, chunks[2]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::AddCard => draw_add_card(f, app),
        Popup::Help => draw_help_popup(f),
        Popup::Confirm => draw_confirm_popup(f, app),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(ref status) = app.status_message {
        Line::from(vec![
            Span::styled(status, Style::default().fg(warning())),
        ])
    } else {
        let count = app.cards.len();
        Line::from(vec![
            Span::styled(
                format!("{} card{}", count, if count == 1 { "" } else { "s" }),
                Style::default().fg(text_dim()),
            ),
        ])
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_cards_box(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" Cards ", Style::default().fg(accent()).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    if app.cards.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled("  No cards yet", Style::default().fg(text_dim()))),
            Line::from(Span::styled("  Press 'a' to add one", Style::default().fg(accent()))),
        ])
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Span::styled("#", Style::default().fg(header())),
        Span::styled("Label", Style::default().fg(header())),
        Span::styled("Balance", Style::default().fg(header())),
    ]);

    let rows: Vec<Row> = app
        .cards
        .cards()
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let row_style = if i == app.selected {
                Style::default().bg(bg_selected()).fg(text())
            } else {
                Style::default()
            };
            let balance_color = if card.balance.cents() < 0 { danger() } else { text() };

            Row::new(vec![
                Span::styled(card.key.to_string(), Style::default().fg(text_dim())),
                Span::styled(card.label.as_str(), Style::default().fg(text())),
                Span::styled(card.balance.to_string(), Style::default().fg(balance_color)),
            ])
            .style(row_style)
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Percentage(60),
        Constraint::Percentage(35),
    ];

    let table = Table::new(rows, widths)
        .header(header.style(Style::default()))
        .block(block);

    f.render_widget(table, area);
}

fn draw_card_detail(f: &mut Frame, app: &App, area: Rect) {
    let Some(card) = app.selected_card() else {
        let block = Block::default()
            .title(Span::styled(" Recharge plan ", Style::default().fg(inactive())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(inactive()));
        let empty = Paragraph::new("No card selected")
            .style(Style::default().fg(text_dim()))
            .block(block);
        f.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),               // Card summary
            Constraint::Min(3),                  // Recharge table
        ])
        .split(area);

    let label = |name: &'static str| Span::styled(name, Style::default().fg(text_dim()));
    let summary = Paragraph::new(vec![
        Line::from(vec![label("Balance       "), Span::styled(card.balance.to_string(), Style::default().fg(text()))]),
        Line::from(vec![
            label("Outward/Return "),
            Span::styled(format!("{} / {}", card.outward_price, card.return_price), Style::default().fg(text())),
        ]),
        Line::from(vec![label("Daily cost    "), Span::styled(card.daily_cost().to_string(), Style::default().fg(accent()))]),
        Line::from(vec![
            label("Top-ups in steps of "),
            Span::styled(Money::from_cents(GRANULARITY_CENTS).to_string(), Style::default().fg(text_dim())),
            label(", up to "),
            Span::styled(CEILING.to_string(), Style::default().fg(text_dim())),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(format!(" {} ", card.title()), Style::default().fg(accent()).add_modifier(Modifier::BOLD)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(inactive())),
    );
    f.render_widget(summary, chunks[0]);

    draw_plan_table(f, app, chunks[1]);
}

fn draw_plan_table(f: &mut Frame, app: &App, area: Rect) {
    let plan = app.selected_plan();

    let block = Block::default()
        .title(Span::styled(format!(" Recharge plan ({} options) ", plan.len()), Style::default().fg(accent())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(inactive()));

    if plan.is_empty() {
        let empty = Paragraph::new("  No recharge options")
            .style(Style::default().fg(text_dim()))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Span::styled("Out", Style::default().fg(header())),
        Span::styled("Ret", Style::default().fg(header())),
        Span::styled("New balance", Style::default().fg(header())),
        Span::styled("Recharge", Style::default().fg(header())),
    ]);

    let rows: Vec<Row> = plan
        .iter()
        .skip(app.plan_scroll)
        .map(|option| {
            // Balance already sits on whole trips
            let credit_color = if option.credit_recharge.cents() == 0 { success() } else { text() };

            Row::new(vec![
                Span::styled(option.outward_tickets.to_string(), Style::default().fg(text())),
                Span::styled(option.return_tickets.to_string(), Style::default().fg(text())),
                Span::styled(format!("{:>10}", option.new_balance), Style::default().fg(text())),
                Span::styled(format!("{:>10}", option.credit_recharge), Style::default().fg(credit_color)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(12),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths)
        .header(header.style(Style::default()))
        .block(block);

    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let hints: Vec<(&str, &str)> = vec![
        ("↑↓", "Nav"),
        ("a", "Add"),
        ("R", "Refresh"),
        ("d", "Del"),
        ("PgUp/PgDn", "Scroll"),
        ("h", "Help"),
        ("q", "Quit"),
    ];

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 5 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans))
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn draw_add_card(f: &mut Frame, app: &App) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 90 } else { 60 },
        if area.height < 30 { 90 } else { 60 },
        area
    );

    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(" Add Card ", Style::default().fg(accent())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    f.render_widget(block, popup_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(popup_area);

    for (i, field) in FormField::ALL.iter().enumerate() {
        let focused = app.form.focus == *field;
        let cursor = if focused { "_" } else { "" };
        let border = if focused { accent() } else { inactive() };

        let input = Paragraph::new(format!("{}{}", app.form.value(*field), cursor))
            .style(Style::default().fg(text()))
            .block(
                Block::default()
                    .title(Span::styled(field.title(), Style::default().fg(if focused { accent() } else { header() })))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border)),
            );
        f.render_widget(input, inner[i]);
    }

    let buttons = Paragraph::new(Line::from(vec![
        Span::styled("  [ ", Style::default().fg(text_dim())),
        Span::styled("Enter = Save", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
        Span::styled(" ]  [ ", Style::default().fg(text_dim())),
        Span::styled("Tab = Next Field", Style::default().fg(accent())),
        Span::styled(" ]  [ ", Style::default().fg(text_dim())),
        Span::styled("Esc = Cancel", Style::default().fg(danger())),
        Span::styled(" ]  ", Style::default().fg(text_dim())),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(inactive())),
    );
    f.render_widget(buttons, inner[4]);
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 40 { 95 } else { 75 },
        area
    );

    f.render_widget(Clear, popup_area);

    let key_line = |key: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(key, Style::default().fg(accent())),
            Span::raw(what),
        ])
    };
    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
    };

    let help_text = vec![
        section("═══ Cards ═══"),
        key_line("  ↑/↓ j/k   ", "Select card"),
        key_line("  a/n       ", "Add a card"),
        key_line("  d/Del     ", "Delete selected card"),
        key_line("  R/r       ", "Reload cards from disk"),
        Line::from(""),
        section("═══ Recharge Plan ═══"),
        key_line("  PgUp/PgDn ", "Scroll the plan table"),
        Line::from(Span::raw("            Each row tops the card up to a whole number of")),
        Line::from(Span::raw(format!(
            "            round trips. Recharges are multiples of {}",
            Money::from_cents(GRANULARITY_CENTS)
        ))),
        Line::from(Span::raw(format!("            and balances stay below {}.", CEILING))),
        Line::from(""),
        section("═══ Command Line ═══"),
        key_line("  rechargecard --list        ", "All cards and plans as JSON"),
        key_line("  rechargecard --plan KEY    ", "Plan for one card"),
        key_line("  rechargecard --compute ... ", "Plan without saving a card"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("h", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" rechargecard Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(40, 20, f.area());

    f.render_widget(Clear, popup_area);

    let message = app
        .pending_delete
        .and_then(|key| app.cards.get(key))
        .map(|card| format!("Delete card #{} {}?", card.key, card.label))
        .unwrap_or_else(|| "Confirm?".to_string());

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(warning()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" Yes   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" No"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" Confirm ", Style::default().fg(warning())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(warning())),
    )
    .alignment(Alignment::Center);

    f.render_widget(confirm, popup_area);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Card, CardCollection, CardStore, NewCard};
    use crate::config::AppConfig;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app_with(cards: Vec<Card>) -> App {
        App::from_parts(AppConfig::default(), CardStore::at("/nonexistent/cards.json"), CardCollection::new(cards))
    }

    #[test]
    fn test_draws_example_card_plan() {
        let screen = render(&app_with(vec![Card::example()]));

        assert!(screen.contains("#0 Example"));
        assert!(screen.contains("Recharge plan (15 options)"));
        assert!(screen.contains("69.60"));
        assert!(screen.contains("13.92"));
    }

    #[test]
    fn test_empty_plan_renders_placeholder_row() {
        let mut cards = CardCollection::default();
        cards.add(NewCard::parse("free", "4.00", "0", "0").unwrap());

        let screen = render(&app_with(cards.cards().to_vec()));
        assert!(screen.contains("No recharge options"));
    }

    #[test]
    fn test_no_cards() {
        let screen = render(&app_with(Vec::new()));
        assert!(screen.contains("No cards yet"));
        assert!(screen.contains("No card selected"));
    }

    #[test]
    fn test_popups_render() {
        let mut app = app_with(vec![Card::example()]);

        app.popup = Popup::AddCard;
        assert!(render(&app).contains("Add Card"));

        app.popup = Popup::Confirm;
        app.pending_delete = Some(0);
        assert!(render(&app).contains("Delete card #0 Example?"));

        app.popup = Popup::Help;
        assert!(render(&app).contains("rechargecard Help"));
    }

    #[test]
    fn test_rules_follow_plan_constants() {
        let mut app = app_with(vec![Card::example()]);
        let step = Money::from_cents(GRANULARITY_CENTS).to_string();
        let ceiling = CEILING.to_string();

        let screen = render(&app);
        assert!(screen.contains(&format!("Top-ups in steps of {}, up to {}", step, ceiling)));

        app.popup = Popup::Help;
        let help = render(&app);
        assert!(help.contains(&format!("multiples of {}", step)));
        assert!(help.contains(&format!("below {}.", ceiling)));
    }
}
