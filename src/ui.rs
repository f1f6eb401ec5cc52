use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::debug;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::aggregate::ThreadGroup;
use crate::api::cover_path;
use crate::controller::{
    AddState, Banner, Controller, ControlId, CopyState, MessageKind, PanelState, SearchState,
};
use crate::format::format_size;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_BADGE: Color = Color::Rgb(250, 179, 135);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK_RATE: Duration = Duration::from_millis(120);
const FILENAME_MAX_WIDTH: usize = 60;
const UNCATEGORISED: &str = "Uncategorised";
const NO_COVER: &str = "no cover";

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn rect_contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.push('…');
    out
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
    #[default]
    Query,
    Volume,
    Category,
    Results,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Query => Focus::Volume,
            Focus::Volume => Focus::Category,
            Focus::Category => Focus::Results,
            Focus::Results => Focus::Query,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Query => Focus::Results,
            Focus::Volume => Focus::Query,
            Focus::Category => Focus::Volume,
            Focus::Results => Focus::Category,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Focus::Query => "Search",
            Focus::Volume => "Volume",
            Focus::Category => "Category",
            Focus::Results => "Results",
        }
    }

    fn is_input(self) -> bool {
        !matches!(self, Focus::Results)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum SettingsField {
    #[default]
    Enabled,
    Host,
    Port,
    Password,
    Save,
    Test,
    Close,
}

impl SettingsField {
    const ALL: [SettingsField; 7] = [
        SettingsField::Enabled,
        SettingsField::Host,
        SettingsField::Port,
        SettingsField::Password,
        SettingsField::Save,
        SettingsField::Test,
        SettingsField::Close,
    ];

    fn next(self) -> Self {
        match self {
            SettingsField::Enabled => SettingsField::Host,
            SettingsField::Host => SettingsField::Port,
            SettingsField::Port => SettingsField::Password,
            SettingsField::Password => SettingsField::Save,
            SettingsField::Save => SettingsField::Test,
            SettingsField::Test => SettingsField::Close,
            SettingsField::Close => SettingsField::Enabled,
        }
    }

    fn previous(self) -> Self {
        match self {
            SettingsField::Enabled => SettingsField::Close,
            SettingsField::Host => SettingsField::Enabled,
            SettingsField::Port => SettingsField::Host,
            SettingsField::Password => SettingsField::Port,
            SettingsField::Save => SettingsField::Password,
            SettingsField::Test => SettingsField::Save,
            SettingsField::Close => SettingsField::Test,
        }
    }

    fn title(self) -> &'static str {
        match self {
            SettingsField::Enabled => "Enabled",
            SettingsField::Host => "Host",
            SettingsField::Port => "EC port",
            SettingsField::Password => "Password",
            SettingsField::Save => "Save",
            SettingsField::Test => "Test connection",
            SettingsField::Close => "Close",
        }
    }

    fn is_button(self) -> bool {
        matches!(
            self,
            SettingsField::Save | SettingsField::Test | SettingsField::Close
        )
    }
}

struct Spinner {
    index: usize,
}

impl Spinner {
    fn new() -> Self {
        Self { index: 0 }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % SPINNER_FRAMES.len();
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

/// One row of the results list.
enum ResultLine {
    Thread(usize),
    Link(ControlId),
}

pub struct Options {
    pub controller: Controller,
    pub server_label: String,
    pub config_path: String,
}

pub struct Model {
    controller: Controller,
    server_label: String,
    config_path: String,
    focus: Focus,
    settings_field: SettingsField,
    selected_link: usize,
    list_state: ListState,
    settings_area: Option<Rect>,
    spinner: Spinner,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut model = Self {
            controller: opts.controller,
            server_label: opts.server_label,
            config_path: opts.config_path,
            focus: Focus::Query,
            settings_field: SettingsField::Enabled,
            selected_link: 0,
            list_state: ListState::default(),
            settings_area: None,
            spinner: Spinner::new(),
            needs_redraw: true,
        };
        model.controller.refresh_queue_status();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.controller.poll_async(Instant::now()) {
                self.after_results_changed();
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                        self.mark_dirty();
                    }
                    Event::Mouse(mouse) => {
                        self.handle_mouse(mouse);
                        self.mark_dirty();
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                last_tick = Instant::now();
                if self.controller.tick(last_tick) {
                    self.mark_dirty();
                }
                if self.controller.is_busy() {
                    self.spinner.advance();
                    self.mark_dirty();
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn link_controls(&self) -> Vec<ControlId> {
        self.controller
            .groups()
            .iter()
            .flat_map(|group| {
                (0..group.links.len()).map(move |index| ControlId::new(&group.thread_id, index))
            })
            .collect()
    }

    fn selected_control(&self) -> Option<ControlId> {
        self.link_controls().into_iter().nth(self.selected_link)
    }

    /// The selected link, only while its results are on screen.
    fn actionable_control(&self) -> Option<ControlId> {
        if *self.controller.search_state() != SearchState::Displayed {
            return None;
        }
        self.selected_control()
    }

    fn after_results_changed(&mut self) {
        let total = self.link_controls().len();
        if self.selected_link >= total {
            self.selected_link = total.saturating_sub(1);
        }
    }

    /// Returns `true` when the application should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        self.controller.dismiss_copy_errors();

        if self.controller.settings().is_open() {
            self.handle_settings_key(key);
            return false;
        }

        match key.code {
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return false;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
                return false;
            }
            _ => {}
        }

        if self.focus.is_input() {
            self.handle_input_key(key);
            false
        } else {
            self.handle_results_key(key.code)
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        let focus = self.focus;
        let criteria = self.controller.criteria_mut();
        let field = match focus {
            Focus::Query => &mut criteria.query,
            Focus::Volume => &mut criteria.volume,
            Focus::Category => &mut criteria.category,
            Focus::Results => return,
        };
        match key.code {
            KeyCode::Char(ch) => field.push(ch),
            KeyCode::Backspace => {
                field.pop();
            }
            KeyCode::Delete => field.clear(),
            KeyCode::Enter => {
                if self.controller.submit_search().is_ok() {
                    self.selected_link = 0;
                }
            }
            KeyCode::Esc | KeyCode::Down => self.focus = Focus::Results,
            _ => {}
        }
    }

    fn handle_results_key(&mut self, code: KeyCode) -> bool {
        let now = Instant::now();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('/') => self.focus = Focus::Query,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => self.selected_link = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.selected_link = self.link_controls().len().saturating_sub(1);
            }
            KeyCode::Char('c') | KeyCode::Enter => {
                if let Some(control) = self.actionable_control() {
                    let _ = self.controller.copy_link(&control, now);
                }
            }
            KeyCode::Char('C') => {
                if self.controller.copy_all_available() {
                    let _ = self.controller.copy_all(now);
                }
            }
            KeyCode::Char('a') => {
                if let Some(control) = self.actionable_control() {
                    self.controller.add_to_queue(&control);
                }
            }
            KeyCode::Char('A') => {
                self.controller.add_all_to_queue();
            }
            KeyCode::Char('s') => {
                self.settings_field = SettingsField::Enabled;
                self.controller.open_settings();
            }
            KeyCode::Char('r') => {
                let _ = self.controller.submit_search();
            }
            _ => {}
        }
        false
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            self.controller.save_settings(now);
            return;
        }
        match key.code {
            KeyCode::Esc => self.controller.close_settings(),
            KeyCode::Tab | KeyCode::Down => self.settings_field = self.settings_field.next(),
            KeyCode::BackTab | KeyCode::Up => {
                self.settings_field = self.settings_field.previous()
            }
            KeyCode::Enter => match self.settings_field {
                SettingsField::Save => {
                    self.controller.save_settings(now);
                }
                SettingsField::Test => {
                    self.controller.test_connection(now);
                }
                SettingsField::Close => self.controller.close_settings(),
                SettingsField::Enabled => self.toggle_enabled(),
                _ => self.settings_field = self.settings_field.next(),
            },
            KeyCode::Char(' ') if self.settings_field == SettingsField::Enabled => {
                self.toggle_enabled()
            }
            KeyCode::Char(ch) => {
                if let Some(value) = self.active_settings_value() {
                    value.push(ch);
                }
            }
            KeyCode::Backspace => {
                if let Some(value) = self.active_settings_value() {
                    value.pop();
                }
            }
            KeyCode::Delete => {
                if let Some(value) = self.active_settings_value() {
                    value.clear();
                }
            }
            _ => {}
        }
    }

    fn toggle_enabled(&mut self) {
        if self.controller.settings().state() != PanelState::Ready {
            return;
        }
        if let Some(form) = self.controller.settings_form_mut() {
            form.enabled = !form.enabled;
        }
    }

    fn active_settings_value(&mut self) -> Option<&mut String> {
        if self.controller.settings().state() != PanelState::Ready {
            return None;
        }
        let field = self.settings_field;
        let form = self.controller.settings_form_mut()?;
        match field {
            SettingsField::Host => Some(&mut form.host),
            SettingsField::Port => Some(&mut form.ec_port),
            SettingsField::Password => Some(&mut form.password),
            _ => None,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let inside = self
                    .settings_area
                    .map_or(false, |area| rect_contains(area, mouse.column, mouse.row));
                if self.controller.settings().is_open() && !inside {
                    debug!("click outside settings panel");
                }
                self.controller.click(inside);
            }
            MouseEventKind::ScrollDown if !self.controller.settings().is_open() => {
                self.move_selection(1)
            }
            MouseEventKind::ScrollUp if !self.controller.settings().is_open() => {
                self.move_selection(-1)
            }
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let total = self.link_controls().len();
        if total == 0 {
            self.selected_link = 0;
            return;
        }
        let current = self.selected_link as i64 + i64::from(delta);
        self.selected_link = current.clamp(0, total as i64 - 1) as usize;
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let area = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        self.draw_inputs(frame, chunks[0]);
        self.draw_results(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        if self.controller.settings().is_open() {
            let popup = centered_rect(60, 60, area);
            self.settings_area = Some(popup);
            self.draw_settings(frame, popup);
        } else {
            self.settings_area = None;
        }
    }

    fn pane_block(&self, title: &str, focused: bool) -> Block<'static> {
        let border = if focused {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG))
    }

    fn draw_inputs(&self, frame: &mut Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Percentage(20),
                Constraint::Percentage(30),
            ])
            .split(area);

        let criteria = self.controller.criteria();
        let fields = [
            (Focus::Query, criteria.query.as_str()),
            (Focus::Volume, criteria.volume.as_str()),
            (Focus::Category, criteria.category.as_str()),
        ];
        for ((focus, value), column) in fields.into_iter().zip(columns.iter()) {
            let focused = self.focus == focus && !self.controller.settings().is_open();
            let mut text = value.to_string();
            if focused {
                text.push('▏');
            }
            let input = Paragraph::new(Span::styled(
                text,
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ))
            .block(self.pane_block(focus.title(), focused));
            frame.render_widget(input, *column);
        }
    }

    fn draw_results(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Results && !self.controller.settings().is_open();
        let title = match self.controller.results().len() {
            0 => Focus::Results.title().to_string(),
            n => format!("Results ({n})"),
        };
        let block = self.pane_block(&title, focused);

        let placeholder = match self.controller.search_state() {
            SearchState::Idle => Some(Text::from(Line::from(Span::styled(
                "Type a query, volume or category and press Enter.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )))),
            SearchState::Searching => Some(Text::from(Line::from(Span::styled(
                format!("{} Searching…", self.spinner.frame()),
                Style::default().fg(COLOR_ACCENT),
            )))),
            SearchState::Failed(message) => Some(Text::from(vec![
                Line::from(Span::styled(
                    "Error",
                    Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    message.clone(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )),
            ])),
            SearchState::Displayed if self.controller.groups().is_empty() => {
                Some(Text::from(vec![
                    Line::from(Span::styled(
                        "No results",
                        Style::default()
                            .fg(COLOR_TEXT_PRIMARY)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        "Try other keywords.",
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    )),
                ]))
            }
            SearchState::Displayed => None,
        };

        if let Some(text) = placeholder {
            let paragraph = Paragraph::new(text)
                .block(block)
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
            return;
        }

        let lines = self.result_lines();
        let selected = self.selected_control();
        let mut selected_row = None;
        let mut items = Vec::with_capacity(lines.len());
        for (row, line) in lines.iter().enumerate() {
            match line {
                ResultLine::Thread(index) => {
                    items.push(ListItem::new(self.thread_lines(
                        &self.controller.groups()[*index],
                    )));
                }
                ResultLine::Link(control) => {
                    if selected.as_ref() == Some(control) {
                        selected_row = Some(row);
                    }
                    items.push(ListItem::new(self.link_line(control)));
                }
            }
        }

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        self.list_state.select(selected_row);
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn result_lines(&self) -> Vec<ResultLine> {
        let mut lines = Vec::new();
        for (index, group) in self.controller.groups().iter().enumerate() {
            lines.push(ResultLine::Thread(index));
            for link in 0..group.links.len() {
                lines.push(ResultLine::Link(ControlId::new(&group.thread_id, link)));
            }
        }
        lines
    }

    fn thread_lines(&self, group: &ThreadGroup) -> Vec<Line<'static>> {
        let title = group.title.clone().unwrap_or_default();
        let category = group
            .category
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORISED.to_string());
        let cover = if group.lacks_cover() {
            NO_COVER.to_string()
        } else {
            group
                .cover_image
                .as_deref()
                .and_then(cover_path)
                .unwrap_or_else(|| NO_COVER.to_string())
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(
                title,
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(format!("[{category}]"), Style::default().fg(COLOR_ACCENT)),
            Span::raw("  "),
            Span::styled(
                cover,
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])];
        if let Some(description) = group.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(Span::styled(
                truncate_to_width(description, 120),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        lines
    }

    fn link_line(&self, control: &ControlId) -> Line<'static> {
        let Some(row) = self.controller.row(control) else {
            return Line::default();
        };
        let mut spans = vec![Span::raw("  ")];
        if let Some(volume) = row.volume.as_deref().filter(|v| !v.is_empty()) {
            spans.push(Span::styled(
                format!("Vol. {volume} "),
                Style::default().fg(COLOR_BADGE).add_modifier(Modifier::BOLD),
            ));
        }
        let filename = row.filename.clone().unwrap_or_default();
        spans.push(Span::styled(
            truncate_to_width(&filename, FILENAME_MAX_WIDTH),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ));
        spans.push(Span::styled(
            format!("  {}", format_size(row.filesize)),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));

        spans.push(Span::raw("  "));
        spans.push(match self.controller.copy_state(control) {
            CopyState::Ready => Span::styled("[copy]", Style::default().fg(COLOR_ACCENT)),
            CopyState::Copied => Span::styled("[✓ copied]", Style::default().fg(COLOR_SUCCESS)),
            CopyState::Error(message) => {
                Span::styled(format!("[✗ {message}]"), Style::default().fg(COLOR_ERROR))
            }
        });

        if self.controller.queue_controls_visible() {
            spans.push(Span::raw(" "));
            spans.push(match self.controller.add_state(control) {
                AddState::Ready => Span::styled("[add]", Style::default().fg(COLOR_ACCENT)),
                AddState::Pending => Span::styled(
                    format!("[{} sending]", self.spinner.frame()),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ),
                AddState::Success => {
                    Span::styled("[✓ added]", Style::default().fg(COLOR_SUCCESS))
                }
                AddState::Error(message) => {
                    Span::styled(format!("[✗ {message}]"), Style::default().fg(COLOR_ERROR))
                }
            });
        }
        Line::from(spans)
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        let (text, color) = if let Some(prompt) = self.controller.prompt() {
            (prompt.to_string(), COLOR_ERROR)
        } else if let Some(banner) = self.controller.status() {
            (banner.text.clone(), banner_color(banner))
        } else {
            (self.footer_text(), COLOR_TEXT_SECONDARY)
        };
        let footer = Paragraph::new(Span::styled(text, Style::default().fg(color)))
            .style(Style::default().bg(COLOR_BG));
        frame.render_widget(footer, area);
    }

    fn footer_text(&self) -> String {
        let mut hints = vec!["Tab focus", "Enter search", "j/k move", "c copy"];
        if self.controller.copy_all_available() {
            hints.push("C copy all");
        }
        if self.controller.queue_controls_visible() {
            hints.push("a add");
            if self.controller.add_all_state().is_enabled() {
                hints.push("A add all");
            }
        }
        hints.push("s queue settings");
        hints.push("q quit");
        let mut text = format!("{} · {}", self.server_label, hints.join(" · "));
        if *self.controller.add_all_state() == AddState::Pending {
            text = format!("{} Sending all links… · {text}", self.spinner.frame());
        }
        text
    }

    fn draw_settings(&self, frame: &mut Frame<'_>, area: Rect) {
        frame.render_widget(Clear, area);
        let block = Block::default()
            .title(Span::styled(
                "Download queue",
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let panel = Paragraph::new(self.settings_body())
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(panel, area);

        let hint_area = Rect {
            x: area.x,
            y: area.y.saturating_add(area.height.saturating_sub(2)),
            width: area.width,
            height: 1,
        };
        let hint = Paragraph::new("Tab move · Space toggle · Enter activate · Ctrl-S save · Esc close")
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            );
        frame.render_widget(hint, hint_area);
    }

    fn settings_body(&self) -> Text<'static> {
        let settings = self.controller.settings();
        let mut lines = vec![Line::from(Span::styled(
            format!("Config file: {}", self.config_path),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ))];
        lines.push(Line::default());

        if settings.state() == PanelState::Loading {
            lines.push(Line::from(Span::styled(
                format!("{} Loading configuration…", self.spinner.frame()),
                Style::default().fg(COLOR_ACCENT),
            )));
        } else {
            for field in SettingsField::ALL {
                lines.push(self.settings_field_line(field));
            }
        }

        if let Some(banner) = settings.message() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                banner.text.clone(),
                Style::default()
                    .fg(banner_color(banner))
                    .add_modifier(Modifier::BOLD),
            )));
        }
        Text::from(lines)
    }

    fn settings_field_line(&self, field: SettingsField) -> Line<'static> {
        let settings = self.controller.settings();
        let form = settings.form();
        let active = self.settings_field == field;
        let marker = if active { "▶ " } else { "  " };
        let style = if active {
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_SELECTED_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };

        if field.is_button() {
            let busy = match field {
                SettingsField::Save => settings.is_saving(),
                SettingsField::Test => settings.is_testing(),
                _ => false,
            };
            let label = if busy {
                format!("{marker}[{} {}…]", self.spinner.frame(), field.title())
            } else {
                format!("{marker}[{}]", field.title())
            };
            return Line::from(Span::styled(label, style));
        }

        let value = match field {
            SettingsField::Enabled => {
                if form.enabled {
                    "[x]".to_string()
                } else {
                    "[ ]".to_string()
                }
            }
            SettingsField::Host => form.host.clone(),
            SettingsField::Port => form.ec_port.clone(),
            SettingsField::Password => "*".repeat(form.password.chars().count()),
            _ => String::new(),
        };
        Line::from(vec![
            Span::styled(format!("{marker}{:<10}", field.title()), style),
            Span::styled(format!(" {value}"), Style::default().fg(COLOR_ACCENT)),
        ])
    }
}

fn banner_color(banner: &Banner) -> Color {
    match banner.kind {
        MessageKind::Success => COLOR_SUCCESS,
        MessageKind::Error => COLOR_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::ResultRow;
    use crate::clipboard::MemoryClipboard;
    use crate::controller::ResultSet;
    use crate::data::{MockQueueService, MockSearchService};

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 60, area);
        assert!(popup.x >= area.x && popup.y >= area.y);
        assert!(popup.x + popup.width <= area.width);
        assert!(popup.y + popup.height <= area.height);
    }

    #[test]
    fn rect_contains_excludes_far_edges() {
        let area = Rect::new(10, 5, 20, 10);
        assert!(rect_contains(area, 10, 5));
        assert!(rect_contains(area, 29, 14));
        assert!(!rect_contains(area, 30, 14));
        assert!(!rect_contains(area, 9, 5));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_to_width("short", 10), "short");
        let cut = truncate_to_width("a very long filename.mkv", 10);
        assert!(cut.ends_with('…'));
        assert!(cut.width() <= 10);
    }

    #[test]
    fn focus_cycles_through_every_pane() {
        let mut focus = Focus::Query;
        for _ in 0..4 {
            focus = focus.next();
        }
        assert!(focus == Focus::Query);
        assert!(Focus::Query.previous() == Focus::Results);
    }

    #[test]
    fn settings_fields_round_trip() {
        for field in SettingsField::ALL {
            assert!(field.next().previous() == field);
        }
    }

    fn model_over(rows: Vec<ResultRow>) -> (Model, MemoryClipboard) {
        let clipboard = MemoryClipboard::new();
        let controller = Controller::new(crate::controller::Options {
            search_service: Arc::new(MockSearchService::new(rows)),
            queue_service: Arc::new(MockQueueService::enabled()),
            clipboard: Box::new(clipboard.clone()),
            results: ResultSet::default(),
            timings: Default::default(),
        });
        let model = Model::new(Options {
            controller,
            server_label: "http://127.0.0.1:8080/".into(),
            config_path: "~/.config/linkseek/config.yaml".into(),
        });
        (model, clipboard)
    }

    fn settle(model: &mut Model) {
        for _ in 0..50 {
            if model.controller.in_flight() == 0 {
                return;
            }
            model
                .controller
                .wait_async(Duration::from_millis(100), Instant::now());
        }
        panic!("background requests did not finish");
    }

    #[test]
    fn link_actions_wait_for_displayed_results() {
        let rows = vec![ResultRow {
            thread_id: "1".into(),
            link: "ed2k://first".into(),
            ..ResultRow::default()
        }];
        let (mut model, clipboard) = model_over(rows);
        settle(&mut model);
        model.controller.criteria_mut().query = "first".into();
        model.controller.submit_search().unwrap();
        model.focus = Focus::Results;

        assert!(!model.handle_results_key(KeyCode::Char('c')));
        assert!(!model.handle_results_key(KeyCode::Char('a')));
        assert_eq!(clipboard.contents(), None);

        settle(&mut model);
        assert_eq!(*model.controller.search_state(), SearchState::Displayed);
        model.handle_results_key(KeyCode::Char('c'));
        assert_eq!(clipboard.contents().as_deref(), Some("ed2k://first"));
    }
}
