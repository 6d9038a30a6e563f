use crate::api::{ApiClient, FileEntry, StorageSummary};
use crate::filters::{file_type_label, FilterController, FilterField, SyncState, FILE_TYPES};
use crate::{format_megabytes, format_size, format_timestamp};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    FileType,
    MinSize,
    MaxSize,
    List,
}

#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Delete(FileEntry),
    Download(FileEntry),
}

struct App {
    filters: FilterController,
    files: Vec<FileEntry>,
    summary: Option<StorageSummary>,
    selected: usize,
    focus: Focus,
    /// Filter revision the current listing was fetched for.
    listed_revision: Option<u64>,
    summary_stale: bool,
    confirm_delete: Option<FileEntry>,
    pending: Option<Pending>,
    message: Option<String>,
    error: Option<String>,
    quit: bool,
}

impl App {
    fn new() -> Self {
        Self {
            filters: FilterController::new(),
            files: Vec::new(),
            summary: None,
            selected: 0,
            focus: Focus::List,
            listed_revision: None,
            summary_stale: true,
            confirm_delete: None,
            pending: None,
            message: None,
            error: None,
            quit: false,
        }
    }

    fn needs_listing(&self) -> bool {
        self.listed_revision != Some(self.filters.revision())
    }

    /// Force a refetch of both the listing and the summary.
    fn invalidate(&mut self) {
        self.listed_revision = None;
        self.summary_stale = true;
    }

    fn set_files(&mut self, files: Vec<FileEntry>) {
        self.files = files;
        self.selected = self.selected.min(self.files.len().saturating_sub(1));
    }

    fn selected_file(&self) -> Option<&FileEntry> {
        self.files.get(self.selected)
    }

    fn apply(&mut self) {
        self.filters.commit();
        self.focus = Focus::List;
    }

    fn toggle_panel(&mut self) {
        self.filters.toggle_panel();
        if self.filters.panel_open() {
            self.focus = Focus::FileType;
        } else if matches!(self.focus, Focus::FileType | Focus::MinSize | Focus::MaxSize) {
            self.focus = Focus::List;
        }
    }

    fn edit_draft(&mut self, field: FilterField, code: KeyCode) {
        let mut value = self.filters.drafts().get(field).to_string();
        match code {
            KeyCode::Char(c) => value.push(c),
            KeyCode::Backspace => {
                value.pop();
            }
            _ => return,
        }
        self.filters.set_draft(field, value);
    }

    fn cycle_file_type(&mut self, forward: bool) {
        let current = FILE_TYPES
            .iter()
            .position(|t| t.value == self.filters.drafts().file_type)
            .unwrap_or(0);
        let len = FILE_TYPES.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.filters.set_draft(FilterField::FileType, FILE_TYPES[next].value);
    }

    /// Remove the n-th active filter chip (1-based, as shown on screen).
    fn remove_chip(&mut self, n: usize) {
        let chip = n
            .checked_sub(1)
            .and_then(|i| self.filters.applied().active_filters().get(i).map(|(f, _)| *f));
        if let Some(field) = chip {
            self.filters.remove_field(field);
        }
    }

    fn next_focus(&self, forward: bool) -> Focus {
        let order: &[Focus] = if self.filters.panel_open() {
            &[Focus::Search, Focus::FileType, Focus::MinSize, Focus::MaxSize, Focus::List]
        } else {
            &[Focus::Search, Focus::List]
        };
        let current = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (current + 1) % order.len()
        } else {
            (current + order.len() - 1) % order.len()
        };
        order[next]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        self.message = None;
        self.error = None;

        // Any key answers an open delete prompt; only y confirms
        if let Some(entry) = self.confirm_delete.take() {
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                self.quit = true;
            } else if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.pending = Some(Pending::Delete(entry));
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.quit = true,
                KeyCode::Char('f') => self.toggle_panel(),
                KeyCode::Char('x') => self.filters.reset(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Tab => {
                self.focus = self.next_focus(true);
                return;
            }
            KeyCode::BackTab => {
                self.focus = self.next_focus(false);
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::Search | Focus::MinSize | Focus::MaxSize => {
                let field = match self.focus {
                    Focus::Search => FilterField::SearchTerm,
                    Focus::MinSize => FilterField::MinSize,
                    _ => FilterField::MaxSize,
                };
                match key.code {
                    KeyCode::Enter => self.apply(),
                    KeyCode::Esc => self.focus = Focus::List,
                    code => self.edit_draft(field, code),
                }
            }
            Focus::FileType => match key.code {
                KeyCode::Left => self.cycle_file_type(false),
                KeyCode::Right | KeyCode::Char(' ') => self.cycle_file_type(true),
                KeyCode::Enter => self.apply(),
                KeyCode::Esc => self.focus = Focus::List,
                _ => {}
            },
            Focus::List => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                KeyCode::Char('j') | KeyCode::Down => {
                    if self.selected + 1 < self.files.len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.selected = self.selected.saturating_sub(1);
                }
                KeyCode::Char('/') => self.focus = Focus::Search,
                KeyCode::Char('f') => self.toggle_panel(),
                KeyCode::Char('s') => {
                    let order = self.filters.applied().ordering().toggled();
                    self.filters.change_sort_immediately(order);
                }
                KeyCode::Char('c') => self.filters.reset(),
                KeyCode::Char(c @ '1'..='4') => {
                    self.remove_chip(c as usize - '0' as usize);
                }
                KeyCode::Char('d') => self.confirm_delete = self.selected_file().cloned(),
                KeyCode::Char('w') => {
                    self.pending = self.selected_file().cloned().map(Pending::Download);
                }
                KeyCode::Char('r') => self.invalidate(),
                _ => {}
            },
        }
    }
}

pub async fn run_browser(client: &ApiClient, download_dir: &Path) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let result = run_app(&mut terminal, &mut app, client, download_dir).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    client: &ApiClient,
    download_dir: &Path,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.quit {
            return Ok(());
        }

        // Handle async operations
        if let Some(pending) = app.pending.take() {
            match pending {
                Pending::Delete(entry) => match client.delete_file(&entry.id).await {
                    Ok(()) => {
                        app.message = Some(format!("deleted {}", entry.original_filename));
                        app.invalidate();
                    }
                    Err(e) => app.error = Some(e.to_string()),
                },
                Pending::Download(entry) => match client.download_to(&entry, download_dir).await {
                    Ok(path) => app.message = Some(format!("saved {}", path.display())),
                    Err(e) => app.error = Some(e.to_string()),
                },
            }
            continue;
        }

        if app.needs_listing() {
            let revision = app.filters.revision();
            match client.list_files(app.filters.applied()).await {
                Ok(files) => app.set_files(files),
                // Filter state stays as applied; only the listing is stale.
                Err(e) => app.error = Some(e.to_string()),
            }
            app.listed_revision = Some(revision);
            continue;
        }

        if app.summary_stale {
            match client.storage_summary().await {
                Ok(summary) => app.summary = Some(summary),
                Err(e) => app.error = Some(e.to_string()),
            }
            app.summary_stale = false;
            continue;
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.handle_key(key);
            }
        }
    }
}

/// Where `w` saves downloads.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn focused(app: &App, focus: Focus) -> Style {
    if app.focus == focus {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn input_line<'a>(app: &App, focus: Focus, label: &str, value: &str) -> Line<'a> {
    let (marker, cursor) = if app.focus == focus { ("> ", "_") } else { ("  ", "") };
    Line::from(Span::styled(
        format!("{}{}: {}{}", marker, label, value, cursor),
        focused(app, focus),
    ))
}

fn ui(f: &mut Frame, app: &App) {
    let area = f.area();
    let applied = app.filters.applied();
    let drafts = app.filters.drafts();

    let mut constraints = vec![Constraint::Length(1), Constraint::Length(3)];
    if app.filters.panel_open() {
        constraints.push(Constraint::Length(5));
    }
    if applied.is_filtering() {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Min(3));
    constraints.push(Constraint::Length(1));

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let mut rows = layout.iter().copied();
    let mut next_row = move || rows.next().unwrap_or_default();

    // Header
    let mut header = vec![
        Span::styled("vault", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  sort: {}", applied.ordering().label())),
    ];
    if applied.is_filtering() {
        header.push(Span::raw("  [c] clear filters"));
    }
    if app.filters.state() == SyncState::Editing {
        header.push(Span::raw("  (edited, [enter] to apply)"));
    }
    f.render_widget(Paragraph::new(Line::from(header)), next_row());

    // Search bar
    let cursor = if app.focus == Focus::Search { "_" } else { "" };
    let search = Paragraph::new(format!("{}{}", drafts.search_term, cursor)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focused(app, Focus::Search))
            .title("search by filename"),
    );
    f.render_widget(search, next_row());

    if app.filters.panel_open() {
        let type_value = format!("< {} >", file_type_label(&drafts.file_type));
        let lines = vec![
            input_line(app, Focus::FileType, "type", &type_value),
            input_line(app, Focus::MinSize, "min size (KB)", &drafts.min_size),
            input_line(app, Focus::MaxSize, "max size (KB)", &drafts.max_size),
        ];
        let panel = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("filters  [enter] apply  [ctrl-x] clear"),
        );
        f.render_widget(panel, next_row());
    }

    if applied.is_filtering() {
        let chips: Vec<Span> = applied
            .active_filters()
            .into_iter()
            .enumerate()
            .map(|(i, (_, label))| Span::raw(format!("[{}] {}  ", i + 1, label)))
            .collect();
        f.render_widget(Paragraph::new(Line::from(chips)), next_row());
    }

    let body = next_row();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(body);
    render_files(f, app, columns[0]);
    render_summary(f, app.summary.as_ref(), columns[1]);

    // Footer
    let footer = if let Some(entry) = &app.confirm_delete {
        format!("delete {}? [y] confirm  [any] cancel", entry.original_filename)
    } else if let Some(err) = &app.error {
        format!("! {}", err)
    } else if let Some(msg) = &app.message {
        format!("* {}", msg)
    } else {
        match app.focus {
            Focus::List => "[/] search  [f] filters  [s] sort  [1-4] remove filter  [d] delete  [w] download  [r] refresh  [q] quit".to_string(),
            Focus::FileType => "[<-/->] type  [tab] next  [enter] apply  [esc] back".to_string(),
            _ => "[enter] apply  [tab] next  [esc] back".to_string(),
        }
    };
    f.render_widget(Paragraph::new(footer), next_row());
}

fn render_files(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focused(app, Focus::List))
        .title(format!("files ({})", app.files.len()));

    if app.files.is_empty() {
        let text = if app.filters.applied().is_filtering() {
            "No files match your filters"
        } else {
            "No files. Get started by uploading a file: vault upload <path>"
        };
        f.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .files
        .iter()
        .map(|file| {
            ListItem::new(format!(
                "{:>10}  {}  {}",
                format_size(file.size),
                format_timestamp(&file.uploaded_at),
                file.original_filename
            ))
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_summary(f: &mut Frame, summary: Option<&StorageSummary>, area: Rect) {
    let lines = match summary {
        Some(s) => vec![
            Line::from(format!("total files: {}", s.total_files)),
            Line::from(format!("unique files: {}", s.unique_files)),
            Line::from(format!("total size: {}", format_megabytes(s.total_size))),
            Line::from(format!("unique size: {}", format_megabytes(s.unique_size))),
            Line::from(Span::styled(
                format!("saved: {}", format_megabytes(s.savings)),
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ],
        None => vec![Line::from("loading storage summary...")],
    };
    let block = Block::default().borders(Borders::ALL).title("storage");
    f.render_widget(Paragraph::new(lines).block(block), area);
}
