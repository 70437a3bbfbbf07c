use std::io;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;

use anyhow::Result;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use crossterm::execute;
use crossterm::terminal::SetTitle;
use dsearch_core::Entry;
use dsearch_core::EntryManager;
use dsearch_core::EntryMsg;
use dsearch_core::Loader;
use ratatui::Frame;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::app_event::AppEvent;
use crate::app_event::AppEventSender;
use crate::search::SearchCoordinator;

/// Result rows kept visible under the query line.
const VISIBLE_ROWS: usize = 6;
const PLACEHOLDER: &str = "Searching ...";

/// Runs the launcher UI until the user selects an entry or quits.
pub async fn run(
    manager: EntryManager,
    refresh_rx: Receiver<EntryMsg>,
    loaders: Vec<Loader>,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, manager, refresh_rx, loaders).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut ratatui::DefaultTerminal,
    manager: EntryManager,
    refresh_rx: Receiver<EntryMsg>,
    loaders: Vec<Loader>,
) -> Result<()> {
    execute!(io::stdout(), SetTitle("DSearch"))?;

    let (tx, mut rx) = unbounded_channel();
    let app_event_tx = AppEventSender::new(tx);

    // Refresh messages funnel onto the app event channel so the loop has a
    // single source to select over.
    {
        let app_event_tx = app_event_tx.clone();
        thread::spawn(move || {
            for msg in refresh_rx {
                app_event_tx.send(AppEvent::Entry(msg));
            }
        });
    }
    {
        let manager = manager.clone();
        let app_event_tx = app_event_tx.clone();
        thread::spawn(move || {
            manager.load_entries(loaders);
            // The lossy refresh channel may drop the core's own Loaded
            // notification; this one is delivered unconditionally.
            app_event_tx.send(AppEvent::Entry(EntryMsg::Loaded));
        });
    }

    let search = SearchCoordinator::new(manager.clone(), app_event_tx.clone());
    let mut app = App::new(manager, search);
    let mut terminal_events = EventStream::new();

    loop {
        terminal.draw(|frame| app.draw(frame))?;
        tokio::select! {
            Some(event) = rx.recv() => app.handle_app_event(event),
            Some(Ok(event)) = terminal_events.next() => app.handle_terminal_event(event),
        }
        if app.should_exit {
            return Ok(());
        }
    }
}

struct App {
    manager: EntryManager,
    search: SearchCoordinator,
    input: String,
    entries: Vec<Arc<Entry>>,
    cursor: usize,
    loading: bool,
    filtering: bool,
    should_exit: bool,
}

impl App {
    fn new(manager: EntryManager, search: SearchCoordinator) -> Self {
        Self {
            manager,
            search,
            input: String::new(),
            entries: Vec::new(),
            cursor: 0,
            loading: true,
            filtering: false,
            should_exit: false,
        }
    }

    fn handle_terminal_event(&mut self, event: Event) {
        if let Event::Key(key) = event
            && key.kind != KeyEventKind::Release
        {
            self.handle_key(key);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_exit = true;
            }
            KeyCode::Enter => self.select_current(),
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_cursor(-1);
            }
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_cursor(1);
            }
            KeyCode::PageUp => self.move_cursor(-(VISIBLE_ROWS as isize)),
            KeyCode::PageDown => self.move_cursor(VISIBLE_ROWS as isize),
            KeyCode::Backspace => {
                if self.input.pop().is_some() {
                    self.submit_query();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(c);
                self.submit_query();
            }
            _ => {}
        }
    }

    fn submit_query(&mut self) {
        self.filtering = true;
        self.search.submit(self.input.clone());
    }

    fn select_current(&mut self) {
        if let Some(entry) = self.entries.get(self.cursor) {
            debug!(name = entry.name(), "entry selected");
            self.manager.select_entry(entry);
        }
        self.should_exit = true;
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.entries.is_empty() {
            return;
        }
        let last = self.entries.len() - 1;
        let next = self.cursor.saturating_add_signed(delta).min(last);
        self.cursor = next;
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Entry(EntryMsg::Loaded) => self.loading = false,
            AppEvent::Entry(
                EntryMsg::Refreshed(entries)
                | EntryMsg::Filtered(entries)
                | EntryMsg::Stopped(entries),
            ) => {
                // While a query is live, only filter-job snapshots matter;
                // full-store refreshes from the loader would clobber it.
                if self.input.is_empty() || self.filtering {
                    self.set_entries(entries);
                }
            }
            AppEvent::Entry(EntryMsg::Selected(_)) => {}
            AppEvent::FilterDone {
                query, entries, ..
            } => {
                if query == self.input {
                    self.filtering = false;
                    self.set_entries(entries);
                }
            }
        }
    }

    fn set_entries(&mut self, entries: Vec<Arc<Entry>>) {
        self.entries = entries;
        self.cursor = self.cursor.min(self.entries.len().saturating_sub(1));
    }

    fn draw(&self, frame: &mut Frame) {
        let mut lines: Vec<Line> = Vec::new();
        if self.input.is_empty() {
            lines.push(Line::from(vec!["   ".into(), PLACEHOLDER.dim()]));
        } else {
            lines.push(Line::from(vec!["   ".into(), self.input.as_str().into()]));
        }
        lines.push(Line::default());

        let (start, end) = visible_window(self.cursor, VISIBLE_ROWS, self.entries.len());
        for (offset, entry) in self.entries[start..end].iter().enumerate() {
            let index = start + offset;
            if index == self.cursor {
                lines.push(Line::from(vec!["> ".into(), entry.name().bold()]));
            } else {
                lines.push(Line::from(vec!["  ".into(), entry.name().into()]));
            }
        }

        lines.push(Line::default());
        if self.loading {
            lines.push(
                Line::from(format!("{} entries (loading...)", self.entries.len())).dim(),
            );
        }
        lines.push(Line::from("Press Esc to quit.").dim());
        frame.render_widget(Paragraph::new(lines), frame.area());
    }
}

/// The window of entries shown under the prompt: the cursor stays on the
/// last visible row once it moves past the window.
fn visible_window(cursor: usize, rows: usize, len: usize) -> (usize, usize) {
    let (start, end) = if cursor >= rows {
        (cursor + 1 - rows, cursor + 1)
    } else {
        (0, rows)
    };
    (start.min(len), end.min(len))
}
