use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use epic_lib::{
    config::{read_config, ViewConfig},
    control::TreeController,
    io::{read_epochs, LoadOptions},
    render::{NavDirection, NavModifiers, NavOutcome, RowView, WidgetEvent, WidgetInput},
    synth::{synthesize, SynthSpec},
    tree::EpochTree,
};
use log::info;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};

// borders plus status bar
const CHROME_ROWS: u16 = 5;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let mut args = std::env::args().skip(1).map(PathBuf::from);
    let input = args.next();
    let config_path = args.next();

    let mut terminal = setup_terminal()?;
    let rows = terminal.size()?.height.saturating_sub(CHROME_ROWS).max(1) as usize;
    let app = App::load(input, config_path, rows);
    let result = match app {
        Ok(mut app) => run(&mut terminal, &mut app),
        Err(err) => Err(err),
    };
    restore_terminal()?;
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(150);
    let mut last_tick = Instant::now();
    while !app.should_quit {
        terminal.draw(|f| draw(f, app))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

struct App {
    controller: TreeController,
    source: String,
    status: String,
    page: usize,
    should_quit: bool,
}

impl App {
    /// The widget pool is sized once, to the rows the terminal can show.
    fn load(input: Option<PathBuf>, config_path: Option<PathBuf>, rows: usize) -> Result<Self> {
        let mut config = match &config_path {
            Some(path) => read_config(path)?,
            None => ViewConfig::default(),
        };
        let (store, source) = match &input {
            Some(path) => {
                let options = LoadOptions {
                    expand_cell_types: true,
                    prefix_rgc: true,
                };
                (read_epochs(path, &options)?, path.display().to_string())
            }
            None => {
                if config.split_by.is_empty() {
                    config.split_by = vec!["cellInfo.type".into(), "blockInfo.protocol_name".into()];
                }
                (synthesize(&SynthSpec::default()), "synthetic".to_string())
            }
        };
        let tree = EpochTree::build(store, &config.builder()).context("building epoch tree")?;
        let pool_size = config.pool_size.min(rows);
        info!(
            "viewing {} epochs from {} with {} widgets",
            tree.store().len(),
            source,
            pool_size
        );
        let controller =
            TreeController::new(tree, config.trunk_label.clone(), pool_size, config.expansion());
        Ok(Self {
            controller,
            source,
            status: "↑/↓ move  →/← expand  space check  a/d all  PgUp/PgDn scroll  q quit".into(),
            page: pool_size,
            should_quit: false,
        })
    }

    fn on_key(&mut self, key: KeyEvent) {
        if let Err(err) = self.dispatch(key) {
            self.status = format!("Error: {}", err);
        }
    }

    fn dispatch(&mut self, key: KeyEvent) -> Result<()> {
        let extend = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.navigate(NavDirection::Up, extend),
            KeyCode::Down => self.navigate(NavDirection::Down, extend),
            KeyCode::Home => self.navigate(NavDirection::First, extend),
            KeyCode::End => self.navigate(NavDirection::Last, extend),
            KeyCode::Right => self.set_active_expanded(true)?,
            KeyCode::Left => self.set_active_expanded(false)?,
            KeyCode::Char(' ') => self.send(WidgetInput::ToggleCheck)?,
            KeyCode::Char('a') => {
                let written = self.controller.select_all()?;
                self.status = format!("selected {} epochs", written);
            }
            KeyCode::Char('d') => {
                let written = self.controller.deselect_all()?;
                self.status = format!("deselected {} epochs", written);
            }
            KeyCode::PageUp => self.scroll(-(self.page as isize)),
            KeyCode::PageDown => self.scroll(self.page as isize),
            _ => {}
        }
        Ok(())
    }

    fn navigate(&mut self, direction: NavDirection, extend: bool) {
        if let NavOutcome::Boundary = self.controller.navigate(direction, NavModifiers { extend }) {
            self.status = "already at the edge of the tree".into();
        }
    }

    fn scroll(&mut self, delta: isize) {
        let view = self.controller.view_mut();
        view.scroll_by(delta);
        view.draw();
    }

    fn set_active_expanded(&mut self, expanded: bool) -> Result<()> {
        let view = self.controller.view();
        let Some(node) = view.active().and_then(|key| view.node(key)) else {
            return Ok(());
        };
        if node.has_children() && node.is_expanded() != expanded {
            self.send(WidgetInput::ToggleExpand)?;
        }
        Ok(())
    }

    /// Route an input to the widget showing the active row.
    fn send(&mut self, input: WidgetInput) -> Result<()> {
        let view = self.controller.view();
        let Some(widget) = view.active().and_then(|key| view.binder().widget_for(key)) else {
            return Ok(());
        };
        self.controller.handle_event(WidgetEvent { widget, input })?;
        Ok(())
    }
}

fn draw(f: &mut Frame<'_>, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.size());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(layout[0]);
    draw_tree(f, body[0], app);
    draw_details(f, body[1], app);
    draw_status(f, layout[1], app);
}

fn row_line<'a>(app: &App, row: &RowView<'a>) -> Line<'a> {
    let node = row.node;
    let marker = match (node.has_children(), node.is_expanded()) {
        (false, _) => "  ",
        (true, true) => "▾ ",
        (true, false) => "▸ ",
    };
    let counts = node
        .owner()
        .and_then(|id| app.controller.tree().node(id).ok())
        .map(|n| format!("  ({}/{})", n.selected_count(), n.epoch_count()))
        .unwrap_or_default();
    let mut style = Style::default();
    if row.selected {
        style = style.fg(Color::Cyan);
    }
    if row.active {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Line::from(vec![
        Span::raw("  ".repeat(node.depth())),
        Span::raw(marker),
        Span::raw(if row.checked { "[x] " } else { "[ ] " }),
        Span::styled(node.label().to_string(), style),
        Span::styled(counts, Style::default().fg(Color::DarkGray)),
    ])
}

fn draw_tree(f: &mut Frame<'_>, area: Rect, app: &App) {
    let view = app.controller.view();
    let items: Vec<ListItem> = view
        .rows()
        .map(|row| ListItem::new(row_line(app, &row)))
        .collect();
    let title = format!(
        "{} ({} rows, {} widgets)",
        app.source,
        view.draw_count(),
        view.pool().capacity()
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn draw_details(f: &mut Frame<'_>, area: Rect, app: &App) {
    let meta = app.controller.metadata();
    let path: Vec<String> = app
        .controller
        .current()
        .path()
        .iter()
        .map(|v| v.to_string())
        .collect();
    let text = vec![
        Line::from(format!("path: /{}", path.join("/"))),
        Line::from(format!(
            "split: {} = {}",
            meta.split_key.as_deref().unwrap_or("-"),
            meta.split_value.as_deref().unwrap_or("-")
        )),
        Line::from(format!("epochs: {} selected / {}", meta.selected_count, meta.epoch_count)),
        Line::from(format!("depth: {}  children: {}", meta.depth, meta.child_count)),
        Line::from(format!(
            "leaf: {}  checked: {}",
            meta.is_leaf, meta.is_selected
        )),
        Line::from(format!(
            "highlighted rows: {}",
            app.controller.view().selected_nodes().len()
        )),
    ];
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Node"));
    f.render_widget(paragraph, area);
}

fn draw_status(f: &mut Frame<'_>, area: Rect, app: &App) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}
