//! Overview (drones and fleet counters)
//! Tasks (stored tasks with status and progress)
//! Areas (restricted areas and reconstructed paths)

use std::{
  error::Error,
  io,
  sync::mpsc,
  thread,
  time::{Duration, Instant},
};

use crossterm::{
  event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode},
  execute,
  terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fleet_console::config::console_url_from_env;
use fleet_console::models::{DroneState, RestrictedArea, TaskId};
use serde::Deserialize;
use tokio::runtime::Runtime;
use tui::{
  backend::{Backend, CrosstermBackend},
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Span, Spans},
  widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
  Terminal,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Counters {
  active_drones: usize,
  completed_tasks: u64,
  emergency_in_progress: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRow {
  id: TaskId,
  time: String,
  status: String,
  progress: u8,
  #[serde(default)]
  emergency_level: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathRow {
  drone_id: String,
  points: usize,
  distance_to_service_point_km: f64,
  returned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prompt {
  task_id: TaskId,
  area_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
  simulation_running: bool,
  counters: Counters,
  tasks: Vec<TaskRow>,
  drones: Vec<DroneState>,
  paths: Vec<PathRow>,
  restricted_areas: Vec<RestrictedArea>,
  pending_bypass: Option<Prompt>,
}

#[derive(Clone, Copy)]
enum DashboardTab {
  Overview,
  Tasks,
  Areas,
}

struct App {
  current_tab: DashboardTab,
  snapshot: Snapshot,
  connected: bool,
  status_line: String,
}

impl App {
  fn new() -> Self {
    Self {
      current_tab: DashboardTab::Overview,
      snapshot: Snapshot::default(),
      connected: false,
      status_line: String::new(),
    }
  }

  fn next_tab(&mut self) {
    self.current_tab = match self.current_tab {
      DashboardTab::Overview => DashboardTab::Tasks,
      DashboardTab::Tasks => DashboardTab::Areas,
      DashboardTab::Areas => DashboardTab::Overview,
    }
  }

  fn previous_tab(&mut self) {
    self.current_tab = match self.current_tab {
      DashboardTab::Overview => DashboardTab::Areas,
      DashboardTab::Tasks => DashboardTab::Overview,
      DashboardTab::Areas => DashboardTab::Tasks,
    }
  }
}

async fn fetch_snapshot(client: &reqwest::Client, base: &str) -> Result<Snapshot, reqwest::Error> {
  client.get(format!("{}/snapshot", base)).send().await?.error_for_status()?.json().await
}

/// Posts an operator action and returns the line to show in the footer.
async fn post_action(client: &reqwest::Client, base: &str, path: &str) -> String {
  let result = client.post(format!("{}{}", base, path)).send().await;
  match result {
    Ok(resp) if resp.status().is_success() => format!("{}: ok", path),
    Ok(resp) => {
      let status = resp.status();
      let body = resp.json::<serde_json::Value>().await.ok();
      let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("request failed")
        .to_string();
      format!("{}: {} ({})", path, message, status)
    }
    Err(e) => format!("{}: {}", path, e),
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  let base = console_url_from_env();
  let rt = Runtime::new()?;
  let client = reqwest::Client::new();

  let (tx, rx) = mpsc::channel::<Option<Snapshot>>();
  {
    let base = base.clone();
    thread::spawn(move || {
      let client = reqwest::Client::new();
      let rt_bg = match Runtime::new() {
        Ok(rt) => rt,
        Err(_) => return,
      };
      loop {
        let snapshot = rt_bg.block_on(fetch_snapshot(&client, &base)).ok();
        if tx.send(snapshot).is_err() {
          break;
        }
        thread::sleep(Duration::from_secs(2));
      }
    });
  }

  enable_raw_mode()?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend)?;

  let mut app = App::new();
  let tick_rate = Duration::from_millis(500);
  let mut last_tick = Instant::now();

  loop {
    while let Ok(update) = rx.try_recv() {
      match update {
        Some(snapshot) => {
          app.snapshot = snapshot;
          app.connected = true;
        }
        None => app.connected = false,
      }
    }
    terminal.draw(|f| ui(f, &app))?;

    let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or_else(|| Duration::from_secs(0));
    if event::poll(timeout)? {
      if let CEvent::Key(key) = event::read()? {
        let action = match key.code {
          KeyCode::Char('q') => break,
          KeyCode::Right => {
            app.next_tab();
            None
          }
          KeyCode::Left => {
            app.previous_tab();
            None
          }
          KeyCode::Char('s') => Some("/simulation/start"),
          KeyCode::Char('x') => Some("/simulation/stop"),
          KeyCode::Char('r') => Some("/simulation/refresh"),
          KeyCode::Char('e') => Some("/emergency/default"),
          KeyCode::Char('y') if app.snapshot.pending_bypass.is_some() => Some("/emergency/confirm"),
          KeyCode::Char('n') if app.snapshot.pending_bypass.is_some() => Some("/emergency/dismiss"),
          _ => None,
        };
        if let Some(path) = action {
          app.status_line = rt.block_on(post_action(&client, &base, path));
          if let Ok(snapshot) = rt.block_on(fetch_snapshot(&client, &base)) {
            app.snapshot = snapshot;
          }
        }
      }
    }
    if last_tick.elapsed() >= tick_rate {
      last_tick = Instant::now();
    }
  }

  disable_raw_mode()?;
  execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
  terminal.show_cursor()?;
  Ok(())
}

fn ui<B: Backend>(f: &mut tui::Frame<B>, app: &App) {
  let prompt_height = if app.snapshot.pending_bypass.is_some() { 3 } else { 0 };
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .margin(1)
    .constraints(
      [
        Constraint::Length(3),
        Constraint::Length(prompt_height),
        Constraint::Min(0),
        Constraint::Length(3),
      ]
      .as_ref(),
    )
    .split(f.size());

  let tab_titles = vec!["Overview", "Tasks", "Areas"];
  let connection = if app.connected { "connected" } else { "console unreachable" };
  let simulation = if app.snapshot.simulation_running { "running" } else { "stopped" };
  let tabs = Tabs::new(
    tab_titles
      .iter()
      .map(|t| Spans::from(Span::styled(*t, Style::default().fg(Color::Yellow))))
      .collect(),
  )
  .block(
    Block::default()
      .borders(Borders::ALL)
      .title(format!("Fleet Console ({}, simulation {})", connection, simulation)),
  )
  .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
  .select(match app.current_tab {
    DashboardTab::Overview => 0,
    DashboardTab::Tasks => 1,
    DashboardTab::Areas => 2,
  });
  f.render_widget(tabs, chunks[0]);

  if let Some(prompt) = &app.snapshot.pending_bypass {
    let text = format!(
      "Task {} is blocked by restricted area {}. Bypass? y: confirm | n: dismiss",
      prompt.task_id, prompt.area_name
    );
    let banner = Paragraph::new(text)
      .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
      .block(Block::default().borders(Borders::ALL).title("Restricted area"));
    f.render_widget(banner, chunks[1]);
  }

  match app.current_tab {
    DashboardTab::Overview => render_overview(f, app, chunks[2]),
    DashboardTab::Tasks => render_tasks(f, app, chunks[2]),
    DashboardTab::Areas => render_areas(f, app, chunks[2]),
  }

  let keys = "←/→: Switch Tabs | s: Start | x: Stop | r: Refresh | e: Emergency | q: Quit";
  let footer_text = if app.status_line.is_empty() {
    keys.to_string()
  } else {
    format!("{} | {}", app.status_line, keys)
  };
  let footer = Paragraph::new(footer_text)
    .style(Style::default().fg(Color::White))
    .block(Block::default().borders(Borders::ALL));
  f.render_widget(footer, chunks[3]);
}

fn render_overview<B: Backend>(f: &mut tui::Frame<B>, app: &App, area: Rect) {
  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
    .split(area);

  let drone_items: Vec<ListItem> = app
    .snapshot
    .drones
    .iter()
    .map(|d| {
      let status: String = d.status.clone().into();
      let task = match (d.processing_emergency, d.current_emergency_task_id, d.current_task_id) {
        (true, Some(id), _) => format!("Emergency task: {}", id),
        (_, _, Some(id)) => format!("Task: {}", id),
        _ => "No current task".into(),
      };
      ListItem::new(vec![
        Spans::from(Span::styled(format!("Drone {}", d.drone_id), Style::default().add_modifier(Modifier::BOLD))),
        Spans::from(Span::raw(format!("Status: {} | {}", status, task))),
        Spans::from(Span::raw(format!(
          "Position: {:.5}, {:.5} | Done {}/{}",
          d.current_position.lat, d.current_position.lng, d.completed_tasks_count, d.total_tasks
        ))),
      ])
    })
    .collect();
  let drones = List::new(drone_items).block(Block::default().borders(Borders::ALL).title("Drones"));
  f.render_widget(drones, chunks[0]);

  let counters = &app.snapshot.counters;
  let lines = vec![
    Spans::from(Span::raw(format!("Active drones: {}", counters.active_drones))),
    Spans::from(Span::raw(format!("Completed tasks: {}", counters.completed_tasks))),
    Spans::from(Span::styled(
      format!("Emergencies in progress: {}", counters.emergency_in_progress),
      Style::default().fg(if counters.emergency_in_progress > 0 { Color::Red } else { Color::White }),
    )),
  ];
  let stats = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Fleet"));
  f.render_widget(stats, chunks[1]);
}

fn render_tasks<B: Backend>(f: &mut tui::Frame<B>, app: &App, area: Rect) {
  let task_items: Vec<ListItem> = app
    .snapshot
    .tasks
    .iter()
    .map(|t| {
      let kind = match t.emergency_level {
        Some(level) => format!("Emergency L{}", level),
        None => "Normal".into(),
      };
      ListItem::new(Spans::from(vec![
        Span::styled(format!("{} ", t.id), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw(format!("{} | {} | Status: {} | Progress: {}%", kind, t.time, t.status, t.progress)),
      ]))
    })
    .collect();
  let header = format!("Tasks ({})", app.snapshot.tasks.len());
  let tasks = List::new(task_items).block(Block::default().borders(Borders::ALL).title(header));
  f.render_widget(tasks, area);
}

fn render_areas<B: Backend>(f: &mut tui::Frame<B>, app: &App, area: Rect) {
  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
    .split(area);

  let area_items: Vec<ListItem> = app
    .snapshot
    .restricted_areas
    .iter()
    .map(|a| ListItem::new(Spans::from(Span::raw(format!("{}: {} ({} vertices)", a.id, a.name, a.vertices.len())))))
    .collect();
  let areas = List::new(area_items).block(Block::default().borders(Borders::ALL).title("Restricted Areas"));
  f.render_widget(areas, chunks[0]);

  let path_items: Vec<ListItem> = app
    .snapshot
    .paths
    .iter()
    .map(|p| {
      let state = if p.returned { "returned" } else { "out" };
      ListItem::new(Spans::from(vec![
        Span::styled(format!("Drone {} ", p.drone_id), Style::default().fg(Color::Green)),
        Span::raw(format!("{} points | {:.2} km to base | {}", p.points, p.distance_to_service_point_km, state)),
      ]))
    })
    .collect();
  let paths = List::new(path_items).block(Block::default().borders(Borders::ALL).title("Drone Paths"));
  f.render_widget(paths, chunks[1]);
}
