//! Full-screen pager
//!
//! Buffers rendered views and shows them in a scrollable ratatui viewport
//! with vim-style navigation once the command finishes. Error views skip the
//! pager and go straight to stderr.

use super::plain::render_text;
use super::{format_elapsed, RenderSink};
use crate::view::View;
use anyhow::Result;
use crossterm::{
    event::{read, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame, Terminal,
};
use ratatui::prelude::{Backend, CrosstermBackend};
use std::io;
use std::time::Duration;

/// Scroll position over a fixed number of lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: usize,
    pub total: usize,
    pub visible: usize,
}

impl ScrollState {
    fn max_offset(&self) -> usize {
        self.total.saturating_sub(self.visible)
    }

    pub fn down(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.max_offset());
    }

    pub fn up(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn top(&mut self) {
        self.offset = 0;
    }

    pub fn bottom(&mut self) {
        self.offset = self.max_offset();
    }
}

#[derive(Default)]
pub struct PagerSink {
    title: String,
    lines: Vec<String>,
}

impl PagerSink {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    fn run(&self, footer: &str) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let result = self.event_loop(&mut terminal, footer);
        cleanup_terminal(&mut terminal)?;
        result
    }

    fn event_loop<B: Backend>(&self, terminal: &mut Terminal<B>, footer: &str) -> Result<()>
    where
        B::Error: Send + Sync + 'static,
    {
        let mut scroll = ScrollState {
            total: self.lines.len(),
            ..Default::default()
        };

        loop {
            terminal.draw(|f| self.draw(f, &mut scroll, footer))?;

            let Event::Key(key) = read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let page = scroll.visible.max(1);
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Char('j') | KeyCode::Down => scroll.down(1),
                KeyCode::Char('k') | KeyCode::Up => scroll.up(1),
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll.down(page / 2)
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll.up(page / 2)
                }
                KeyCode::PageDown | KeyCode::Char(' ') => scroll.down(page),
                KeyCode::PageUp => scroll.up(page),
                KeyCode::Char('g') | KeyCode::Home => scroll.top(),
                KeyCode::Char('G') | KeyCode::End => scroll.bottom(),
                _ => {}
            }
        }
    }

    fn draw(&self, f: &mut Frame, scroll: &mut ScrollState, footer: &str) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(f.area());

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(
                format!(" {} ", self.title),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        let inner_area = block.inner(chunks[0]);
        f.render_widget(block, chunks[0]);

        scroll.visible = inner_area.height as usize;
        scroll.offset = scroll.offset.min(scroll.max_offset());

        let lines: Vec<Line> = self.lines.iter().map(|l| Line::raw(l.as_str())).collect();
        f.render_widget(
            Paragraph::new(lines).scroll((scroll.offset as u16, 0)),
            inner_area,
        );

        if scroll.total > scroll.visible {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));
            let mut state = ScrollbarState::new(scroll.max_offset() + scroll.visible)
                .position(scroll.offset);
            f.render_stateful_widget(scrollbar, inner_area, &mut state);
        }

        render_footer(f, chunks[1], footer);
    }
}

fn render_footer(f: &mut Frame, area: Rect, footer: &str) {
    let line = Line::from(vec![
        Span::styled(" q ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("j/k ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        Span::styled("g/G ", Style::default().fg(Color::Yellow)),
        Span::raw("top/bottom  "),
        Span::styled(footer.to_string(), Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn cleanup_terminal<B: Backend + io::Write>(terminal: &mut Terminal<B>) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

impl RenderSink for PagerSink {
    fn render(&mut self, view: &View) -> Result<()> {
        let text = render_text(view, false);
        if view.is_error() {
            eprintln!("{}", text);
            return Ok(());
        }
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.extend(text.lines().map(str::to_string));
        Ok(())
    }

    fn finish(&mut self, elapsed: Duration) -> Result<()> {
        self.run(&format_elapsed(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Table;

    #[test]
    fn test_scroll_state_clamps() {
        let mut s = ScrollState {
            offset: 0,
            total: 10,
            visible: 4,
        };
        s.down(100);
        assert_eq!(s.offset, 6);
        s.up(2);
        assert_eq!(s.offset, 4);
        s.top();
        assert_eq!(s.offset, 0);
        s.bottom();
        assert_eq!(s.offset, 6);
    }

    #[test]
    fn test_render_buffers_lines() {
        let mut sink = PagerSink::new("cloudctl");
        let mut table = Table::new(None, &["Name"]);
        table.push_row(vec!["a".to_string()]);
        sink.render(&View::Table(table)).unwrap();
        assert!(sink.lines.iter().any(|l| l.contains('a')));
    }
}
