use std::io::{BufRead, Write};
use std::ops::Range;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::tty::IsTty;
use crossterm::{cursor, execute, queue};
use smol_str::SmolStr;

/// Lets the user choose one of several options.
pub trait SelectOne {
    /// Index of the chosen option, `None` if the user backed out.
    fn select_one(&mut self, prompt: &str, options: &[SmolStr]) -> anyhow::Result<Option<usize>>;
}

/// The arrow-key list when stdin and stdout are terminals, the numbered
/// prompt otherwise.
pub fn stdio() -> Box<dyn SelectOne> {
    if std::io::stdin().is_tty() && std::io::stdout().is_tty() {
        Box::new(ListSelect::stdout())
    } else {
        Box::new(TerminalSelect::stdio())
    }
}

/// Numbered list on a terminal, answered with a number or the option text.
pub struct TerminalSelect<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalSelect<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalSelect { input, output }
    }
}

impl TerminalSelect<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> SelectOne for TerminalSelect<R, W> {
    fn select_one(&mut self, prompt: &str, options: &[SmolStr]) -> anyhow::Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }

        writeln!(self.output, "{prompt}")?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}. {}", index + 1, option)?;
        }

        loop {
            write!(self.output, "Choose 1-{} (q to quit): ", options.len())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.is_empty() || answer == "q" {
                return Ok(None);
            }

            if let Ok(number) = answer.parse::<usize>() {
                if (1..=options.len()).contains(&number) {
                    return Ok(Some(number - 1));
                }
            } else if let Some(index) = options.iter().position(|o| o == answer) {
                return Ok(Some(index));
            }

            writeln!(self.output, "Invalid choice '{answer}'")?;
        }
    }
}

/// Rows shown at once by [`ListSelect`].
pub const PAGE_SIZE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Chosen(usize),
    Quit,
    /// Ctrl+C, which raw mode delivers as a key instead of a signal.
    Interrupted,
}

/// Cursor and page of a paged list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListState {
    len: usize,
    cursor: usize,
    page_size: usize,
}

impl ListState {
    pub fn new(len: usize, page_size: usize) -> Self {
        ListState {
            len,
            cursor: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Zero-based page holding the cursor.
    pub fn page(&self) -> usize {
        self.cursor / self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.len.div_ceil(self.page_size).max(1)
    }

    /// Indices of the rows on the current page.
    pub fn visible(&self) -> Range<usize> {
        let start = self.page() * self.page_size;
        start..(start + self.page_size).min(self.len)
    }

    fn move_to(&mut self, index: usize) {
        self.cursor = index.min(self.len.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => KeyOutcome::Interrupted,
                _ => KeyOutcome::Continue,
            };
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Enter if self.len > 0 => return KeyOutcome::Chosen(self.cursor),
            KeyCode::Up | KeyCode::Char('k') => self.move_to(self.cursor.saturating_sub(1)),
            KeyCode::Down | KeyCode::Char('j') => self.move_to(self.cursor + 1),
            KeyCode::Left | KeyCode::PageUp | KeyCode::Char('h') => {
                self.move_to(self.cursor.saturating_sub(self.page_size))
            }
            KeyCode::Right | KeyCode::PageDown | KeyCode::Char('l') => {
                self.move_to(self.cursor + self.page_size)
            }
            KeyCode::Home | KeyCode::Char('g') => self.move_to(0),
            KeyCode::End | KeyCode::Char('G') => self.move_to(self.len),
            _ => {}
        }
        KeyOutcome::Continue
    }
}

/// Draws the current page and returns how many lines were written.
fn render<W: Write>(
    out: &mut W,
    prompt: &str,
    options: &[SmolStr],
    state: &ListState,
) -> std::io::Result<u16> {
    queue!(out, Print(prompt), Print("\r\n"))?;
    let mut lines = 1;
    for index in state.visible() {
        let row = format!("{}. {}", index + 1, options[index]);
        if index == state.cursor() {
            queue!(
                out,
                SetForegroundColor(Color::Cyan),
                SetAttribute(Attribute::Bold),
                Print(format!("> {row}")),
                SetAttribute(Attribute::Reset),
                ResetColor,
                Print("\r\n")
            )?;
        } else {
            queue!(out, Print(format!("  {row}")), Print("\r\n"))?;
        }
        lines += 1;
    }
    queue!(
        out,
        SetAttribute(Attribute::Dim),
        Print(format!(
            "  page {}/{}  ↑/↓ move, ←/→ page, enter select, q quit",
            state.page() + 1,
            state.page_count()
        )),
        SetAttribute(Attribute::Reset),
        Print("\r\n")
    )?;
    lines += 1;
    out.flush()?;
    Ok(lines)
}

/// Leaves raw mode and shows the cursor again, also on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(std::io::stdout(), cursor::Show);
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("Failed to leave raw mode: {e}");
        }
    }
}

/// Paged list driven by arrow keys, with the current row highlighted.
pub struct ListSelect<W> {
    output: W,
    page_size: usize,
}

impl ListSelect<std::io::Stdout> {
    pub fn stdout() -> Self {
        ListSelect {
            output: std::io::stdout(),
            page_size: PAGE_SIZE,
        }
    }
}

impl<W: Write> SelectOne for ListSelect<W> {
    fn select_one(&mut self, prompt: &str, options: &[SmolStr]) -> anyhow::Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }

        let mut state = ListState::new(options.len(), self.page_size);
        let outcome = {
            let _raw = RawModeGuard::enable()?;
            queue!(self.output, cursor::Hide)?;
            let mut drawn = render(&mut self.output, prompt, options, &state)?;
            loop {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                match state.handle_key(key) {
                    KeyOutcome::Continue => {}
                    outcome => break outcome,
                }
                queue!(
                    self.output,
                    cursor::MoveUp(drawn),
                    cursor::MoveToColumn(0),
                    Clear(ClearType::FromCursorDown)
                )?;
                drawn = render(&mut self.output, prompt, options, &state)?;
            }
        };

        match outcome {
            KeyOutcome::Chosen(index) => Ok(Some(index)),
            KeyOutcome::Interrupted => {
                crate::set_cancelled();
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<SmolStr> {
        vec!["go1.25.0".into(), "go1.24.6".into(), "go1.23.12".into()]
    }

    fn run(input: &str) -> (Option<usize>, String) {
        let mut output = Vec::new();
        let choice = TerminalSelect::new(input.as_bytes(), &mut output)
            .select_one("Pick a version:", &options())
            .unwrap();
        (choice, String::from_utf8(output).unwrap())
    }

    fn press(state: &mut ListState, code: KeyCode) -> KeyOutcome {
        state.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_select_by_number() {
        let (choice, output) = run("2\n");
        assert_eq!(choice, Some(1));
        assert!(output.contains("  1. go1.25.0\n"));
        assert!(output.contains("  3. go1.23.12\n"));
    }

    #[test]
    fn test_select_by_text() {
        assert_eq!(run("go1.23.12\n").0, Some(2));
    }

    #[test]
    fn test_cancel() {
        assert_eq!(run("q\n").0, None);
        assert_eq!(run("\n").0, None);
        assert_eq!(run("").0, None);
    }

    #[test]
    fn test_reprompt_on_invalid_input() {
        let (choice, output) = run("7\nabc\n1\n");
        assert_eq!(choice, Some(0));
        assert!(output.contains("Invalid choice '7'"));
        assert!(output.contains("Invalid choice 'abc'"));
    }

    #[test]
    fn test_no_options() {
        let mut output = Vec::new();
        let choice = TerminalSelect::new("1\n".as_bytes(), &mut output)
            .select_one("Pick:", &[])
            .unwrap();
        assert_eq!(choice, None);
        assert!(output.is_empty());
    }

    #[test]
    fn test_list_arrow_keys() {
        let mut state = ListState::new(3, PAGE_SIZE);
        assert_eq!(press(&mut state, KeyCode::Up), KeyOutcome::Continue);
        assert_eq!(state.cursor(), 0);

        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Down);
        press(&mut state, KeyCode::Down);
        assert_eq!(state.cursor(), 2);

        press(&mut state, KeyCode::Char('k'));
        assert_eq!(press(&mut state, KeyCode::Enter), KeyOutcome::Chosen(1));
    }

    #[test]
    fn test_list_quit_keys() {
        let mut state = ListState::new(3, PAGE_SIZE);
        assert_eq!(press(&mut state, KeyCode::Char('q')), KeyOutcome::Quit);
        assert_eq!(press(&mut state, KeyCode::Esc), KeyOutcome::Quit);
        assert_eq!(
            state.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyOutcome::Interrupted
        );
    }

    #[test]
    fn test_list_ignores_key_release() {
        let mut state = ListState::new(3, PAGE_SIZE);
        let mut release = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(state.handle_key(release), KeyOutcome::Continue);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_list_paging() {
        let mut state = ListState::new(30, PAGE_SIZE);
        assert_eq!(state.page_count(), 3);
        assert_eq!(state.visible(), 0..14);

        press(&mut state, KeyCode::Right);
        assert_eq!(state.cursor(), 14);
        assert_eq!(state.visible(), 14..28);

        press(&mut state, KeyCode::End);
        assert_eq!(state.cursor(), 29);
        assert_eq!(state.page(), 2);
        assert_eq!(state.visible(), 28..30);

        press(&mut state, KeyCode::Left);
        assert_eq!(state.cursor(), 15);
        press(&mut state, KeyCode::Home);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_render_highlights_cursor_row() {
        let mut state = ListState::new(3, 2);
        press(&mut state, KeyCode::Down);

        let mut out = Vec::new();
        let lines = render(&mut out, "Pick a version:", &options(), &state).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(lines, 4);
        assert!(out.contains("  1. go1.25.0\r\n"));
        assert!(out.contains("> 2. go1.24.6"));
        assert!(!out.contains("go1.23.12"));
        assert!(out.contains("page 1/2"));
    }
}
