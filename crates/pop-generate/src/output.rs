//! Console channels for run progress.
//!
//! Progress is a block of lines that is redrawn in place after every
//! creation; informational and error messages are printed above it.

use std::io::{self, Write};

use crossterm::cursor::MoveUp;
use crossterm::queue;
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};

pub trait OutputChannel {
    fn info(&mut self, message: &str) -> io::Result<()>;

    fn error(&mut self, message: &str) -> io::Result<()>;

    /// Replace the block drawn by the previous `redraw` with `lines`.
    fn redraw(&mut self, lines: &[String]) -> io::Result<()>;
}

/// Writes to a terminal. With `interactive` off nothing is printed.
pub struct ConsoleOutput<W: Write> {
    out: W,
    interactive: bool,
    drawn: usize,
}

impl ConsoleOutput<io::Stdout> {
    pub fn stdout(interactive: bool) -> Self {
        Self::new(io::stdout(), interactive)
    }
}

impl<W: Write> ConsoleOutput<W> {
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out,
            interactive,
            drawn: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputChannel for ConsoleOutput<W> {
    fn info(&mut self, message: &str) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        writeln!(self.out, "{message}")?;
        self.drawn = 0;
        self.out.flush()
    }

    fn error(&mut self, message: &str) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        queue!(self.out, PrintStyledContent(message.red()), Print("\n"))?;
        self.drawn = 0;
        self.out.flush()
    }

    fn redraw(&mut self, lines: &[String]) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        if let Ok(up) = u16::try_from(self.drawn)
            && up > 0
        {
            queue!(self.out, MoveUp(up))?;
        }
        for line in lines {
            queue!(
                self.out,
                Clear(ClearType::CurrentLine),
                PrintStyledContent(line.as_str().green()),
                Print("\n")
            )?;
        }
        self.drawn = lines.len();
        self.out.flush()
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct SilentOutput;

impl OutputChannel for SilentOutput {
    fn info(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }

    fn error(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }

    fn redraw(&mut self, _lines: &[String]) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps messages in memory; the last redrawn block replaces the previous one.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub block: Vec<String>,
}

impl OutputChannel for BufferedOutput {
    fn info(&mut self, message: &str) -> io::Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> io::Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn redraw(&mut self, lines: &[String]) -> io::Result<()> {
        self.block = lines.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_console_prints_nothing() {
        let mut console = ConsoleOutput::new(Vec::new(), false);
        console.info("hello").expect("info");
        console.redraw(&["Contact: 1".to_string()]).expect("redraw");
        assert!(console.into_inner().is_empty());
    }

    #[test]
    fn redraw_moves_back_over_previous_block() {
        let mut console = ConsoleOutput::new(Vec::new(), true);
        console.redraw(&["Contact: 1".to_string()]).expect("first");
        console
            .redraw(&["Contact: 2".to_string(), "Email: 1".to_string()])
            .expect("second");
        let written = String::from_utf8(console.into_inner()).expect("utf8");
        // one cursor-up for the single line drawn before
        assert_eq!(written.matches("\u{1b}[1A").count(), 1);
        assert!(written.contains("Contact: 2"));
        assert!(written.contains("Email: 1"));
    }

    #[test]
    fn silent_output_accepts_everything() {
        let mut output = SilentOutput;
        output.info("hello").expect("info");
        output.error("boom").expect("error");
        output.redraw(&["A: 1".to_string()]).expect("redraw");
    }

    #[test]
    fn buffered_output_keeps_last_block() {
        let mut output = BufferedOutput::default();
        output.redraw(&["A: 1".to_string()]).expect("redraw");
        output.redraw(&["A: 2".to_string()]).expect("redraw");
        output.error("boom").expect("error");
        assert_eq!(output.block, vec!["A: 2"]);
        assert_eq!(output.errors, vec!["boom"]);
    }
}
