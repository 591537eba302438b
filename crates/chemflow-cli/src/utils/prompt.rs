use std::io::{self, BufRead, Write};
use std::path::Path;

/// Asks a yes/no question; anything but `y` or `yes` means no.
pub fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Asks on the terminal whether an existing file may be replaced. Read
/// failures count as no.
pub fn confirm_overwrite(path: &Path) -> bool {
    let question = format!("File '{}' exists, overwrite?", path.display());
    confirm(&question, &mut io::stdin().lock(), &mut io::stderr()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Could not read the answer, keeping the file");
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answer: &str) -> (bool, String) {
        let mut output = Vec::new();
        let yes = confirm("Overwrite?", &mut Cursor::new(answer), &mut output).unwrap();
        (yes, String::from_utf8(output).unwrap())
    }

    #[test]
    fn yes_answers_confirm() {
        assert_eq!(ask("y\n"), (true, "Overwrite? [y/N] ".to_string()));
        assert!(ask(" YES \n").0);
    }

    #[test]
    fn anything_else_declines() {
        assert!(!ask("\n").0);
        assert!(!ask("no\n").0);
        assert!(!ask("").0);
    }
}
