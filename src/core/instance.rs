use std::io::{BufRead, Write};

use tracing::debug;

use crate::{error::ModSyncError, model::Config};

/// Pick the instance to work on
///
/// Uses `requested` when it names a configured instance, otherwise lists the
/// instances on `output` and asks for a number on `input` until a valid one is
/// given.
pub fn select_instance(
    config: &Config,
    requested: Option<&str>,
    mut input: impl BufRead,
    mut output: impl Write,
) -> Result<String, ModSyncError> {
    if let Some(name) = requested {
        if config.instances.contains_key(name) {
            return Ok(name.into());
        }
        writeln!(output, "No such instance '{name}'")?;
    }

    let names = config.instance_names();
    if names.is_empty() {
        return Err(ModSyncError::NoInstance);
    }

    for (i, name) in names.iter().enumerate() {
        writeln!(output, "{:<2}) {}", i + 1, name)?;
    }

    loop {
        write!(output, "Choose an instance:")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(ModSyncError::NoInstance);
        }

        match line.trim().parse::<usize>() {
            Ok(n) if (1..=names.len()).contains(&n) => {
                debug!("Selected instance {}", names[n - 1]);
                return Ok(names[n - 1].clone());
            }
            _ => writeln!(output, "Please enter a number from 1 to {}", names.len())?,
        }
    }
}

/// Ask a yes/no question, defaulting to no
pub fn confirm(
    mut input: impl BufRead,
    mut output: impl Write,
    question: impl AsRef<str>,
) -> Result<bool, ModSyncError> {
    write!(output, "{} [y/N] ", question.as_ref())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }

    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
