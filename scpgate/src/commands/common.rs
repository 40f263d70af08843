use std::io::stdin;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;

/// Prompts on a terminal, otherwise reads a single line from stdin.
pub(crate) fn read_password(prompt: &str, allow_empty: bool) -> Result<String> {
    if console::user_attended() {
        return Ok(dialoguer::Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty_password(allow_empty)
            .interact()?);
    }

    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_owned())
}
