//! Textual substitution of gesture variables into command templates.
//!
//! `$name` and `${name}` are replaced for the four gesture variables. Any
//! other `$word` is left alone so shell variables such as `$HOME` still reach
//! the shell.

use regex::{Captures, Regex};

use crate::gesture::types::CommandVariables;

pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            placeholder: Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")?,
        })
    }

    pub fn render(&self, template: &str, vars: &CommandVariables) -> String {
        self.placeholder
            .replace_all(template, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match variable(name, vars) {
                    Some(value) => format_value(value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn variable(name: &str, vars: &CommandVariables) -> Option<f64> {
    match name {
        "delta_x" => Some(vars.delta_x),
        "delta_y" => Some(vars.delta_y),
        "scale" => Some(vars.scale),
        "delta_angle" => Some(vars.delta_angle),
        _ => None,
    }
}

fn format_value(value: f64) -> String {
    // Negative zero would print as "-0".
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

#[cfg(test)]
mod tests;
