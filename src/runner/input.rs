use crate::embedding::GaitMetrics;
use crate::error::{GaitError, Result};
use std::io::{BufRead, Write};

const CADENCE_PROMPT: &str = "  Cadence (steps/min, e.g., 185): ";
const HEEL_STRIKE_PROMPT: &str = "  Heel Strike Ratio (0=toe, 1=heel, e.g., 0.2): ";
const VERTICAL_OSCILLATION_PROMPT: &str = "  Vertical Oscillation (cm, e.g., 6.5): ";

/// Metrics supplied up front; anything left `None` is asked for.
#[derive(Copy, Clone, Debug, Default)]
pub struct PartialMetrics {
    pub cadence: Option<f32>,
    pub heel_strike: Option<f32>,
    pub vertical_oscillation: Option<f32>,
}

pub fn read_metrics<R: BufRead, W: Write>(
    given: PartialMetrics,
    input: &mut R,
    output: &mut W,
) -> Result<GaitMetrics> {
    let cadence = resolve(given.cadence, CADENCE_PROMPT, input, output)?;
    let heel_strike = resolve(given.heel_strike, HEEL_STRIKE_PROMPT, input, output)?;
    let vertical_oscillation = resolve(
        given.vertical_oscillation,
        VERTICAL_OSCILLATION_PROMPT,
        input,
        output,
    )?;
    Ok(GaitMetrics {
        cadence,
        heel_strike,
        vertical_oscillation,
    })
}

fn resolve<R: BufRead, W: Write>(
    given: Option<f32>,
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<f32> {
    if let Some(value) = given {
        return check_finite(value, prompt);
    }

    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(GaitError::Input(format!(
            "no value entered for {}",
            prompt.trim()
        )));
    }
    let value = line.trim().parse::<f32>().map_err(|_| {
        GaitError::Input(format!("{:?} is not a number ({})", line.trim(), prompt.trim()))
    })?;
    check_finite(value, prompt)
}

fn check_finite(value: f32, prompt: &str) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GaitError::Input(format!(
            "{} is not a finite number ({})",
            value,
            prompt.trim()
        )))
    }
}
