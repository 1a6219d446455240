//! Reference band evaluation and alert throttling
//!
//! Every extraction cycle is checked against the configured bands. Offending
//! readings are folded into a single notification, and a counter caps how
//! many notifications one incident may produce:
//!
//! ```text
//! offending == 0:
//!   counter == 0    → ThrottleEvaluation::InBand       (nothing to do)
//!   counter > 0     → ThrottleEvaluation::BackToNormal (log recovery, reset)
//!
//! offending > 0:
//!   counter < max   → ThrottleEvaluation::Notify       (send, increment)
//!   counter >= max  → ThrottleEvaluation::Suppress     (log only)
//! ```
//!
//! Readings are stored whatever the outcome; suppression only affects the
//! notification channel.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::{Reading, format_temperature, positional_label};

/// Acceptable temperature range for one sensor, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(f64, f64)")]
pub struct ReferenceBand {
    pub min: f64,
    pub max: f64,
}

impl ReferenceBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, temperature: f64) -> bool {
        temperature >= self.min && temperature <= self.max
    }
}

impl From<(f64, f64)> for ReferenceBand {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

/// Bands keyed by canonical sensor identity (page label or `Sensor N`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ReferenceBands(BTreeMap<String, ReferenceBand>);

impl Default for ReferenceBands {
    fn default() -> Self {
        let bands = (0..16).map(|index| {
            let band = match index {
                0 => ReferenceBand::new(10.0, 30.0),
                1 | 2 => ReferenceBand::new(-30.0, -15.0),
                _ => ReferenceBand::new(-110.0, -90.0),
            };
            (positional_label(index), band)
        });
        Self(bands.collect())
    }
}

impl FromIterator<(String, ReferenceBand)> for ReferenceBands {
    fn from_iter<T: IntoIterator<Item = (String, ReferenceBand)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl ReferenceBands {
    pub fn get(&self, sensor: &str) -> Option<&ReferenceBand> {
        self.0.get(sensor)
    }

    /// Looks up the band for the reading at `index`: exact label first, then
    /// the positional label.
    pub fn lookup(&self, label: &str, index: usize) -> Option<&ReferenceBand> {
        self.0
            .get(label)
            .or_else(|| self.0.get(&positional_label(index)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReferenceBand)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A reading that left its reference band.
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfBand {
    pub label: String,
    pub temperature: f64,
    pub band: ReferenceBand,
}

impl fmt::Display for OutOfBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}°C (out of range {}-{}°C)",
            self.label,
            format_temperature(self.temperature),
            format_temperature(self.band.min),
            format_temperature(self.band.max)
        )
    }
}

/// Readings of one batch that are outside their band, in batch order.
/// Readings without a configured band are never reported.
pub fn out_of_band(readings: &[Reading], bands: &ReferenceBands) -> Vec<OutOfBand> {
    readings
        .iter()
        .enumerate()
        .filter_map(|(index, reading)| {
            let band = bands.lookup(&reading.sensor, index)?;
            (!band.contains(reading.temperature)).then(|| OutOfBand {
                label: reading.sensor.clone(),
                temperature: reading.temperature,
                band: *band,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleEvaluation {
    InBand,
    Notify,
    Suppress,
    BackToNormal,
}

impl ThrottleEvaluation {
    pub fn evaluate(offending: usize, counter: usize, max_alerts: usize) -> ThrottleEvaluation {
        if offending == 0 {
            if counter > 0 {
                return ThrottleEvaluation::BackToNormal;
            }
            return ThrottleEvaluation::InBand;
        }

        if counter < max_alerts {
            return ThrottleEvaluation::Notify;
        }

        ThrottleEvaluation::Suppress
    }
}

/// Alert bookkeeping carried from one cycle to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    consecutive_alert_batches: usize,
    last_messages: Vec<String>,
}

impl AlertState {
    pub fn consecutive_alert_batches(&self) -> usize {
        self.consecutive_alert_batches
    }

    pub fn last_messages(&self) -> &[String] {
        &self.last_messages
    }

    pub fn is_alerting(&self) -> bool {
        self.consecutive_alert_batches > 0
    }
}

/// What the caller has to do after a batch was evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    /// Everything in band, no incident running
    Quiet,
    /// Send this aggregated body through the notification channel
    Notify(String),
    /// The incident already used up its notifications
    Suppressed(Vec<String>),
    /// All readings back in band after an incident
    Recovered,
}

#[derive(Debug, Clone)]
pub struct AlertEngine {
    bands: ReferenceBands,
    max_alerts: usize,
}

impl AlertEngine {
    pub fn new(bands: ReferenceBands, max_alerts: usize) -> Self {
        Self { bands, max_alerts }
    }

    pub fn bands(&self) -> &ReferenceBands {
        &self.bands
    }

    pub fn max_alerts(&self) -> usize {
        self.max_alerts
    }

    #[instrument(skip_all, fields(readings = readings.len()))]
    pub fn evaluate(&self, readings: &[Reading], state: &mut AlertState) -> AlertDecision {
        let messages: Vec<String> = out_of_band(readings, &self.bands)
            .iter()
            .map(ToString::to_string)
            .collect();

        let evaluation = ThrottleEvaluation::evaluate(
            messages.len(),
            state.consecutive_alert_batches,
            self.max_alerts,
        );

        trace!(
            "{} out of band, alerts {}/{} → {evaluation:?}",
            messages.len(),
            state.consecutive_alert_batches,
            self.max_alerts
        );

        let decision = match evaluation {
            ThrottleEvaluation::InBand => AlertDecision::Quiet,
            ThrottleEvaluation::Notify => {
                state.consecutive_alert_batches += 1;
                debug!(
                    "sending alert {}/{}",
                    state.consecutive_alert_batches, self.max_alerts
                );
                AlertDecision::Notify(messages.join("\n"))
            }
            ThrottleEvaluation::Suppress => {
                for message in &messages {
                    warn!("alert suppressed ({} already sent): {message}", self.max_alerts);
                }
                AlertDecision::Suppressed(messages.clone())
            }
            ThrottleEvaluation::BackToNormal => {
                info!("All temperatures are back to normal, alert counter reset.");
                state.consecutive_alert_batches = 0;
                AlertDecision::Recovered
            }
        };

        state.last_messages = messages;
        decision
    }
}
