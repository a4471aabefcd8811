//! Statistics computation and formatted output.
//!
//! Turns the samples of one exchange into loss, min/avg/max RTT and jitter,
//! and renders them as text, JSON or CSV.

use crate::sender::ExchangeResult;

/// Output format for statistics reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for machine consumption.
    Json,
    /// CSV output for spreadsheet import.
    Csv,
}

/// A single completed round-trip measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttSample {
    /// Sequence number of the probe this sample belongs to.
    pub seq: u32,
    /// Round-trip time in nanoseconds. Negative only under clock rate drift.
    pub rtt_ns: i64,
    /// Session-Sender TTL echoed by the reflector.
    pub ttl: u8,
}

/// Serializable sender statistics snapshot.
///
/// RTT fields are `None` when nothing was received.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatsSnapshot {
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packets_lost: u32,
    pub loss_percent: f64,
    pub min_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub avg_rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
}

impl StatsSnapshot {
    /// Summarizes a finished exchange.
    pub fn from_exchange(result: &ExchangeResult) -> Self {
        Self::aggregate(result.sent, &result.samples)
    }

    /// Computes loss and RTT statistics for `sent` probes and their samples.
    ///
    /// Jitter is the population standard deviation of the samples around
    /// their mean, computed in a second pass once the mean is known.
    pub fn aggregate(sent: u32, samples: &[RttSample]) -> Self {
        let received = samples.len() as u32;
        let lost = sent.saturating_sub(received);
        // A zero count never reaches here from the CLI.
        let loss_percent = 100.0 * lost as f64 / sent.max(1) as f64;

        let mut snapshot = StatsSnapshot {
            packets_sent: sent,
            packets_received: received,
            packets_lost: lost,
            loss_percent,
            min_rtt_ms: None,
            max_rtt_ms: None,
            avg_rtt_ms: None,
            jitter_ms: None,
        };

        let (Some(min), Some(max)) = (
            samples.iter().map(|s| s.rtt_ns).min(),
            samples.iter().map(|s| s.rtt_ns).max(),
        ) else {
            return snapshot;
        };

        let n = samples.len() as f64;
        let sum: i128 = samples.iter().map(|s| i128::from(s.rtt_ns)).sum();
        let mean = sum as f64 / n;
        let variance = samples
            .iter()
            .map(|s| {
                let diff = s.rtt_ns as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;

        snapshot.min_rtt_ms = Some(ns_to_ms(min as f64));
        snapshot.max_rtt_ms = Some(ns_to_ms(max as f64));
        snapshot.avg_rtt_ms = Some(ns_to_ms(mean));
        snapshot.jitter_ms = Some(ns_to_ms(variance.sqrt()));
        snapshot
    }

    /// Prints the summary in the given format.
    pub fn print(&self, format: OutputFormat) {
        println!("{}", self.render(format));
    }

    /// Renders the summary in the given format.
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => self.render_text(),
            OutputFormat::Json => self.render_json(),
            OutputFormat::Csv => self.render_csv(),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::from("\n--- STAMP Statistics ---\n");
        out.push_str(&format!(
            "Packets: sent = {}, received = {}, lost = {} ({:.2}% loss)",
            self.packets_sent, self.packets_received, self.packets_lost, self.loss_percent
        ));
        if let (Some(min), Some(avg), Some(max), Some(jitter)) =
            (self.min_rtt_ms, self.avg_rtt_ms, self.max_rtt_ms, self.jitter_ms)
        {
            out.push_str(&format!(
                "\nRTT min/avg/max/jitter = {:.3}/{:.3}/{:.3}/{:.3} ms",
                min, avg, max, jitter
            ));
        }
        out
    }

    fn render_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn render_csv(&self) -> String {
        format!(
            "packets_sent,packets_received,packets_lost,loss_percent,\
             min_rtt_ms,avg_rtt_ms,max_rtt_ms,jitter_ms\n\
             {},{},{},{:.2},{},{},{},{}",
            self.packets_sent,
            self.packets_received,
            self.packets_lost,
            self.loss_percent,
            fmt_opt(self.min_rtt_ms),
            fmt_opt(self.avg_rtt_ms),
            fmt_opt(self.max_rtt_ms),
            fmt_opt(self.jitter_ms),
        )
    }
}

fn ns_to_ms(ns: f64) -> f64 {
    ns / 1_000_000.0
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(String::new, |x| format!("{:.3}", x))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_ms(values: &[i64]) -> Vec<RttSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, ms)| RttSample {
                seq: i as u32,
                rtt_ns: ms * 1_000_000,
                ttl: 64,
            })
            .collect()
    }

    #[test]
    fn test_loss_accounting() {
        let snap = StatsSnapshot::aggregate(5, &samples_ms(&[1, 2, 3]));
        assert_eq!(snap.packets_sent, 5);
        assert_eq!(snap.packets_received, 3);
        assert_eq!(snap.packets_lost, 2);
        assert!((snap.loss_percent - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nothing_received() {
        let snap = StatsSnapshot::aggregate(4, &[]);
        assert_eq!(snap.packets_lost, 4);
        assert!((snap.loss_percent - 100.0).abs() < f64::EPSILON);
        assert!(snap.min_rtt_ms.is_none());
        assert!(snap.avg_rtt_ms.is_none());
        assert!(snap.max_rtt_ms.is_none());
        assert!(snap.jitter_ms.is_none());
    }

    #[test]
    fn test_constant_samples_have_zero_jitter() {
        let snap = StatsSnapshot::aggregate(4, &samples_ms(&[10, 10, 10, 10]));
        assert_eq!(snap.avg_rtt_ms, Some(10.0));
        assert_eq!(snap.jitter_ms, Some(0.0));
        assert_eq!(snap.min_rtt_ms, Some(10.0));
        assert_eq!(snap.max_rtt_ms, Some(10.0));
        assert!((snap.loss_percent - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_population_standard_deviation() {
        // mean 5, squared deviations 9+1+1+9 = 20, /4 = 5
        let snap = StatsSnapshot::aggregate(4, &samples_ms(&[2, 4, 6, 8]));
        assert_eq!(snap.min_rtt_ms, Some(2.0));
        assert_eq!(snap.max_rtt_ms, Some(8.0));
        assert_eq!(snap.avg_rtt_ms, Some(5.0));
        assert!((snap.jitter_ms.unwrap() - 5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_is_not_successive_difference() {
        // Successive differences average 1 ms; standard deviation does not.
        let snap = StatsSnapshot::aggregate(5, &samples_ms(&[1, 2, 3, 4, 5]));
        assert!((snap.jitter_ms.unwrap() - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample() {
        let snap = StatsSnapshot::aggregate(1, &samples_ms(&[7]));
        assert_eq!(snap.min_rtt_ms, Some(7.0));
        assert_eq!(snap.avg_rtt_ms, Some(7.0));
        assert_eq!(snap.jitter_ms, Some(0.0));
    }

    #[test]
    fn test_negative_sample_kept() {
        let samples = [
            RttSample { seq: 0, rtt_ns: -1_000_000, ttl: 64 },
            RttSample { seq: 1, rtt_ns: 3_000_000, ttl: 64 },
        ];
        let snap = StatsSnapshot::aggregate(2, &samples);
        assert_eq!(snap.min_rtt_ms, Some(-1.0));
        assert_eq!(snap.avg_rtt_ms, Some(1.0));
        assert_eq!(snap.jitter_ms, Some(2.0));
    }

    #[test]
    fn test_from_exchange() {
        let result = ExchangeResult {
            sent: 3,
            received: 2,
            samples: samples_ms(&[4, 6]),
            diagnostics: Vec::new(),
        };
        let snap = StatsSnapshot::from_exchange(&result);
        assert_eq!(snap.packets_lost, 1);
        assert_eq!(snap.avg_rtt_ms, Some(5.0));
    }

    #[test]
    fn test_text_format() {
        let snap = StatsSnapshot::aggregate(5, &samples_ms(&[1, 2, 3]));
        let text = snap.render(OutputFormat::Text);
        assert!(text.contains("sent = 5, received = 3, lost = 2 (40.00% loss)"));
        assert!(text.contains("RTT min/avg/max/jitter = 1.000/2.000/3.000/"));
    }

    #[test]
    fn test_text_format_without_rtt() {
        let snap = StatsSnapshot::aggregate(2, &[]);
        let text = snap.render(OutputFormat::Text);
        assert!(text.contains("(100.00% loss)"));
        assert!(!text.contains("RTT"));
    }

    #[test]
    fn test_json_format() {
        let snap = StatsSnapshot::aggregate(2, &samples_ms(&[10]));
        let value: serde_json::Value =
            serde_json::from_str(&snap.render(OutputFormat::Json)).unwrap();
        assert_eq!(value["packets_sent"], 2);
        assert_eq!(value["packets_lost"], 1);
        assert_eq!(value["avg_rtt_ms"], 10.0);
    }

    #[test]
    fn test_json_none_fields() {
        let snap = StatsSnapshot::aggregate(2, &[]);
        let value: serde_json::Value =
            serde_json::from_str(&snap.render(OutputFormat::Json)).unwrap();
        assert!(value["jitter_ms"].is_null());
    }

    #[test]
    fn test_csv_format() {
        let snap = StatsSnapshot::aggregate(4, &samples_ms(&[10, 10, 10, 10]));
        let csv = snap.render(OutputFormat::Csv);
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("packets_sent,"));
        assert_eq!(
            lines.next().unwrap(),
            "4,4,0,0.00,10.000,10.000,10.000,0.000"
        );
    }

    #[test]
    fn test_csv_empty_rtt_columns() {
        let snap = StatsSnapshot::aggregate(1, &[]);
        let csv = snap.render(OutputFormat::Csv);
        assert_eq!(csv.lines().nth(1).unwrap(), "1,0,1,100.00,,,,");
    }
}
