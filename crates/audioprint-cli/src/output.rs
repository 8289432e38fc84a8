//! JSON output formatting

use audioprint_core::{GenerationSummary, SubFingerprint};
use serde::Serialize;

/// Result for one input file
#[derive(Debug, Clone, Serialize)]
pub struct TrackOutput {
    pub status: &'static str,
    pub input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_subfingerprints: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfingerprints: Option<Vec<SubFingerprint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackOutput {
    pub fn success(
        input_file: String,
        summary: &GenerationSummary,
        subfingerprints: Option<Vec<SubFingerprint>>,
    ) -> Self {
        Self {
            status: "success",
            input_file,
            num_subfingerprints: Some(summary.subfingerprints),
            chroma_frames: Some(summary.chroma_frames),
            processing_time_seconds: Some(summary.elapsed.as_secs_f64()),
            subfingerprints,
            error: None,
        }
    }

    pub fn failure(input_file: String, error: &anyhow::Error) -> Self {
        Self {
            status: "error",
            input_file,
            num_subfingerprints: None,
            chroma_frames: None,
            processing_time_seconds: None,
            subfingerprints: None,
            error: Some(format!("{:#}", error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    profile: &'a str,
    hop_duration_seconds: f64,
    tracks: &'a [TrackOutput],
}

/// Print all track results as one JSON document
pub fn print_json_results(profile: &str, hop_duration_seconds: f64, tracks: &[TrackOutput]) {
    let output = RunOutput {
        profile,
        hop_duration_seconds,
        tracks,
    };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_success_serializes_subfingerprints() {
        let summary = GenerationSummary {
            track: Arc::from("a"),
            chroma_frames: 21,
            subfingerprints: 2,
            elapsed: Duration::from_millis(250),
        };
        let entries = vec![SubFingerprint::new(0, 7), SubFingerprint::new(1, 9)];
        let track = TrackOutput::success("a.raw".into(), &summary, Some(entries));

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["num_subfingerprints"], 2);
        assert_eq!(json["subfingerprints"][1]["hash"], 9);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_omits_counts() {
        let error = anyhow::anyhow!("corrupt").context("Failed to open input: b.raw");
        let track = TrackOutput::failure("b.raw".into(), &error);

        assert!(!track.is_success());
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Failed to open input: b.raw: corrupt");
        assert!(json.get("num_subfingerprints").is_none());
    }
}
