//! Scripted process runner for pipeline tests.
//!
//! Stands in for ffmpeg/ffprobe: records every command, writes a small file
//! at each artifact output path, and answers loudnorm passes with canned
//! JSON diagnostics.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use wm_av::{ProcessRunner, ToolCommand, ToolOutput};

pub(crate) const PASS1_JSON: &str = r#"[Parsed_loudnorm_0 @ 0x55d0c0a3c2c0]
{
	"input_i" : "-27.61",
	"input_tp" : "-4.47",
	"input_lra" : "18.06",
	"input_thresh" : "-39.20",
	"output_i" : "-16.58",
	"output_tp" : "-1.50",
	"output_lra" : "14.78",
	"output_thresh" : "-27.71",
	"normalization_type" : "dynamic",
	"target_offset" : "0.58"
}
"#;

#[derive(Default)]
pub(crate) struct ScriptedRunner {
    seen: Mutex<Vec<ToolCommand>>,
    lra: Mutex<VecDeque<f64>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    /// Achieved loudness ranges reported by successive second passes.
    pub fn with_lra(values: impl IntoIterator<Item = f64>) -> Self {
        let runner = Self::default();
        runner.lra.lock().unwrap().extend(values);
        runner
    }

    /// Fail any command whose rendering contains `needle`.
    pub fn fail_when(&self, needle: &str, stderr: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), stderr.to_string()));
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.seen.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.commands().iter().map(|c| c.render()).collect()
    }
}

fn pass2_json(lra: f64) -> String {
    format!(
        "[Parsed_loudnorm_0 @ 0x1]\n{{\n\t\"input_i\" : \"-27.61\",\n\t\"output_i\" : \"-16.02\",\n\
         \t\"output_lra\" : \"{lra}\",\n\t\"target_offset\" : \"0.02\"\n}}\n"
    )
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, cmd: &ToolCommand) -> wm_core::Result<ToolOutput> {
        self.seen.lock().unwrap().push(cmd.clone());
        let rendered = cmd.render();

        for (needle, stderr) in self.failures.lock().unwrap().iter() {
            if rendered.contains(needle.as_str()) {
                return Ok(ToolOutput::failed(1, stderr.clone()));
            }
        }

        let args = cmd.get_args();
        let stderr = if rendered.contains("measured_I=") {
            let lra = self.lra.lock().unwrap().pop_front().unwrap_or(10.0);
            pass2_json(lra)
        } else if rendered.contains("loudnorm=") {
            PASS1_JSON.to_string()
        } else {
            String::new()
        };

        if let Some(out) = args.last() {
            if out != "-" {
                std::fs::write(out, rendered.as_bytes())?;
            }
        }
        Ok(ToolOutput::ok("", stderr))
    }
}
