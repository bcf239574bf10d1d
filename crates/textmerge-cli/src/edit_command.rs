use anyhow::Context;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use textmerge_engine::{
    EditMode, EditServiceError, RangeEditRequest, RangeEditResult, RangeEditService,
};

/// Environment variable the edit command reads the requested mode from
pub const EDIT_MODE_ENV: &str = "TEXTMERGE_EDIT_MODE";

/// Range edit service backed by a shell command.
///
/// The command runs once per range with the range's text on stdin and
/// `$TEXTMERGE_EDIT_MODE` set; its stdout (minus one trailing newline) replaces the
/// range. A run that exits unsuccessfully leaves its range out of the answer, so the
/// range keeps its text. Dropping the future kills the running child.
#[derive(Debug, Clone)]
pub struct CommandEditService {
    command: String,
}

impl CommandEditService {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn edit_one(
        &self,
        request: &RangeEditRequest,
        mode: EditMode,
    ) -> anyhow::Result<Option<String>> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(EDIT_MODE_ENV, mode.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start edit command '{}'", self.command))?;

        let mut stdin = child.stdin.take().context("edit command has no stdin")?;
        // A command that ignores its input may close stdin early
        if let Err(error) = stdin.write_all(request.text.as_bytes()).await
            && error.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(error).context("failed to send range text to edit command");
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for edit command")?;

        if !output.status.success() {
            log::warn!(
                "edit command exited with {} for {}, keeping original text",
                output.status,
                request.id
            );
            return Ok(None);
        }

        let mut replacement = String::from_utf8(output.stdout)
            .context("edit command produced invalid UTF-8")?;
        if replacement.ends_with('\n') {
            replacement.pop();
        }
        Ok(Some(replacement))
    }
}

#[async_trait]
impl RangeEditService for CommandEditService {
    async fn edit_ranges(
        &self,
        requests: Vec<RangeEditRequest>,
        mode: EditMode,
    ) -> Result<Vec<RangeEditResult>, EditServiceError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            if let Some(replacement) = self.edit_one(request, mode).await? {
                results.push(RangeEditResult::new(request.id, replacement));
            }
        }
        Ok(results)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use textmerge_engine::RangeId;

    fn request(id: u64, text: &str) -> RangeEditRequest {
        RangeEditRequest {
            id: RangeId(id),
            text: text.to_string(),
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_command_output_replaces_range() {
        let service = CommandEditService::new("tr a-z A-Z");

        let results = runtime()
            .block_on(service.edit_ranges(
                vec![request(0, "hello"), request(1, "world")],
                EditMode::Improve,
            ))
            .unwrap();

        assert_eq!(
            results,
            vec![
                RangeEditResult::new(RangeId(0), "HELLO"),
                RangeEditResult::new(RangeId(1), "WORLD"),
            ]
        );
    }

    #[test]
    fn test_mode_is_passed_in_environment() {
        let service = CommandEditService::new("cat >/dev/null; echo \"$TEXTMERGE_EDIT_MODE\"");

        let results = runtime()
            .block_on(service.edit_ranges(vec![request(3, "anything")], EditMode::Shorten))
            .unwrap();

        assert_eq!(results, vec![RangeEditResult::new(RangeId(3), "shorten")]);
    }

    #[test]
    fn test_failing_command_leaves_range_out() {
        let service = CommandEditService::new("cat >/dev/null; exit 3");

        let results = runtime()
            .block_on(service.edit_ranges(vec![request(0, "text")], EditMode::Improve))
            .unwrap();

        assert!(results.is_empty());
    }
}
