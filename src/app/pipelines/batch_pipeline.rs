use crate::core::binder::parse_records;
use crate::core::formatter::OutputFormat;
use crate::core::session::Session;
use crate::core::{ConfigProvider, Pipeline, Record, Storage, TransformResult};
use crate::domain::model::ImportReport;
use crate::domain::ports::ScriptStage;
use crate::script::ScriptEngine;
use crate::utils::error::{ModelSimError, Result};

/// Non-interactive run: read a data file, optionally apply a script, run the
/// projection and write the configured result formats.
pub struct BatchPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> BatchPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.storage.read_file(path).await?;
        String::from_utf8(bytes).map_err(|e| ModelSimError::ProcessingError {
            message: format!("{} is not valid UTF-8: {}", path, e),
        })
    }

    /// Evaluate the configured script, if any. Evaluation is CPU bound and
    /// may run up to the script deadline, so it happens on the blocking pool.
    async fn apply_script(
        &self,
        mut session: Session<ScriptEngine>,
    ) -> Result<(Session<ScriptEngine>, Option<ImportReport>)> {
        let Some(path) = self.config.script_path() else {
            return Ok((session, None));
        };
        tracing::info!("Running script {}", path);
        let script = self.read_text(path).await?;

        let (session, report) = tokio::task::spawn_blocking(move || {
            let report = session.apply_script(&script);
            (session, report)
        })
        .await
        .map_err(|e| ModelSimError::ProcessingError {
            message: format!("Script task failed: {}", e),
        })?;
        Ok((session, Some(report?)))
    }

    fn output_stem(&self) -> String {
        self.config
            .output_stem()
            .replace("{name}", self.config.run_name())
            .replace(
                "{timestamp}",
                &chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
            )
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BatchPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::debug!("Reading data file {}", self.config.data_path());
        let text = self.read_text(self.config.data_path()).await?;
        Ok(parse_records(&text))
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let formats = self
            .config
            .output_formats()
            .iter()
            .map(|f| f.parse::<OutputFormat>())
            .collect::<Result<Vec<_>>>()?;

        let engine = ScriptEngine::new(self.config.script_timeout(), self.config.script_max_steps())
            .with_max_array_len(self.config.script_max_array_len());
        let mut session = Session::new(engine);
        let ingest = session.load_records(data);

        let mut import = None;
        if self.config.script_stage() == ScriptStage::BeforeRun {
            (session, import) = self.apply_script(session).await?;
        }

        let simulated = self.config.run_simulation();
        if simulated {
            session.simulate()?;
        }

        if self.config.script_stage() == ScriptStage::AfterRun {
            (session, import) = self.apply_script(session).await?;
        }

        let outputs = formats
            .iter()
            .map(|format| format.render(session.model()))
            .collect::<Result<Vec<_>>>()?;

        Ok(TransformResult {
            ingest,
            import,
            simulated,
            table: session.results(),
            outputs,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let stem = self.output_stem();
        let mut written = Vec::with_capacity(result.outputs.len());

        for output in &result.outputs {
            let path = format!("{}/{}.{}", self.config.output_path(), stem, output.extension);
            tracing::debug!("Writing {} bytes to {}", output.content.len(), path);
            self.storage.write_file(&path, output.content.as_bytes()).await?;
            written.push(path);
        }

        Ok(written.join(", "))
    }
}
