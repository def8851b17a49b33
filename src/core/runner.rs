use crate::core::Pipeline;
use crate::domain::model::IngestReport;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_path: String,
    pub table: String,
    pub ingest: IngestReport,
}

/// Drives a pipeline through extract, transform and load.
pub struct PipelineRunner<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> PipelineRunner<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!("Starting model run");

        let records = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", records.len());
        self.monitor.finish_phase("extract");

        let result = self.pipeline.transform(records).await?;
        tracing::info!(
            "Transformed: {} series bound, {} records rejected, simulated: {}",
            result.ingest.records_bound,
            result.ingest.errors.len(),
            result.simulated
        );
        self.monitor.finish_phase("transform");

        let table = result.table.clone();
        let ingest = result.ingest.clone();
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.finish_phase("load");
        self.monitor.log_summary();

        Ok(RunOutcome {
            output_path,
            table,
            ingest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, TransformResult};
    use crate::domain::model::RenderedOutput;
    use crate::utils::error::ModelSimError;
    use async_trait::async_trait;

    struct FixedPipeline {
        fail_load: bool,
    }

    #[async_trait]
    impl Pipeline for FixedPipeline {
        async fn extract(&self) -> Result<Vec<Record>> {
            Ok(vec![Record::parse(1, "LATA 2020").unwrap()])
        }

        async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
            Ok(TransformResult {
                ingest: IngestReport {
                    lines_read: data.len(),
                    records_bound: data.len(),
                    ..IngestReport::default()
                },
                import: None,
                simulated: false,
                table: "LATA 2020\n".to_string(),
                outputs: vec![RenderedOutput {
                    extension: "txt",
                    content: "LATA 2020\n".to_string(),
                }],
            })
        }

        async fn load(&self, result: TransformResult) -> Result<String> {
            if self.fail_load {
                return Err(ModelSimError::ProcessingError {
                    message: "disk full".to_string(),
                });
            }
            Ok(format!("out/results.{}", result.outputs[0].extension))
        }
    }

    #[tokio::test]
    async fn test_runner_returns_outcome() {
        let runner = PipelineRunner::new(FixedPipeline { fail_load: false });
        let outcome = runner.run().await.unwrap();

        assert_eq!(outcome.output_path, "out/results.txt");
        assert_eq!(outcome.table, "LATA 2020\n");
        assert_eq!(outcome.ingest.records_bound, 1);
    }

    #[tokio::test]
    async fn test_runner_propagates_load_failure() {
        let runner = PipelineRunner::new_with_monitoring(FixedPipeline { fail_load: true }, true);
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, ModelSimError::ProcessingError { .. }));

        let phases: Vec<_> = runner.monitor.samples().into_iter().map(|s| s.phase).collect();
        assert_eq!(phases, vec!["extract", "transform"]);
    }
}
