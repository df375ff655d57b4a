//! End-to-end tests for engine runs.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::config::{EngineConfig, FailureMode, Settings};
    use crate::core::{keys, Document, MetadataAccess, PipelineStatus};
    use crate::errors::DocflowError;
    use crate::events::{types, CollectingEventSink};
    use crate::modules::{
        ConcatDocuments, ExtractFrontMatter, GenerateFeeds, GroupDocuments, JsonFeedSerializer,
        Layout, MergeDocuments, Module, ReadFiles, ReplaceDocuments, SetContent, SetDestination,
        WriteFiles,
    };
    use crate::pipeline::{Engine, EngineBuilder, Pipeline};
    use crate::testing::{
        assert_status, assert_titles, doc, post, FailingModule, MemorySink, MemorySource,
        PlaceholderRenderer, RecordingModule, SlowModule, StaticModule,
    };
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn engine(settings: Settings, pipelines: Vec<Pipeline>) -> Engine {
        pipelines
            .into_iter()
            .try_fold(EngineBuilder::new().with_settings(settings), EngineBuilder::add_pipeline)
            .unwrap()
            .build()
            .unwrap()
    }

    fn settings(max_concurrency: usize, failure_mode: FailureMode) -> Settings {
        Settings::new().with_engine(
            EngineConfig::new()
                .with_max_concurrency(max_concurrency)
                .with_failure_mode(failure_mode),
        )
    }

    #[tokio::test]
    async fn test_dependent_sees_complete_output() {
        let recorder = Arc::new(RecordingModule::new());
        let engine = engine(
            Settings::new(),
            vec![
                Pipeline::new("Posts")
                    .input(StaticModule::new(vec![doc("A"), doc("B"), doc("C")]))
                    .process(SlowModule::with_delay_ms(20)),
                Pipeline::new("Archive")
                    .with_dependency("Posts")
                    .process(ConcatDocuments::dependencies())
                    .process_modules(vec![recorder.clone() as Arc<dyn Module>]),
            ],
        );

        let report = engine.run().await;

        assert!(report.succeeded(), "{}", report.summary());
        assert_titles(&report.outputs("Archive").unwrap(), &["A", "B", "C"]);
        let executions = recorder.executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].inputs, 3);
        assert_eq!(executions[0].published, vec!["Posts".to_string()]);
    }

    #[tokio::test]
    async fn test_scaffold_merged_onto_groups() {
        let scaffold = Document::from_path("tags/_tag.hbs").with("layout", "tag");
        let engine = engine(
            Settings::new(),
            vec![
                Pipeline::new("Posts").input(StaticModule::new(vec![
                    doc("A").with("tags", vec!["go"]),
                    doc("B").with("tags", vec!["go", "x"]),
                ])),
                Pipeline::new("Tags")
                    .with_dependency("Posts")
                    .input(StaticModule::new(vec![scaffold]))
                    .process(
                        MergeDocuments::default()
                            .with_module(ReplaceDocuments::new(["Posts"]))
                            .with_module(GroupDocuments::new("tags"))
                            .reverse(),
                    ),
            ],
        );

        let report = engine.run().await;
        let tags = report.outputs("Tags").unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].get_string(keys::GROUP_KEY).unwrap(), "go");
        assert_titles(tags[0].children(), &["A", "B"]);
        assert_eq!(tags[1].get_string(keys::GROUP_KEY).unwrap(), "x");
        assert_titles(tags[1].children(), &["B"]);
        for tag in tags.iter() {
            assert_eq!(tag.get_string("layout").unwrap(), "tag");
        }
    }

    #[test]
    fn test_cycle_is_rejected_before_running() {
        let err = EngineBuilder::new()
            .add_pipeline(Pipeline::new("A").with_dependency("B"))
            .unwrap()
            .add_pipeline(Pipeline::new("B").with_dependency("A"))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, DocflowError::CycleDetected(_)));
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_only() {
        let events = Arc::new(CollectingEventSink::new());
        let engine = [
            Pipeline::new("Posts").process(FailingModule::new("bad front matter")),
            Pipeline::new("Tags").with_dependency("Posts"),
            Pipeline::new("Feed").with_dependency("Tags"),
            Pipeline::new("Pages").input(StaticModule::new(vec![doc("About")])),
        ]
        .into_iter()
        .try_fold(
            EngineBuilder::new().with_event_sink(events.clone()),
            EngineBuilder::add_pipeline,
        )
        .unwrap()
        .build()
        .unwrap();

        let report = engine.run().await;

        assert_status(&report, "Posts", PipelineStatus::Failed);
        assert_status(&report, "Tags", PipelineStatus::Skipped);
        assert_status(&report, "Feed", PipelineStatus::Skipped);
        assert_status(&report, "Pages", PipelineStatus::Done);
        assert_eq!(report.exit_code(), 1);
        assert!(report.outcome("Posts").unwrap().error.as_deref().unwrap().contains("bad front matter"));
        assert!(report.outcome("Tags").unwrap().error.as_deref().unwrap().contains("Posts"));
        assert!(report.outcome("Feed").unwrap().error.as_deref().unwrap().contains("Tags"));
        assert!(report.outputs("Posts").is_none());
        assert_eq!(events.events_of_type(types::PIPELINE_SKIPPED).len(), 2);
        assert_eq!(events.events_of_type(types::RUN_COMPLETED).len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_the_run() {
        let engine = engine(
            settings(2, FailureMode::FailFast),
            vec![
                Pipeline::new("Broken").process(FailingModule::new("boom")),
                Pipeline::new("Slow")
                    .process(SlowModule::with_delay_ms(100))
                    .process(StaticModule::new(vec![doc("never")])),
                Pipeline::new("Waiting")
                    .process(SlowModule::with_delay_ms(50))
                    .process(StaticModule::new(vec![doc("never")])),
                Pipeline::new("Dependent").with_dependency("Slow"),
            ],
        );

        let report = engine.run().await;

        assert_status(&report, "Broken", PipelineStatus::Failed);
        assert_status(&report, "Slow", PipelineStatus::Cancelled);
        assert!(matches!(
            report.status("Waiting"),
            Some(PipelineStatus::Skipped | PipelineStatus::Cancelled)
        ));
        assert_status(&report, "Dependent", PipelineStatus::Skipped);
        assert!(report.outputs("Slow").is_none());
    }

    #[tokio::test]
    async fn test_external_cancellation_skips_everything() {
        let engine = engine(
            Settings::new(),
            vec![
                Pipeline::new("Posts").input(StaticModule::new(vec![doc("A")])),
                Pipeline::new("Feed").with_dependency("Posts"),
            ],
        );
        let token = Arc::new(CancellationToken::new());
        token.cancel("shutdown");

        let report = engine.run_with_cancellation(token).await;

        assert_status(&report, "Posts", PipelineStatus::Skipped);
        assert_status(&report, "Feed", PipelineStatus::Skipped);
        assert!(report.outcome("Posts").unwrap().error.as_deref().unwrap().contains("shutdown"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let slow = SlowModule::with_delay_ms(30);
        let pipelines = (0..4)
            .map(|i| Pipeline::new(format!("P{i}")).process(slow.clone()))
            .collect();

        let report = engine(settings(2, FailureMode::ContinueOnFailure), pipelines)
            .run()
            .await;

        assert!(report.succeeded());
        assert!(slow.peak() <= 2, "peak was {}", slow.peak());

        let wide = SlowModule::with_delay_ms(30);
        let pipelines = (0..4)
            .map(|i| Pipeline::new(format!("P{i}")).process(wide.clone()))
            .collect();
        engine(settings(4, FailureMode::ContinueOnFailure), pipelines)
            .run()
            .await;
        assert!(wide.peak() >= 2, "independent pipelines ran serially");
    }

    #[tokio::test]
    async fn test_isolated_pipeline_writes_but_never_publishes() {
        let sink = Arc::new(MemorySink::new().failing_on("b.css"));
        let engine = engine(
            Settings::new(),
            vec![Pipeline::new("Assets")
                .isolated()
                .input(StaticModule::new(vec![
                    doc("a").with_destination("a.css").with_content("a"),
                    doc("b").with_destination("b.css").with_content("b"),
                ]))
                .output(WriteFiles::new(sink.clone()))],
        );

        let report = engine.run().await;

        assert_status(&report, "Assets", PipelineStatus::Done);
        assert!(report.outputs("Assets").is_none());
        assert_eq!(report.snapshot().status("Assets"), Some(PipelineStatus::Done));
        assert_eq!(sink.paths(), vec![PathBuf::from("a.css")]);
        let failures = &report.outcome("Assets").unwrap().write_failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, PathBuf::from("b.css"));
    }

    #[tokio::test]
    async fn test_blog_site() {
        let source = Arc::new(
            MemorySource::new()
                .with_file(
                    "layouts/layout.hbs",
                    "<html><title>{{title}}</title>{{> nav}}<body>{{body}}</body></html>",
                )
                .with_file("layouts/_nav.hbs", "---\n{\"partial\": true}\n---\n<nav/>")
                .with_file(
                    "posts/first.md",
                    "---\n{\"Title\": \"First\", \"Published\": \"2021-01-01\", \"tags\": [\"rust\"]}\n---\nHello first",
                )
                .with_file(
                    "posts/second.md",
                    "---\n{\"Title\": \"Second\", \"Published\": \"2022-01-01\", \"tags\": [\"rust\", \"web\"]}\n---\nHello second",
                )
                .with_file("assets/css/site.css", "body{}"),
        );
        let sink = Arc::new(MemorySink::new());
        let layout = Layout::new("Layout", "layout.hbs", Arc::new(PlaceholderRenderer::new()));

        let pipelines = vec![
            Pipeline::new("Layout")
                .input(ReadFiles::new(source.clone(), ["layouts/*.hbs"]))
                .process(ExtractFrontMatter::default()),
            layout.apply_to(
                Pipeline::new("Posts")
                    .input(ReadFiles::new(source.clone(), ["posts/*.md"]))
                    .process(ExtractFrontMatter::default())
                    .process(SetDestination::extension("html"))
                    .output(WriteFiles::new(sink.clone())),
            ),
            Pipeline::new("Tags")
                .with_dependency("Posts")
                .process(ReplaceDocuments::new(["Posts"]))
                .process(GroupDocuments::new("tags"))
                .process(SetDestination::new(|doc, _| {
                    Ok(PathBuf::from(format!("tags/{}.html", doc.get_string(keys::GROUP_KEY)?)))
                }))
                .process(SetContent::new(|doc, _| {
                    let titles = doc
                        .children()
                        .iter()
                        .map(|child| child.get_string(keys::TITLE))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(titles.join(","))
                }))
                .output(WriteFiles::new(sink.clone())),
            Pipeline::new("Feed")
                .with_dependency("Posts")
                .process(ConcatDocuments::new(["Posts"]))
                .process(GenerateFeeds::new(Arc::new(JsonFeedSerializer::new())))
                .output(WriteFiles::new(sink.clone())),
            Pipeline::new("Assets")
                .isolated()
                .input(ReadFiles::new(source, ["assets/**/*"]))
                .process(SetDestination::new(|doc, _| {
                    Ok(PathBuf::from(doc.get_string(keys::RELATIVE_PATH)?))
                }))
                .output(WriteFiles::new(sink.clone())),
        ];
        let engine = engine(Settings::new().with(keys::TITLE, "Blog"), pipelines);

        assert_eq!(engine.schedule(), vec!["Layout", "Posts", "Tags", "Feed", "Assets"]);
        let report = engine.run().await;
        assert!(report.succeeded(), "{}", report.summary());

        let mut written = sink.paths();
        written.sort();
        assert_eq!(
            written,
            [
                "assets/css/site.css",
                "feed.json",
                "posts/first.html",
                "posts/second.html",
                "tags/rust.html",
                "tags/web.html",
            ]
            .map(PathBuf::from)
            .to_vec()
        );

        let first = sink.get_string("posts/first.html").unwrap();
        assert!(
            first.starts_with("<html><title>First</title><nav/><body>Hello first"),
            "{first}"
        );
        assert_eq!(sink.get_string("tags/rust.html").unwrap(), "First,Second");
        assert_eq!(sink.get_string("tags/web.html").unwrap(), "Second");

        let feed: serde_json::Value =
            serde_json::from_slice(&sink.get("feed.json").unwrap()).unwrap();
        assert_eq!(feed["title"], "Blog");
        assert_eq!(feed["items"][0]["title"], "Second");
        assert_eq!(feed["items"][1]["title"], "First");

        assert!(report.outputs("Assets").is_none());
        assert_titles(&report.outputs("Posts").unwrap(), &["First", "Second"]);
    }

    #[test]
    fn test_runs_are_independent() -> anyhow::Result<()> {
        let engine = EngineBuilder::new()
            .add_pipeline(
                Pipeline::new("Posts").input(StaticModule::new(vec![post("A", "2020-01-01", &[])])),
            )?
            .build()?;

        let first = tokio_test::block_on(engine.run());
        let second = tokio_test::block_on(engine.run());

        assert_ne!(first.run_id(), second.run_id());
        for report in [&first, &second] {
            assert_eq!(report.outputs("Posts").map(|docs| docs.len()), Some(1));
        }
        Ok(())
    }
}
