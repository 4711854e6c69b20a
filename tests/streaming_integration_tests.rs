// Integration tests for the generation orchestrator and session pipeline
// Drives full runs against a scripted model transport

#[cfg(test)]
mod streaming_integration_tests {
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use livegen_lib::config::{GenerationSettings, ModelSettings, RetrySettings, SyncSettings};
    use livegen_lib::events::GenerationEvent;
    use livegen_lib::generation::{GenerationContext, GenerationRequest, Orchestrator};
    use livegen_lib::llm::{ChatTransport, ModelError, ModelInvoker, ModelReply, ModelRequest, RetryPolicy};
    use livegen_lib::sandbox::{MountTree, Sandbox, SandboxError};
    use livegen_lib::session::Session;
    use livegen_lib::templates::PromptEngine;
    use livegen_lib::{FileSnapshot, GeneratedFile, ReloadKind};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const RESPONSE: &str = r#"{"files": [{"path": "src/App.tsx", "content": "import Counter from './components/Counter';\nexport default function App() {\n  return <Counter />;\n}\n"}, {"path": "src/main.tsx", "content": "import App from './App';\n"}], "summary": "Counter app"}"#;

    enum Reply {
        Stream(Vec<String>),
        /// Yields the chunks, then never finishes; sets the flag once dropped
        Hang(Vec<String>, Arc<AtomicBool>),
        Fail(ModelError),
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Reply>>,
        models: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(replies.into()),
                models: Mutex::new(Vec::new()),
            })
        }

        fn models(&self) -> Vec<String> {
            self.models.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
            self.models.lock().unwrap().push(request.model.clone());
            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more often than scripted");
            match reply {
                Reply::Stream(chunks) => Ok(ModelReply::Stream(Box::pin(stream::iter(
                    chunks.into_iter().map(Ok),
                )))),
                Reply::Hang(chunks, dropped) => {
                    let guard = DropFlag(dropped);
                    let endless = stream::iter(chunks.into_iter().map(Ok))
                        .chain(stream::pending::<Result<String, ModelError>>())
                        .map(move |item| {
                            let _held = &guard;
                            item
                        });
                    Ok(ModelReply::Stream(Box::pin(endless)))
                }
                Reply::Fail(error) => Err(error),
            }
        }
    }

    /// Sandbox that records every call in order
    #[derive(Default)]
    struct RecordingSandbox {
        files: Mutex<BTreeMap<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Sandbox for RecordingSandbox {
        async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError> {
            let mut files = self.files.lock().unwrap();
            for (path, contents) in tree.files() {
                files.insert(path, contents);
            }
            self.calls.lock().unwrap().push(format!("mount:{}", tree.file_count()));
            Ok(())
        }

        async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
            self.files.lock().unwrap().insert(path.to_string(), content.to_string());
            self.calls.lock().unwrap().push(format!("write:{}", path));
            Ok(())
        }

        async fn remove_file(&self, path: &str) -> Result<(), SandboxError> {
            self.files.lock().unwrap().remove(path);
            self.calls.lock().unwrap().push(format!("remove:{}", path));
            Ok(())
        }

        async fn reload(&self, kind: ReloadKind) -> Result<(), SandboxError> {
            self.calls.lock().unwrap().push(format!("reload:{}", kind));
            Ok(())
        }
    }

    fn chunks(text: &str, size: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(size).map(|c| c.iter().collect()).collect()
    }

    fn orchestrator(transport: Arc<ScriptedTransport>, fallbacks: &[&str]) -> Orchestrator {
        let policy = RetryPolicy::from_settings(&RetrySettings {
            fallback_models: fallbacks.iter().map(|m| m.to_string()).collect(),
            base_backoff_ms: 1,
            max_backoff_ms: 1,
            ..Default::default()
        });
        let context = GenerationContext::new(
            ModelInvoker::new(transport, policy),
            Arc::new(PromptEngine::new().unwrap()),
            &ModelSettings::default(),
            GenerationSettings {
                templates_enabled: false,
                ..Default::default()
            },
        );
        Orchestrator::new(Arc::new(context))
    }

    fn existing() -> FileSnapshot {
        FileSnapshot::from_files(vec![GeneratedFile::new("index.html", "<div id=\"root\"></div>")])
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_generation_emits_files_then_complete_with_stubs() {
        // 1. Stream the response in small pieces
        let transport = ScriptedTransport::new(vec![Reply::Stream(chunks(RESPONSE, 9))]);
        let events = orchestrator(transport.clone(), &[])
            .start(GenerationRequest::new("create a counter").with_existing(existing()))
            .collect()
            .await;

        // 2. Lifecycle order
        assert!(matches!(events.first(), Some(GenerationEvent::Start(_))));
        assert!(matches!(events.last(), Some(GenerationEvent::Complete(_))));
        let generating = events.iter().find_map(|e| match e {
            GenerationEvent::Generating(payload) => Some(payload.clone()),
            _ => None,
        });
        assert_eq!(generating.map(|g| g.attempts), Some(1));

        // 3. Every model file and the stub arrive as file events
        let file_paths: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::File(file) => Some(file.path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            file_paths,
            vec!["src/App.tsx", "src/main.tsx", "src/components/Counter.tsx"]
        );

        // 4. The streamed content matched the final parse, so no corrections
        assert!(!events.iter().any(|e| matches!(e, GenerationEvent::Actions(_))));

        match events.last().unwrap() {
            GenerationEvent::Complete(payload) => {
                assert_eq!(payload.stubs, vec!["src/components/Counter.tsx"]);
                assert_eq!(payload.files.len(), 3);
                assert_eq!(payload.message.as_deref(), Some("Counter app"));
            }
            other => panic!("expected complete, got {:?}", other),
        }
        assert_eq!(transport.models(), vec![ModelSettings::default().model]);
    }

    #[tokio::test]
    async fn test_fallback_model_answers_after_retryable_failure() {
        let transport = ScriptedTransport::new(vec![
            Reply::Fail(ModelError::Status {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Reply::Stream(chunks(RESPONSE, 40)),
        ]);
        let events = orchestrator(transport.clone(), &["backup-model"])
            .start(GenerationRequest::new("create a counter").with_existing(existing()))
            .collect()
            .await;

        let generating = events
            .iter()
            .find_map(|e| match e {
                GenerationEvent::Generating(payload) => Some(payload.clone()),
                _ => None,
            })
            .expect("Should report the answering model");
        assert_eq!(generating.model, "backup-model");
        assert_eq!(generating.attempts, 2);
        assert_eq!(
            transport.models(),
            vec![ModelSettings::default().model, "backup-model".to_string()]
        );
        assert!(matches!(events.last(), Some(GenerationEvent::Complete(_))));
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_last_status() {
        let transport = ScriptedTransport::new(vec![
            Reply::Fail(ModelError::Status {
                status: 502,
                message: "bad gateway".to_string(),
            }),
            Reply::Fail(ModelError::Status {
                status: 503,
                message: "overloaded".to_string(),
            }),
        ]);
        let events = orchestrator(transport.clone(), &["backup-model"])
            .start(GenerationRequest::new("create a counter").with_existing(existing()))
            .collect()
            .await;

        match events.last().unwrap() {
            GenerationEvent::Error(payload) => {
                assert_eq!(payload.status, Some(503));
                assert!(payload.message.contains("2 attempts"));
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(transport.models().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_stops_immediately() {
        let transport = ScriptedTransport::new(vec![Reply::Fail(ModelError::Status {
            status: 401,
            message: "bad key".to_string(),
        })]);
        let events = orchestrator(transport.clone(), &["backup-model"])
            .start(GenerationRequest::new("create a counter").with_existing(existing()))
            .collect()
            .await;

        match events.last().unwrap() {
            GenerationEvent::Error(payload) => assert_eq!(payload.status, Some(401)),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(transport.models().len(), 1);
    }

    #[tokio::test]
    async fn test_closing_stream_stops_model_reads() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport::new(vec![Reply::Hang(
            chunks(r#"{"files": [{"path": "src/A.tsx", "content": "a"}, "#, 10),
            dropped.clone(),
        )]);
        let mut stream = orchestrator(transport, &[])
            .start(GenerationRequest::new("create two files").with_existing(existing()));

        // 1. Wait until the first file has streamed out
        loop {
            match stream.next().await {
                Some(GenerationEvent::File(file)) => {
                    assert_eq!(file.path, "src/A.tsx");
                    break;
                }
                Some(_) => continue,
                None => panic!("stream ended before the first file"),
            }
        }

        // 2. Close it and the model stream is released
        stream.close();
        assert!(wait_for(&dropped).await);
    }

    #[tokio::test]
    async fn test_session_applies_and_syncs_generated_files() {
        // 1. A session over a recording sandbox with one existing file
        let transport = ScriptedTransport::new(vec![Reply::Stream(chunks(RESPONSE, 16))]);
        let orchestrator = orchestrator(transport, &[]);
        let sandbox = Arc::new(RecordingSandbox::default());
        let settings = SyncSettings {
            debounce_ms: 20,
            ..Default::default()
        };
        let session = Arc::new(Session::new(sandbox.clone(), &settings, existing()));

        // 2. Drain the generation
        let mut events = session.generate(&orchestrator, "create a counter").await;
        let mut count = 0;
        while let Some(event) = events.recv().await {
            count += 1;
            if event.is_terminal() {
                assert!(matches!(event, GenerationEvent::Complete(_)));
            }
        }
        assert!(count > 0);

        // 3. Flush and check the sandbox mirrors the snapshot
        session.flush().await.unwrap();
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.len(), 4);
        let mirrored = sandbox.files.lock().unwrap().clone();
        for file in snapshot.files() {
            if file.path == "index.html" {
                continue;
            }
            assert_eq!(mirrored.get(&file.path), Some(&file.content));
        }

        // 4. The turn is remembered for the next prompt
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Counter app");

        session.teardown().await;
    }

    #[tokio::test]
    async fn test_session_cancel_releases_model_stream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport::new(vec![Reply::Hang(vec!["{\"files\": [".to_string()], dropped.clone())]);
        let orchestrator = orchestrator(transport, &[]);
        let session = Arc::new(Session::new(
            Arc::new(RecordingSandbox::default()),
            &SyncSettings::default(),
            existing(),
        ));

        let mut events = session.generate(&orchestrator, "create a counter").await;
        // Start, planning, generating
        for _ in 0..3 {
            assert!(events.recv().await.is_some());
        }
        assert!(session.is_generating());

        assert!(session.cancel_generation());
        assert!(wait_for(&dropped).await);
        assert!(events.recv().await.is_none());
        assert!(!session.is_generating());

        session.teardown().await;
    }
}
